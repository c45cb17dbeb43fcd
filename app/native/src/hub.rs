//! Fan-out notification hub with explicit subscriptions.
//!
//! Both the change feed and the config stores publish through a [`Hub`].
//! Each subscriber gets its own unbounded queue plus a [`Notify`] so that a
//! synchronous caller can drain it with [`Subscription::try_next`] and an
//! async loop can park on [`Subscription::notified`].
//!
//! Dropping a [`Subscription`] (or calling [`Subscription::unsubscribe`])
//! removes it from the hub; later publishes skip it.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

/// A single registered subscriber.
struct Subscriber<T> {
    id: u64,
    tx: mpsc::UnboundedSender<T>,
    notify: Arc<Notify>,
}

struct HubInner<T> {
    next_id: u64,
    subscribers: Vec<Subscriber<T>>,
}

/// Publishes cloned items to every live subscription.
pub struct Hub<T> {
    inner: Arc<Mutex<HubInner<T>>>,
}

impl<T> Clone for Hub<T> {
    fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<T> Default for Hub<T> {
    fn default() -> Self { Self::new() }
}

impl<T> Hub<T> {
    /// Creates a hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner { next_id: 0, subscribers: Vec::new() })),
        }
    }

    /// Registers a new subscription.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let notify = Arc::new(Notify::new());

        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.push(Subscriber { id, tx, notify: Arc::clone(&notify) });

        Subscription {
            id,
            rx,
            notify,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize { self.inner.lock().subscribers.len() }
}

impl<T: Clone> Hub<T> {
    /// Delivers `item` to every subscriber and returns how many received it.
    ///
    /// Subscribers whose receiving side is gone are pruned.
    pub fn publish(&self, item: &T) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|sub| {
            if sub.tx.send(item.clone()).is_err() {
                return false;
            }
            sub.notify.notify_one();
            true
        });
        inner.subscribers.len()
    }
}

/// Receiving side of a hub registration.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<T>,
    notify: Arc<Notify>,
    hub: Weak<Mutex<HubInner<T>>>,
}

impl<T> Subscription<T> {
    /// Takes the next queued item without blocking.
    pub fn try_next(&mut self) -> Option<T> { self.rx.try_recv().ok() }

    /// Takes every queued item without blocking.
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }

    /// Completes once something was published after the last wake-up.
    pub async fn notified(&self) { self.notify.notified().await; }

    /// Removes this subscription from its hub.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            inner.lock().subscribers.retain(|sub| sub.id != self.id);
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}
