//! Virtual timers.
//!
//! The scheduler never sleeps. It asks a [`Timers`] implementation for a
//! deadline and gets a [`TimerId`] back; whoever drives the controller later
//! hands due ids back in deadline order. [`TimerQueue`] is the only
//! implementation and serves both real time (the async runtime sleeps until
//! [`Timers::next_deadline`]) and tests (virtual time advanced by hand).

use std::collections::{BTreeSet, HashMap};

use crate::constants::timing::FRAME_INTERVAL_MS;

/// Handle of an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "timer-{}", self.0) }
}

/// Deadline based timer service. All times are milliseconds.
pub trait Timers {
    /// Arms a one-shot timer firing `delay_ms` after `now`.
    fn after(&mut self, now: u64, delay_ms: u64) -> TimerId;

    /// Arms a timer for the next frame boundary strictly after `now`.
    fn next_frame(&mut self, now: u64) -> TimerId;

    /// Disarms `id`. Returns `false` if it already fired or was cancelled.
    fn cancel(&mut self, id: TimerId) -> bool;

    /// Earliest armed deadline, if any.
    fn next_deadline(&self) -> Option<u64>;

    /// Removes and returns every timer due at `now`, earliest first.
    fn take_due(&mut self, now: u64) -> Vec<TimerId>;
}

/// Ordered deadline queue with fixed frame boundaries.
#[derive(Debug)]
pub struct TimerQueue {
    frame_interval_ms: u64,
    next_id: u64,
    queue: BTreeSet<(u64, TimerId)>,
    deadlines: HashMap<TimerId, u64>,
}

impl Default for TimerQueue {
    fn default() -> Self { Self::new(FRAME_INTERVAL_MS) }
}

impl TimerQueue {
    /// Creates an empty queue. Frames fall on multiples of `frame_interval_ms`.
    #[must_use]
    pub fn new(frame_interval_ms: u64) -> Self {
        Self {
            frame_interval_ms: frame_interval_ms.max(1),
            next_id: 0,
            queue: BTreeSet::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Number of armed timers.
    #[must_use]
    pub fn len(&self) -> usize { self.queue.len() }

    /// Whether no timer is armed.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.queue.is_empty() }

    /// Deadline of `id` if it is still armed.
    #[must_use]
    pub fn deadline_of(&self, id: TimerId) -> Option<u64> { self.deadlines.get(&id).copied() }

    fn arm(&mut self, deadline: u64) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.queue.insert((deadline, id));
        self.deadlines.insert(id, deadline);
        id
    }
}

impl Timers for TimerQueue {
    fn after(&mut self, now: u64, delay_ms: u64) -> TimerId { self.arm(now.saturating_add(delay_ms)) }

    fn next_frame(&mut self, now: u64) -> TimerId {
        let interval = self.frame_interval_ms;
        self.arm((now / interval).saturating_add(1).saturating_mul(interval))
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.deadlines.remove(&id).is_some_and(|deadline| self.queue.remove(&(deadline, id)))
    }

    fn next_deadline(&self) -> Option<u64> { self.queue.first().map(|(deadline, _)| *deadline) }

    fn take_due(&mut self, now: u64) -> Vec<TimerId> {
        let mut due = Vec::new();
        while let Some(&(deadline, id)) = self.queue.first() {
            if deadline > now {
                break;
            }
            self.queue.pop_first();
            self.deadlines.remove(&id);
            due.push(id);
        }
        due
    }
}
