//! Wall-clock abstraction.
//!
//! Everything time-dependent (debounce deadlines, throttling, the trial
//! clock) reads the time through [`Clock`] so tests can drive it by hand.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the controller.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start_ms`.
    #[must_use]
    pub fn new(start_ms: u64) -> Self { Self { now: Arc::new(AtomicU64::new(start_ms)) } }

    /// Moves the clock forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) { self.now.fetch_add(delta_ms, Ordering::SeqCst); }

    /// Sets the clock to an absolute time.
    pub fn set(&self, now_ms: u64) { self.now.store(now_ms, Ordering::SeqCst); }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 { self.now.load(Ordering::SeqCst) }
}
