//! Update scheduling.
//!
//! Turns a noisy stream of triggers into at most one outstanding apply:
//!
//! ```text
//! trigger ──► PENDING ──(debounce of silence)──► FRAME-QUEUED ──(frame)──► APPLYING ──► IDLE
//!   ▲            │
//!   └────────────┘ any trigger restarts the debounce
//! ```
//!
//! While content is streaming in, applying on every chunk is wasted work.
//! A content trigger that arrives while the source is growing and within the
//! throttle window of the last apply is dropped. In that case one trailing
//! timer is armed for the end of the throttle window so the final state is
//! still applied once growth pauses.

mod timers;

use serde::{Deserialize, Serialize};
pub use timers::{TimerId, TimerQueue, Timers};

use crate::constants::timing::{DEBOUNCE_MS, STREAMING_THROTTLE_MS};

// ============================================================================
// Types
// ============================================================================

/// Where the scheduler currently is in the apply cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerPhase {
    /// Nothing armed.
    Idle,
    /// Debounce (or trailing re-check) armed.
    Pending,
    /// Frame callback armed.
    FrameQueued,
    /// An apply is running.
    Applying,
}

/// What caused a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCause {
    /// First schedule after construction.
    Startup,
    /// Relevant change in the content feed.
    Content {
        /// Whether the source reported growth at the time of the change.
        growing: bool,
    },
    /// Local settings mutation.
    Settings,
    /// Change written by another observer of the store.
    Resync,
    /// Manual eviction.
    Purge,
}

impl TriggerCause {
    const fn is_streaming(self) -> bool { matches!(self, Self::Content { growing: true }) }
}

/// Why a trigger did not arm a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Content is growing and the last apply was too recent.
    Streaming,
}

/// Result of [`UpdateScheduler::trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// The debounce timer was (re)started.
    Armed,
    /// The trigger was dropped.
    Dropped(DropReason),
}

/// Result of routing a fired timer through [`UpdateScheduler::on_timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The id belongs to no armed step (cancelled or stale).
    Ignored,
    /// Debounce elapsed; a frame callback is now armed.
    FrameArmed,
    /// Frame reached: the caller must apply, then call
    /// [`UpdateScheduler::finish_apply`].
    Apply,
    /// Trailing re-check fired and was treated as a fresh trigger.
    Retriggered(TriggerDecision),
}

/// Scheduler timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTuning {
    /// Silence required before an apply is queued.
    pub debounce_ms: u64,
    /// Minimum spacing between applies while content is growing.
    pub streaming_throttle_ms: u64,
}

impl Default for SchedulerTuning {
    fn default() -> Self {
        Self { debounce_ms: DEBOUNCE_MS, streaming_throttle_ms: STREAMING_THROTTLE_MS }
    }
}

// ============================================================================
// UpdateScheduler
// ============================================================================

/// Debounce, frame alignment and streaming backpressure.
///
/// The scheduler owns no timers itself. It arms and cancels them on the
/// [`Timers`] it is handed and recognizes its own ids when they fire.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    tuning: SchedulerTuning,
    debounce: Option<TimerId>,
    frame: Option<TimerId>,
    trailing: Option<TimerId>,
    applying: bool,
    last_apply_ms: Option<u64>,
}

impl UpdateScheduler {
    /// Creates an idle scheduler.
    #[must_use]
    pub fn new(tuning: SchedulerTuning) -> Self { Self { tuning, ..Self::default() } }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> SchedulerPhase {
        if self.applying {
            SchedulerPhase::Applying
        } else if self.frame.is_some() {
            SchedulerPhase::FrameQueued
        } else if self.debounce.is_some() || self.trailing.is_some() {
            SchedulerPhase::Pending
        } else {
            SchedulerPhase::Idle
        }
    }

    /// Time of the last completed apply.
    #[must_use]
    pub const fn last_apply_ms(&self) -> Option<u64> { self.last_apply_ms }

    /// Requests an apply.
    ///
    /// Restarts the debounce timer unless the trigger is a streaming one
    /// inside the throttle window.
    pub fn trigger(&mut self, timers: &mut dyn Timers, now: u64, cause: TriggerCause) -> TriggerDecision {
        if let Some(resume_at) = self.throttled_until(now).filter(|_| cause.is_streaming()) {
            if self.debounce.is_none() && self.trailing.is_none() {
                self.trailing = Some(timers.after(now, resume_at - now));
            }
            tracing::trace!(now, resume_at, "streaming trigger dropped");
            return TriggerDecision::Dropped(DropReason::Streaming);
        }

        if let Some(previous) = self.debounce.take() {
            timers.cancel(previous);
        }
        if let Some(trailing) = self.trailing.take() {
            timers.cancel(trailing);
        }
        self.debounce = Some(timers.after(now, self.tuning.debounce_ms));
        tracing::trace!(?cause, now, "debounce armed");
        TriggerDecision::Armed
    }

    /// Routes a fired timer.
    ///
    /// `growing` is the source's growth state at fire time and only matters
    /// for the trailing re-check.
    pub fn on_timer(&mut self, timers: &mut dyn Timers, id: TimerId, now: u64, growing: bool) -> TimerOutcome {
        if self.debounce == Some(id) {
            self.debounce = None;
            if let Some(previous) = self.frame.take() {
                timers.cancel(previous);
            }
            self.frame = Some(timers.next_frame(now));
            TimerOutcome::FrameArmed
        } else if self.frame == Some(id) {
            self.frame = None;
            self.applying = true;
            TimerOutcome::Apply
        } else if self.trailing == Some(id) {
            self.trailing = None;
            TimerOutcome::Retriggered(self.trigger(timers, now, TriggerCause::Content { growing }))
        } else {
            TimerOutcome::Ignored
        }
    }

    /// Marks the running apply as done at `now`.
    pub fn finish_apply(&mut self, now: u64) {
        self.applying = false;
        self.last_apply_ms = Some(now);
    }

    /// End of the throttle window if `now` is inside it.
    fn throttled_until(&self, now: u64) -> Option<u64> {
        let resume_at = self.last_apply_ms?.saturating_add(self.tuning.streaming_throttle_ms);
        (now < resume_at).then_some(resume_at)
    }
}
