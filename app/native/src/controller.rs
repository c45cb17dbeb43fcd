//! The controller owns every piece of mutable state and wires the parts
//! together:
//!
//! ```text
//! ChangeFeed ─┐
//! ConfigStore ┼─► UpdateScheduler ─► WindowManager ─► PruneEngine ─► ConfigStore
//! settings  ──┘         ▲
//!                  LicenseGate (enabled override)
//! ```
//!
//! It never blocks and never sleeps. Whoever drives it calls [`Controller::pump`]
//! after the clock moved or a subscription was notified, and uses
//! [`Controller::next_deadline`] to know when to wake up next.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::clock::Clock;
use crate::config::SpeedchatConfig;
use crate::constants::storage_keys::{ENABLED, PRO_UNLOCKED, PURGED_COUNT, TRIAL_START, ULTRA_MODE, VISIBLE_MESSAGES};
use crate::content::{ContentSource, WriteToken};
use crate::error::SpeedchatError;
use crate::feed::{ChangeFeed, MutationBatch};
use crate::hub::Subscription;
use crate::license::{AppState, LicenseGate};
use crate::prune::{PruneEngine, PurgeCounter};
use crate::scheduler::{
    SchedulerPhase, SchedulerTuning, TimerOutcome, TimerQueue, Timers, TriggerCause, UpdateScheduler,
};
use crate::store::settings::truthy;
use crate::store::{ConfigStore, Settings, StoreChange, StoreMap, StoreScope, map_of};
use crate::window::{ApplyOutcome, VisibilityWindow, WindowManager};

// ============================================================================
// Types
// ============================================================================

/// Timing and trial parameters of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    /// Debounce and streaming throttle.
    pub scheduler: SchedulerTuning,
    /// Frame alignment interval (ms).
    pub frame_interval_ms: u64,
    /// Trial length in days.
    pub trial_days: u32,
}

impl Default for Tuning {
    fn default() -> Self { Self::from(&SpeedchatConfig::default()) }
}

impl From<&SpeedchatConfig> for Tuning {
    fn from(config: &SpeedchatConfig) -> Self {
        Self {
            scheduler: SchedulerTuning {
                debounce_ms: config.effective_debounce_ms(),
                streaming_throttle_ms: config.effective_streaming_throttle_ms(),
            },
            frame_interval_ms: config.effective_frame_interval_ms(),
            trial_days: config.trial_days,
        }
    }
}

/// Point-in-time view of a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    /// Stored enabled switch.
    pub enabled: bool,
    /// Whether the window is actually applied (switch on and not blocked).
    pub effective_enabled: bool,
    /// Stored ultra mode switch.
    pub ultra_mode: bool,
    /// Window size.
    pub window_size: u32,
    /// Blocks currently listed by the source.
    pub total: usize,
    /// Of those, how many are hidden.
    pub hidden: usize,
    /// Blocks evicted this session.
    pub purged: u64,
    /// License state.
    pub app_state: AppState,
    /// Whole trial days left, absent once unlocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_trial_days: Option<u32>,
    /// Scheduler phase.
    pub phase: SchedulerPhase,
    /// Store writes waiting for a retry.
    pub pending_writes: usize,
}

// ============================================================================
// Controller
// ============================================================================

/// Single owner of the windowing engine state.
pub struct Controller {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn ConfigStore>,
    clock: Arc<dyn Clock>,
    timers: Box<dyn Timers>,
    feed: Subscription<MutationBatch>,
    store_changes: Subscription<StoreChange>,
    token: WriteToken,
    settings: Settings,
    // Gating fails closed: until the license state is known the window stays off.
    app_state: AppState,
    license: LicenseGate,
    window: WindowManager,
    prune: PruneEngine,
    scheduler: UpdateScheduler,
    pending_writes: StoreMap,
    last_outcome: ApplyOutcome,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("token", &self.token)
            .field("settings", &self.settings)
            .field("app_state", &self.app_state)
            .field("phase", &self.scheduler.phase())
            .field("last_outcome", &self.last_outcome)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Creates a controller backed by a [`TimerQueue`].
    ///
    /// Settings are read from `store`; if that fails the defaults are used.
    /// An initial update is scheduled right away.
    pub fn new(
        source: Arc<dyn ContentSource>,
        feed: &dyn ChangeFeed,
        store: Arc<dyn ConfigStore>,
        clock: Arc<dyn Clock>,
        tuning: Tuning,
    ) -> Self {
        let timers = Box::new(TimerQueue::new(tuning.frame_interval_ms));
        Self::with_timers(source, feed, store, clock, tuning, timers)
    }

    /// Creates a controller using the given timer service.
    pub fn with_timers(
        source: Arc<dyn ContentSource>,
        feed: &dyn ChangeFeed,
        store: Arc<dyn ConfigStore>,
        clock: Arc<dyn Clock>,
        tuning: Tuning,
        timers: Box<dyn Timers>,
    ) -> Self {
        // Subscribe before reading so no write slips between the two.
        let feed = feed.subscribe();
        let store_changes = store.subscribe();

        let settings = Settings::load(store.as_ref()).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to read settings, using defaults");
            Settings::default()
        });

        let mut controller = Self {
            source,
            store,
            clock,
            timers,
            feed,
            store_changes,
            token: WriteToken::new(),
            settings,
            app_state: AppState::Blocked,
            license: LicenseGate::new(tuning.trial_days),
            window: WindowManager::new(),
            prune: PruneEngine::new(),
            scheduler: UpdateScheduler::new(tuning.scheduler),
            pending_writes: StoreMap::new(),
            last_outcome: ApplyOutcome::default(),
        };

        tracing::debug!(token = %controller.token, settings = ?controller.settings, "controller created");
        controller.refresh_license();
        controller.request(TriggerCause::Startup);
        controller
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Token tagging this controller's own document writes.
    #[must_use]
    pub const fn token(&self) -> WriteToken { self.token }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> Settings { self.settings }

    /// Last known license state.
    #[must_use]
    pub const fn app_state(&self) -> AppState { self.app_state }

    /// Blocks evicted this session.
    #[must_use]
    pub const fn purged(&self) -> PurgeCounter { self.prune.purged() }

    /// Scheduler phase.
    #[must_use]
    pub const fn phase(&self) -> SchedulerPhase { self.scheduler.phase() }

    /// Result of the last apply cycle.
    #[must_use]
    pub const fn last_outcome(&self) -> ApplyOutcome { self.last_outcome }

    /// Current time according to the injected clock.
    #[must_use]
    pub fn now_ms(&self) -> u64 { self.clock.now_ms() }

    /// Earliest armed timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> { self.timers.next_deadline() }

    /// Whether the window is applied at all.
    #[must_use]
    pub fn effective_enabled(&self) -> bool { self.settings.enabled && self.app_state != AppState::Blocked }

    /// Snapshot for display. Reads the store but never writes to it.
    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        let blocks = self.source.list_blocks();
        let remaining_trial_days = match self.app_state {
            AppState::Pro => None,
            AppState::Trial | AppState::Blocked => self
                .license
                .peek_trial_info(self.store.as_ref(), self.clock.now_ms())
                .ok()
                .flatten()
                .map(|info| info.remaining_days),
        };

        ControllerStatus {
            enabled: self.settings.enabled,
            effective_enabled: self.effective_enabled(),
            ultra_mode: self.settings.ultra_mode,
            window_size: self.settings.window_size,
            total: blocks.len(),
            hidden: blocks.iter().filter(|block| block.hidden).count(),
            purged: self.prune.purged().get(),
            app_state: self.app_state,
            remaining_trial_days,
            phase: self.scheduler.phase(),
            pending_writes: self.pending_writes.len(),
        }
    }

    // ------------------------------------------------------------------------
    // Event processing
    // ------------------------------------------------------------------------

    /// Resolves when either subscription has something to process.
    pub async fn changed(&self) {
        tokio::select! {
            () = self.feed.notified() => {}
            () = self.store_changes.notified() => {}
        }
    }

    /// Processes queued notifications, then every timer due at the current
    /// time.
    pub fn pump(&mut self) {
        for batch in self.feed.drain() {
            self.handle_batch(&batch);
        }
        for change in self.store_changes.drain() {
            self.handle_store_change(&change);
        }
        self.fire_due_timers();
    }

    fn handle_batch(&mut self, batch: &MutationBatch) {
        if batch.is_from(self.token) {
            tracing::trace!(added = batch.added.len(), removed = batch.removed.len(), "ignoring own mutation");
            return;
        }
        if !batch.is_relevant() {
            return;
        }
        // Host removals can take the marker or hidden state with them.
        if !batch.removed.is_empty() {
            self.window.invalidate();
        }

        let growing = self.source.is_growing();
        self.request(TriggerCause::Content { growing });
    }

    fn handle_store_change(&mut self, change: &StoreChange) {
        if change.scope != StoreScope::Local {
            return;
        }

        let mut changed = self.settings.apply_change(change);

        if change.new_value(PRO_UNLOCKED).is_some_and(truthy) {
            self.license.mark_pro();
        }
        if change.touches(PRO_UNLOCKED) || change.touches(TRIAL_START) {
            let before = self.app_state;
            self.refresh_license();
            changed |= before != self.app_state;
        }

        if changed {
            tracing::debug!(keys = change.changes.len(), settings = ?self.settings, "resynced from store");
            self.request(TriggerCause::Resync);
        }
    }

    fn fire_due_timers(&mut self) {
        let now = self.clock.now_ms();
        loop {
            let due = self.timers.take_due(now);
            if due.is_empty() {
                break;
            }
            for id in due {
                let growing = self.source.is_growing();
                if self.scheduler.on_timer(self.timers.as_mut(), id, now, growing) == TimerOutcome::Apply {
                    self.run_cycle();
                }
            }
        }
    }

    fn request(&mut self, cause: TriggerCause) {
        self.flush_pending_writes();
        let now = self.clock.now_ms();
        self.scheduler.trigger(self.timers.as_mut(), now, cause);
    }

    /// One apply: window, then automatic eviction, then the window again on
    /// what is left.
    fn run_cycle(&mut self) {
        self.flush_pending_writes();
        self.refresh_license();

        let window = self.effective_window();
        let ultra = window.enabled && self.settings.ultra_mode;
        let source = Arc::clone(&self.source);

        let blocks = source.list_blocks();
        let mut outcome = self.window.apply(source.as_ref(), &blocks, window, ultra, self.token);

        if ultra {
            let removed = self.prune.evict_hidden(source.as_ref(), &source.list_blocks(), self.token);
            if removed > 0 {
                self.persist_purged();
                outcome = self.window.apply(source.as_ref(), &source.list_blocks(), window, ultra, self.token);
            }
        }

        self.last_outcome = outcome;
        self.scheduler.finish_apply(self.clock.now_ms());
    }

    fn effective_window(&self) -> VisibilityWindow {
        VisibilityWindow { enabled: self.effective_enabled(), ..self.settings.window() }
    }

    fn refresh_license(&mut self) {
        let now = self.clock.now_ms();
        let state = match self.license.app_state(self.store.as_ref(), now) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(error = %err, state = %self.app_state, "license state unavailable");
                return;
            }
        };

        if state != self.app_state {
            tracing::info!(from = %self.app_state, to = %state, "license state changed");
            self.app_state = state;
        }

        match self.license.enforce(self.store.as_ref(), state) {
            Ok(true) => self.settings.enabled = false,
            Ok(false) => {}
            Err(err) => tracing::warn!(error = %err, "failed to record license enforcement"),
        }
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    fn persist(&mut self, values: StoreMap) {
        self.pending_writes.extend(values);
        self.flush_pending_writes();
    }

    fn persist_purged(&mut self) {
        let purged = self.prune.purged().get();
        self.persist(map_of([(PURGED_COUNT, Value::from(purged))]));
    }

    /// Writes everything still pending. Returns `false` if the store refused.
    fn flush_pending_writes(&mut self) -> bool {
        if self.pending_writes.is_empty() {
            return true;
        }

        let values = std::mem::take(&mut self.pending_writes);
        match self.store.set(values.clone()) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, keys = values.len(), "store write failed, will retry");
                // Newer values queued meanwhile win over the failed ones.
                let newer = std::mem::replace(&mut self.pending_writes, values);
                self.pending_writes.extend(newer);
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // User actions
    // ------------------------------------------------------------------------

    /// Turns the window on or off.
    ///
    /// # Errors
    ///
    /// Returns `SpeedchatError::LicenseRequired` when enabling while the trial
    /// has expired.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), SpeedchatError> {
        if enabled {
            self.refresh_license();
            if self.app_state == AppState::Blocked {
                return Err(SpeedchatError::LicenseRequired);
            }
        }

        self.settings.enabled = enabled;
        self.persist(map_of([(ENABLED, Value::Bool(enabled))]));
        self.request(TriggerCause::Settings);
        Ok(())
    }

    /// Sets the window size. Returns the size actually used after clamping
    /// and snapping.
    pub fn set_window_size(&mut self, size: i64) -> u32 {
        let size = VisibilityWindow::normalize_size(size);
        self.settings.window_size = size;
        self.persist(map_of([(VISIBLE_MESSAGES, Value::from(size))]));
        self.request(TriggerCause::Settings);
        size
    }

    /// Turns automatic eviction on or off.
    pub fn set_ultra_mode(&mut self, ultra_mode: bool) {
        self.settings.ultra_mode = ultra_mode;
        self.persist(map_of([(ULTRA_MODE, Value::Bool(ultra_mode))]));
        self.request(TriggerCause::Settings);
    }

    /// Evicts every hidden block now. Does nothing unless the window is
    /// applied. Returns the number of blocks removed.
    pub fn purge_now(&mut self) -> usize {
        if !self.effective_enabled() {
            tracing::debug!("purge ignored, window is not applied");
            return 0;
        }

        let source = Arc::clone(&self.source);
        let removed = self.prune.evict_hidden(source.as_ref(), &source.list_blocks(), self.token);
        if removed > 0 {
            self.persist_purged();
        }
        self.request(TriggerCause::Purge);
        removed
    }

    /// Unlocks with `key`. Returns whether the key was accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the key was valid but could not be persisted.
    pub fn unlock(&mut self, key: &str) -> Result<bool, SpeedchatError> {
        if !self.license.unlock(self.store.as_ref(), key)? {
            return Ok(false);
        }
        self.app_state = AppState::Pro;
        self.request(TriggerCause::Settings);
        Ok(true)
    }
}
