//! Virtual-time harness.
//!
//! Bundles an in-memory [`Document`], a [`ManualClock`] and a [`Controller`]
//! so that a whole session can be replayed without sleeping. Time only moves
//! through [`Simulation::advance`], which steps from deadline to deadline so
//! every timer fires at its own time.

use std::sync::Arc;

use crate::clock::ManualClock;
use crate::content::Document;
use crate::controller::{Controller, Tuning};
use crate::store::ConfigStore;

/// Upper bound on virtual time [`Simulation::settle`] will skip ahead.
const SETTLE_LIMIT_MS: u64 = 60_000;

/// A controller over an in-memory document with hand-driven time.
#[derive(Debug)]
pub struct Simulation {
    /// Host document; append to it to simulate the page.
    pub document: Document,
    /// Virtual clock shared with the controller.
    pub clock: ManualClock,
    /// The controller under simulation.
    pub controller: Controller,
}

impl Simulation {
    /// Starts a session at `start_ms` over an empty document.
    pub fn new(store: Arc<dyn ConfigStore>, tuning: Tuning, start_ms: u64) -> Self {
        Self::with_document(Document::new(), store, tuning, start_ms)
    }

    /// Starts a session over an existing document.
    pub fn with_document(document: Document, store: Arc<dyn ConfigStore>, tuning: Tuning, start_ms: u64) -> Self {
        let clock = ManualClock::new(start_ms);
        let controller =
            Controller::new(Arc::new(document.clone()), &document, store, Arc::new(clock.clone()), tuning);
        Self { document, clock, controller }
    }

    /// Current virtual time.
    #[must_use]
    pub fn now_ms(&self) -> u64 { crate::clock::Clock::now_ms(&self.clock) }

    /// Moves virtual time forward by `delta_ms`, firing every timer at its
    /// deadline on the way.
    pub fn advance(&mut self, delta_ms: u64) {
        let target = self.now_ms().saturating_add(delta_ms);
        loop {
            self.controller.pump();
            match self.controller.next_deadline() {
                Some(deadline) if deadline <= target => self.clock.set(deadline.max(self.now_ms())),
                _ => break,
            }
        }
        self.clock.set(target);
        self.controller.pump();
    }

    /// Advances until no timer is armed, up to a minute of virtual time.
    pub fn settle(&mut self) {
        let limit = self.now_ms().saturating_add(SETTLE_LIMIT_MS);
        self.controller.pump();
        while let Some(deadline) = self.controller.next_deadline() {
            if deadline > limit {
                break;
            }
            let now = self.now_ms();
            self.advance(deadline.saturating_sub(now));
        }
    }
}
