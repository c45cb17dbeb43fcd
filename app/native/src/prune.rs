//! Eviction of hidden blocks.
//!
//! Hiding keeps nodes alive; on very long conversations that still costs
//! memory. Eviction removes every block that is currently hidden. Evicted
//! content only comes back with a full reload of the page.

use serde::{Deserialize, Serialize};

use crate::content::{ContentBlock, ContentSource, OwnWrites, WriteToken};

/// Number of blocks evicted so far. Never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PurgeCounter(u64);

impl PurgeCounter {
    /// Current count.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }

    fn record(&mut self, removed: usize) {
        self.0 = self.0.saturating_add(u64::try_from(removed).unwrap_or(u64::MAX));
    }
}

/// Removes hidden blocks and accounts for them.
#[derive(Debug, Default)]
pub struct PruneEngine {
    purged: PurgeCounter,
}

impl PruneEngine {
    /// Creates an engine with a zero counter.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Total evicted this session.
    #[must_use]
    pub const fn purged(&self) -> PurgeCounter { self.purged }

    /// Removes every block in `blocks` that is flagged hidden.
    ///
    /// `blocks` must be a listing taken after the window was applied. The
    /// removals are tagged with `token` so they do not re-trigger an update.
    /// Returns how many blocks were actually removed.
    pub fn evict_hidden(
        &mut self,
        source: &dyn ContentSource,
        blocks: &[ContentBlock],
        token: WriteToken,
    ) -> usize {
        let hidden: Vec<_> = blocks.iter().filter(|block| block.hidden).collect();
        if hidden.is_empty() {
            return 0;
        }

        let _scope = OwnWrites::begin(source, token);
        let removed = hidden.into_iter().filter(|block| source.remove(block.id)).count();

        self.purged.record(removed);
        tracing::info!(removed, purged_total = self.purged.get(), "evicted hidden blocks");
        removed
    }
}
