//! Change notifications from the host document.
//!
//! A [`ChangeFeed`] hands out subscriptions yielding one [`MutationBatch`]
//! per observed child-list change. Batches produced inside an
//! [`OwnWrites`](crate::content::OwnWrites) scope carry the writer's token.

use smallvec::SmallVec;

use crate::content::{NodeId, WriteToken};
use crate::hub::Subscription;

/// Inline capacity for node lists in a batch. Most batches touch one node.
const BATCH_INLINE_CAP: usize = 4;

/// Nodes added to or removed from the document in one observed change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    /// Nodes that were attached.
    pub added: SmallVec<[NodeId; BATCH_INLINE_CAP]>,
    /// Nodes that were detached or removed.
    pub removed: SmallVec<[NodeId; BATCH_INLINE_CAP]>,
    /// Writer that produced this change, if it was made inside an own-write scope.
    pub origin: Option<WriteToken>,
}

impl MutationBatch {
    /// A batch for a single added node.
    #[must_use]
    pub fn added(id: NodeId, origin: Option<WriteToken>) -> Self {
        let mut batch = Self { origin, ..Self::default() };
        batch.added.push(id);
        batch
    }

    /// A batch for a single removed node.
    #[must_use]
    pub fn removed(id: NodeId, origin: Option<WriteToken>) -> Self {
        let mut batch = Self { origin, ..Self::default() };
        batch.removed.push(id);
        batch
    }

    /// Whether the batch changed the child list at all.
    #[must_use]
    pub fn is_relevant(&self) -> bool { !self.added.is_empty() || !self.removed.is_empty() }

    /// Whether the batch was produced by the writer holding `token`.
    #[must_use]
    pub fn is_from(&self, token: WriteToken) -> bool { self.origin == Some(token) }
}

/// Source of document change notifications.
pub trait ChangeFeed {
    /// Starts observing. Dropping the subscription stops it.
    fn subscribe(&self) -> Subscription<MutationBatch>;
}
