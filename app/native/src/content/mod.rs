//! Content blocks and the contract for the document that holds them.
//!
//! The engine never touches the host document directly. It reads blocks
//! through [`ContentSource::list_blocks`] and mutates them only through the
//! narrow hide/show/remove/marker primitives below.
//!
//! Mutations the engine makes itself are wrapped in an [`OwnWrites`] scope.
//! A source tags every change-feed batch produced inside that scope with the
//! scope's [`WriteToken`], which lets the scheduler ignore its own echoes.

pub mod discovery;
mod document;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use document::{Document, ElementSpec};

/// Identifier of a node in the host document.
///
/// Ids are handed out in insertion order, so they double as the block's
/// stable position index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "#{}", self.0) }
}

/// Snapshot of one content block as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Node that backs this block.
    pub id: NodeId,
    /// Whether the block is currently hidden.
    pub hidden: bool,
}

/// Tag attached to mutations made by one controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WriteToken(Uuid);

impl WriteToken {
    /// Creates a fresh, unique token.
    #[must_use]
    pub fn new() -> Self { Self(Uuid::now_v7()) }
}

impl Default for WriteToken {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Display for WriteToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { self.0.fmt(f) }
}

/// Query/mutate contract for the document holding the conversation.
pub trait ContentSource {
    /// Returns the attached, non-empty content blocks in document order.
    fn list_blocks(&self) -> Vec<ContentBlock>;

    /// Whether the host is still streaming new content into the document.
    fn is_growing(&self) -> bool;

    /// Hides a block. Unknown ids are ignored.
    fn hide(&self, id: NodeId);

    /// Shows a block. Unknown ids are ignored.
    fn show(&self, id: NodeId);

    /// Removes a block from the document. Returns `false` if it was not there.
    fn remove(&self, id: NodeId) -> bool;

    /// Places the single cutoff marker right before `id`, replacing any
    /// existing marker. Returns `false` if `id` is not attached.
    fn insert_marker_before(&self, id: NodeId, text: &str) -> bool;

    /// Removes the cutoff marker. Returns `false` if there was none.
    fn remove_marker(&self) -> bool;

    /// Starts tagging change notifications with `token`.
    fn begin_own_writes(&self, token: WriteToken);

    /// Stops tagging change notifications.
    fn end_own_writes(&self);
}

/// Scope during which every document mutation is attributed to `token`.
///
/// Tagging stops when the scope is dropped.
pub struct OwnWrites<'a> {
    source: &'a dyn ContentSource,
}

impl<'a> OwnWrites<'a> {
    /// Opens a tagging scope on `source`.
    #[must_use]
    pub fn begin(source: &'a dyn ContentSource, token: WriteToken) -> Self {
        source.begin_own_writes(token);
        Self { source }
    }
}

impl Drop for OwnWrites<'_> {
    fn drop(&mut self) { self.source.end_own_writes(); }
}
