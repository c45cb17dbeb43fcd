//! In-memory host document.
//!
//! A flat, ordered tree of elements that implements both [`ContentSource`]
//! and [`ChangeFeed`]. It behaves like a child-list observer on the real
//! page: attaching, detaching, removing nodes and moving the marker emit a
//! [`MutationBatch`]; toggling visibility does not.
//!
//! Handles are cheap to clone and share the same document, so a host (or a
//! test) can keep appending turns while the controller owns another handle.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::discovery::{self, NodeView};
use super::{ContentBlock, ContentSource, NodeId, WriteToken};
use crate::feed::{ChangeFeed, MutationBatch};
use crate::hub::{Hub, Subscription};

type Attributes = SmallVec<[(String, String); 2]>;

/// Description of an element to attach.
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    tag: String,
    attrs: Attributes,
    text: String,
}

impl ElementSpec {
    /// An element with the given tag and no attributes or text.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into().to_ascii_lowercase(), ..Self::default() }
    }

    /// A conversation turn as rendered by the chat page.
    #[must_use]
    pub fn turn(index: usize, text: impl Into<String>) -> Self {
        Self::new("article")
            .attr("data-testid", format!("conversation-turn-{index}"))
            .text(text)
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Sets the text content.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

#[derive(Debug)]
struct Node {
    id: NodeId,
    tag: String,
    attrs: Attributes,
    text: String,
    attached: bool,
    hidden: bool,
}

impl NodeView for Node {
    fn tag(&self) -> &str { &self.tag }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    fn text(&self) -> &str { &self.text }

    fn is_attached(&self) -> bool { self.attached }
}

#[derive(Debug)]
struct Marker {
    id: NodeId,
    /// Node the marker sits in front of; `None` once it ends up last.
    before: Option<NodeId>,
    text: String,
}

#[derive(Debug, Default)]
struct DocumentState {
    nodes: Vec<Node>,
    marker: Option<Marker>,
    next_id: u64,
    growing: bool,
    own_writes: Option<WriteToken>,
}

impl DocumentState {
    fn allocate_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    fn position(&self, id: NodeId) -> Option<usize> { self.nodes.iter().position(|node| node.id == id) }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    /// Keeps the marker in front of whatever now follows a removed node.
    fn reanchor_marker(&mut self, removed: NodeId, removed_at: usize) {
        let next = self.nodes.get(removed_at).map(|node| node.id);
        if let Some(marker) = self.marker.as_mut().filter(|marker| marker.before == Some(removed)) {
            marker.before = next;
        }
    }
}

/// Shared handle to an in-memory document.
#[derive(Clone, Default)]
pub struct Document {
    state: Arc<Mutex<DocumentState>>,
    hub: Hub<MutationBatch>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Document")
            .field("nodes", &state.nodes.len())
            .field("marker", &state.marker.as_ref().map(|marker| marker.id))
            .field("growing", &state.growing)
            .field("subscribers", &self.hub.subscriber_count())
            .finish()
    }
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Attaches a new element at the end of the document.
    pub fn append(&self, spec: ElementSpec) -> NodeId {
        let (id, origin) = {
            let mut state = self.state.lock();
            let id = state.allocate_id();
            state.nodes.push(Node {
                id,
                tag: spec.tag,
                attrs: spec.attrs,
                text: spec.text,
                attached: true,
                hidden: false,
            });
            (id, state.own_writes)
        };
        self.hub.publish(&MutationBatch::added(id, origin));
        id
    }

    /// Appends a conversation turn numbered after the existing nodes.
    pub fn push_turn(&self, text: impl Into<String>) -> NodeId {
        let index = self.state.lock().nodes.len() + 1;
        self.append(ElementSpec::turn(index, text))
    }

    /// Streams more text into an existing node.
    ///
    /// On the real page streamed tokens arrive as new text children inside
    /// the block, so this is reported as a child-list change of the block.
    pub fn append_text(&self, id: NodeId, chunk: &str) -> bool {
        let origin = {
            let mut state = self.state.lock();
            let Some(node) = state.node_mut(id) else {
                return false;
            };
            node.text.push_str(chunk);
            state.own_writes
        };
        self.hub.publish(&MutationBatch::added(id, origin));
        true
    }

    /// Detaches a node the way the host page would, leaving a stale handle.
    pub fn detach(&self, id: NodeId) -> bool {
        let origin = {
            let mut state = self.state.lock();
            let Some(node) = state.node_mut(id).filter(|node| node.attached) else {
                return false;
            };
            node.attached = false;
            state.own_writes
        };
        self.hub.publish(&MutationBatch::removed(id, origin));
        true
    }

    /// Sets the host's "still generating" indicator.
    pub fn set_growing(&self, growing: bool) { self.state.lock().growing = growing; }

    /// Hidden flag of a node, `None` if it is not in the document.
    #[must_use]
    pub fn is_hidden(&self, id: NodeId) -> Option<bool> {
        let state = self.state.lock();
        state.position(id).map(|index| state.nodes[index].hidden)
    }

    /// Number of nodes still in the document, attached or not.
    #[must_use]
    pub fn node_count(&self) -> usize { self.state.lock().nodes.len() }

    /// Number of attached nodes currently hidden.
    #[must_use]
    pub fn hidden_count(&self) -> usize {
        self.state.lock().nodes.iter().filter(|node| node.attached && node.hidden).count()
    }

    /// Text of the cutoff marker, if one is present.
    #[must_use]
    pub fn marker_text(&self) -> Option<String> {
        self.state.lock().marker.as_ref().map(|marker| marker.text.clone())
    }

    /// Node the cutoff marker precedes, if a marker is present and anchored.
    #[must_use]
    pub fn marker_before(&self) -> Option<NodeId> {
        self.state.lock().marker.as_ref().and_then(|marker| marker.before)
    }

    /// Whether a cutoff marker is present.
    #[must_use]
    pub fn has_marker(&self) -> bool { self.state.lock().marker.is_some() }

    fn set_hidden(&self, id: NodeId, hidden: bool) {
        if let Some(node) = self.state.lock().node_mut(id) {
            node.hidden = hidden;
        }
    }
}

impl ContentSource for Document {
    fn list_blocks(&self) -> Vec<ContentBlock> {
        let state = self.state.lock();
        discovery::discover(&state.nodes)
            .indices
            .into_iter()
            .map(|index| {
                let node = &state.nodes[index];
                ContentBlock { id: node.id, hidden: node.hidden }
            })
            .collect()
    }

    fn is_growing(&self) -> bool { self.state.lock().growing }

    fn hide(&self, id: NodeId) { self.set_hidden(id, true); }

    fn show(&self, id: NodeId) { self.set_hidden(id, false); }

    fn remove(&self, id: NodeId) -> bool {
        let origin = {
            let mut state = self.state.lock();
            let Some(index) = state.position(id) else {
                return false;
            };
            state.nodes.remove(index);
            state.reanchor_marker(id, index);
            state.own_writes
        };
        self.hub.publish(&MutationBatch::removed(id, origin));
        true
    }

    fn insert_marker_before(&self, id: NodeId, text: &str) -> bool {
        let batch = {
            let mut state = self.state.lock();
            let anchored = state.position(id).is_some_and(|index| state.nodes[index].attached);
            if !anchored {
                return false;
            }

            let marker_id = state.allocate_id();
            let mut batch = MutationBatch::added(marker_id, state.own_writes);
            if let Some(previous) = state.marker.take() {
                batch.removed.push(previous.id);
            }
            state.marker = Some(Marker { id: marker_id, before: Some(id), text: text.to_string() });
            batch
        };
        self.hub.publish(&batch);
        true
    }

    fn remove_marker(&self) -> bool {
        let batch = {
            let mut state = self.state.lock();
            let Some(marker) = state.marker.take() else {
                return false;
            };
            MutationBatch::removed(marker.id, state.own_writes)
        };
        self.hub.publish(&batch);
        true
    }

    fn begin_own_writes(&self, token: WriteToken) { self.state.lock().own_writes = Some(token); }

    fn end_own_writes(&self) { self.state.lock().own_writes = None; }
}

impl ChangeFeed for Document {
    fn subscribe(&self) -> Subscription<MutationBatch> { self.hub.subscribe() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::OwnWrites;

    fn document_with_turns(count: usize) -> (Document, Vec<NodeId>) {
        let document = Document::new();
        let ids = (0..count).map(|n| document.push_turn(format!("message {n}"))).collect();
        (document, ids)
    }

    #[test]
    fn test_list_blocks_in_insertion_order() {
        let (document, ids) = document_with_turns(4);
        let listed: Vec<NodeId> = document.list_blocks().iter().map(|block| block.id).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn test_blank_blocks_are_excluded() {
        let (document, _) = document_with_turns(2);
        document.append(ElementSpec::turn(3, "   "));
        assert_eq!(document.list_blocks().len(), 2);
    }

    #[test]
    fn test_detached_blocks_are_excluded() {
        let (document, ids) = document_with_turns(3);
        assert!(document.detach(ids[1]));
        assert!(!document.detach(ids[1]));
        assert_eq!(document.list_blocks().len(), 2);
        assert_eq!(document.node_count(), 3);
    }

    #[test]
    fn test_hide_and_show_do_not_notify() {
        let (document, ids) = document_with_turns(2);
        let mut feed = document.subscribe();

        document.hide(ids[0]);
        assert_eq!(document.is_hidden(ids[0]), Some(true));
        document.show(ids[0]);
        assert_eq!(document.is_hidden(ids[0]), Some(false));
        assert!(feed.try_next().is_none());
    }

    #[test]
    fn test_append_notifies_subscribers() {
        let document = Document::new();
        let mut feed = document.subscribe();
        let id = document.push_turn("hello");

        let batch = feed.try_next().expect("append should notify");
        assert_eq!(batch.added.as_slice(), &[id]);
        assert!(batch.origin.is_none());
    }

    #[test]
    fn test_own_writes_are_tagged() {
        let (document, ids) = document_with_turns(2);
        let mut feed = document.subscribe();
        let token = WriteToken::new();

        {
            let _scope = OwnWrites::begin(&document, token);
            assert!(document.remove(ids[0]));
        }
        assert!(document.remove(ids[1]));

        let first = feed.try_next().expect("tagged removal");
        let second = feed.try_next().expect("untagged removal");
        assert!(first.is_from(token));
        assert!(second.origin.is_none());
    }

    #[test]
    fn test_single_marker_is_replaced() {
        let (document, ids) = document_with_turns(3);
        assert!(document.insert_marker_before(ids[1], "hid 1"));
        assert!(document.insert_marker_before(ids[2], "hid 2"));

        assert_eq!(document.marker_text().as_deref(), Some("hid 2"));
        assert_eq!(document.marker_before(), Some(ids[2]));
        assert!(document.remove_marker());
        assert!(!document.remove_marker());
        assert!(!document.has_marker());
    }

    #[test]
    fn test_marker_needs_attached_anchor() {
        let (document, ids) = document_with_turns(2);
        document.detach(ids[1]);
        assert!(!document.insert_marker_before(ids[1], "nope"));
        assert!(!document.insert_marker_before(NodeId(999), "nope"));
    }

    #[test]
    fn test_marker_follows_removed_anchor() {
        let (document, ids) = document_with_turns(3);
        document.insert_marker_before(ids[1], "hid 1");
        document.remove(ids[1]);
        assert_eq!(document.marker_before(), Some(ids[2]));
    }

    #[test]
    fn test_growing_flag() {
        let document = Document::new();
        assert!(!document.is_growing());
        document.set_growing(true);
        assert!(document.is_growing());
    }

    #[test]
    fn test_append_text_notifies() {
        let (document, ids) = document_with_turns(1);
        let mut feed = document.subscribe();
        assert!(document.append_text(ids[0], " more"));
        assert!(feed.try_next().is_some());
        assert!(!document.append_text(NodeId(404), "x"));
    }
}
