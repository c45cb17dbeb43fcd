//! Tiered discovery of content blocks.
//!
//! The host markup is not a stable contract, so blocks are located with a
//! fallback chain. The first tier that yields enough matches wins:
//!
//! 1. `article` elements carrying a `data-testid` (at least 2)
//! 2. any `article` element (at least 2)
//! 3. any element with a message-like attribute marker (no minimum)
//!
//! Only attached nodes with non-empty trimmed text qualify in every tier.

/// Read-only view of a document node, as needed for discovery.
pub trait NodeView {
    /// Lowercase element tag name.
    fn tag(&self) -> &str;
    /// Value of attribute `name`, if present.
    fn attr(&self, name: &str) -> Option<&str>;
    /// Text content of the node.
    fn text(&self) -> &str;
    /// Whether the node is still attached to the document.
    fn is_attached(&self) -> bool;
}

const TEST_ID_ATTR: &str = "data-testid";
const AUTHOR_ROLE_ATTR: &str = "data-message-author-role";
const TEST_ID_KEYWORDS: &[&str] = &["conversation", "message"];

/// Discovery tier, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// `article[data-testid]`
    TestIdArticle,
    /// `article`
    Article,
    /// `[data-message-author-role]`, `[data-testid*=conversation]`, `[data-testid*=message]`
    AttributeMarker,
}

impl Tier {
    /// All tiers in fallback order.
    pub const ALL: [Self; 3] = [Self::TestIdArticle, Self::Article, Self::AttributeMarker];

    /// Matches a tier needs before it is accepted.
    #[must_use]
    pub const fn min_matches(self) -> usize {
        match self {
            Self::TestIdArticle | Self::Article => 2,
            Self::AttributeMarker => 0,
        }
    }

    /// Whether `node` matches this tier's structural marker.
    pub fn matches(self, node: &impl NodeView) -> bool {
        match self {
            Self::TestIdArticle => node.tag() == "article" && node.attr(TEST_ID_ATTR).is_some(),
            Self::Article => node.tag() == "article",
            Self::AttributeMarker => {
                node.attr(AUTHOR_ROLE_ATTR).is_some()
                    || node.attr(TEST_ID_ATTR).is_some_and(|id| {
                        TEST_ID_KEYWORDS.iter().any(|keyword| id.contains(keyword))
                    })
            }
        }
    }
}

/// Whether a node is eligible at all: attached and with visible text.
pub fn qualifies(node: &impl NodeView) -> bool {
    node.is_attached() && !node.text().trim().is_empty()
}

/// Outcome of a discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Tier that produced the result, `None` when nothing matched.
    pub tier: Option<Tier>,
    /// Indices into the scanned node slice, in document order.
    pub indices: Vec<usize>,
}

/// Runs the tiered discovery over nodes given in document order.
pub fn discover<N: NodeView>(nodes: &[N]) -> Discovery {
    for tier in Tier::ALL {
        let indices: Vec<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| tier.matches(*node) && qualifies(*node))
            .map(|(index, _)| index)
            .collect();

        if !indices.is_empty() && indices.len() >= tier.min_matches() {
            return Discovery { tier: Some(tier), indices };
        }
    }

    Discovery::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeNode {
        tag: &'static str,
        attrs: Vec<(&'static str, &'static str)>,
        text: &'static str,
        attached: bool,
    }

    impl FakeNode {
        fn new(tag: &'static str, attrs: &[(&'static str, &'static str)], text: &'static str) -> Self {
            Self { tag, attrs: attrs.to_vec(), text, attached: true }
        }
    }

    impl NodeView for FakeNode {
        fn tag(&self) -> &str { self.tag }

        fn attr(&self, name: &str) -> Option<&str> {
            self.attrs.iter().find(|(key, _)| *key == name).map(|(_, value)| *value)
        }

        fn text(&self) -> &str { self.text }

        fn is_attached(&self) -> bool { self.attached }
    }

    #[test]
    fn test_prefers_test_id_articles() {
        let nodes = vec![
            FakeNode::new("article", &[("data-testid", "conversation-turn-1")], "hi"),
            FakeNode::new("article", &[], "plain"),
            FakeNode::new("article", &[("data-testid", "conversation-turn-2")], "there"),
        ];
        let found = discover(&nodes);
        assert_eq!(found.tier, Some(Tier::TestIdArticle));
        assert_eq!(found.indices, vec![0, 2]);
    }

    #[test]
    fn test_falls_back_to_plain_articles() {
        let nodes = vec![
            FakeNode::new("article", &[("data-testid", "turn")], "only one"),
            FakeNode::new("article", &[], "second"),
            FakeNode::new("div", &[], "not an article"),
        ];
        let found = discover(&nodes);
        assert_eq!(found.tier, Some(Tier::Article));
        assert_eq!(found.indices, vec![0, 1]);
    }

    #[test]
    fn test_falls_back_to_attribute_markers_without_minimum() {
        let nodes = vec![
            FakeNode::new("div", &[("data-message-author-role", "user")], "question"),
            FakeNode::new("div", &[("data-testid", "sidebar")], "nav"),
        ];
        let found = discover(&nodes);
        assert_eq!(found.tier, Some(Tier::AttributeMarker));
        assert_eq!(found.indices, vec![0]);
    }

    #[test]
    fn test_test_id_keyword_match() {
        let node = FakeNode::new("section", &[("data-testid", "message-42")], "x");
        assert!(Tier::AttributeMarker.matches(&node));
        let other = FakeNode::new("section", &[("data-testid", "composer")], "x");
        assert!(!Tier::AttributeMarker.matches(&other));
    }

    #[test]
    fn test_skips_blank_and_detached_nodes() {
        let mut detached = FakeNode::new("article", &[("data-testid", "t3")], "gone");
        detached.attached = false;
        let nodes = vec![
            FakeNode::new("article", &[("data-testid", "t1")], "   "),
            FakeNode::new("article", &[("data-testid", "t2")], "kept"),
            detached,
            FakeNode::new("article", &[("data-testid", "t4")], "kept too"),
        ];
        let found = discover(&nodes);
        assert_eq!(found.tier, Some(Tier::TestIdArticle));
        assert_eq!(found.indices, vec![1, 3]);
    }

    #[test]
    fn test_nothing_found() {
        let nodes = vec![FakeNode::new("div", &[], "chrome")];
        assert_eq!(discover(&nodes), Discovery::default());
        assert_eq!(discover::<FakeNode>(&[]), Discovery::default());
    }
}
