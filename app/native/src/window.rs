//! Visible window over the content blocks.
//!
//! Given the ordered blocks and a window size, everything before the cutoff
//! index is hidden and everything from the cutoff on is shown. A single
//! marker in front of the first visible block reports how many blocks were
//! hidden.
//!
//! Disabling the window never hides anything: all blocks are shown and the
//! marker is removed.
//!
//! Re-application is guarded by an [`UpdateSignature`]. When enabled flags,
//! size, block count and cutoff are unchanged since the last apply, no
//! mutation happens at all.

use serde::{Deserialize, Serialize};

use crate::constants::window::{DEFAULT_VISIBLE, MAX_VISIBLE, MIN_VISIBLE, STEP_VISIBLE};
use crate::content::{ContentBlock, ContentSource, OwnWrites, WriteToken};

/// Size and state of the visible window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityWindow {
    /// Number of trailing blocks kept visible.
    pub size: u32,
    /// Whether blocks outside the window are hidden.
    pub enabled: bool,
}

impl Default for VisibilityWindow {
    fn default() -> Self { Self { size: DEFAULT_VISIBLE, enabled: true } }
}

impl VisibilityWindow {
    /// Creates a window, normalizing `size` into the accepted range.
    #[must_use]
    pub fn new(size: i64, enabled: bool) -> Self { Self { size: Self::normalize_size(size), enabled } }

    /// Clamps a raw size into `[MIN_VISIBLE, MAX_VISIBLE]` and snaps it to the
    /// nearest multiple of `STEP_VISIBLE`.
    #[must_use]
    pub fn normalize_size(raw: i64) -> u32 {
        let clamped = raw.clamp(i64::from(MIN_VISIBLE), i64::from(MAX_VISIBLE));
        let step = i64::from(STEP_VISIBLE);
        let snapped = ((clamped + step / 2) / step) * step;
        // Bounds are step-aligned, so snapping stays inside them.
        u32::try_from(snapped.min(i64::from(MAX_VISIBLE))).unwrap_or(DEFAULT_VISIBLE)
    }

    /// Index of the first visible block for `total` blocks.
    #[must_use]
    pub fn cutoff(&self, total: usize) -> usize {
        total.saturating_sub(usize::try_from(self.size).unwrap_or(usize::MAX))
    }
}

/// Everything that decides what an apply would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSignature {
    /// Window enabled.
    pub enabled: bool,
    /// Automatic eviction enabled.
    pub ultra_enabled: bool,
    /// Window size.
    pub size: u32,
    /// Number of blocks.
    pub total: usize,
    /// First visible index.
    pub cutoff: usize,
}

/// Result of one [`WindowManager::apply`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    /// Number of blocks seen.
    pub total: usize,
    /// First visible index (equals the hidden count when enabled).
    pub cutoff: usize,
    /// Whether any hide/show/marker mutation was performed.
    pub mutated: bool,
}

/// Applies the visible window to a content source.
#[derive(Debug, Default)]
pub struct WindowManager {
    last: Option<UpdateSignature>,
}

impl WindowManager {
    /// Creates a manager that has never applied anything.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Signature of the last mutation pass.
    #[must_use]
    pub const fn last_signature(&self) -> Option<UpdateSignature> { self.last }

    /// Forgets the last signature so the next apply always mutates.
    pub fn invalidate(&mut self) { self.last = None; }

    /// Hides and shows `blocks` according to `window`.
    ///
    /// `blocks` must be the current, ordered listing from `source`. All
    /// mutations are tagged with `token`.
    pub fn apply(
        &mut self,
        source: &dyn ContentSource,
        blocks: &[ContentBlock],
        window: VisibilityWindow,
        ultra_enabled: bool,
        token: WriteToken,
    ) -> ApplyOutcome {
        let _scope = OwnWrites::begin(source, token);

        if blocks.is_empty() {
            source.remove_marker();
            self.invalidate();
            return ApplyOutcome::default();
        }

        let total = blocks.len();
        let cutoff = window.cutoff(total);
        let signature = UpdateSignature {
            enabled: window.enabled,
            ultra_enabled,
            size: window.size,
            total,
            cutoff,
        };

        if self.last == Some(signature) {
            tracing::trace!(total, cutoff, "window unchanged, skipping apply");
            return ApplyOutcome { total, cutoff, mutated: false };
        }

        if window.enabled {
            for (index, block) in blocks.iter().enumerate() {
                if index < cutoff {
                    source.hide(block.id);
                } else {
                    source.show(block.id);
                }
            }

            if cutoff > 0 {
                source.insert_marker_before(blocks[cutoff].id, &marker_text(cutoff));
            } else {
                source.remove_marker();
            }
        } else {
            for block in blocks {
                source.show(block.id);
            }
            source.remove_marker();
        }

        self.last = Some(signature);
        tracing::debug!(total, cutoff, enabled = window.enabled, "window applied");

        ApplyOutcome { total, cutoff, mutated: true }
    }
}

/// Text shown in the cutoff marker.
#[must_use]
pub fn marker_text(hidden: usize) -> String {
    if hidden == 1 {
        "SpeedChat hid 1 earlier message".to_string()
    } else {
        format!("SpeedChat hid {hidden} earlier messages")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Document;

    fn setup(count: usize) -> (Document, WindowManager, WriteToken) {
        let document = Document::new();
        for n in 0..count {
            document.push_turn(format!("turn {n}"));
        }
        (document, WindowManager::new(), WriteToken::new())
    }

    fn window(size: u32, enabled: bool) -> VisibilityWindow { VisibilityWindow { size, enabled } }

    #[test]
    fn test_normalize_size_clamps_and_snaps() {
        assert_eq!(VisibilityWindow::normalize_size(0), MIN_VISIBLE);
        assert_eq!(VisibilityWindow::normalize_size(-40), MIN_VISIBLE);
        assert_eq!(VisibilityWindow::normalize_size(1_000), MAX_VISIBLE);
        assert_eq!(VisibilityWindow::normalize_size(30), 30);
        assert_eq!(VisibilityWindow::normalize_size(47), 45);
        assert_eq!(VisibilityWindow::normalize_size(48), 50);
        assert_eq!(VisibilityWindow::normalize_size(118), MAX_VISIBLE);
    }

    #[test]
    fn test_cutoff() {
        let win = window(30, true);
        assert_eq!(win.cutoff(50), 20);
        assert_eq!(win.cutoff(30), 0);
        assert_eq!(win.cutoff(5), 0);
    }

    #[test]
    fn test_hides_everything_before_cutoff() {
        for (count, size) in [(50, 30), (31, 30), (30, 30), (12, 10), (3, 10)] {
            let (document, mut manager, token) = setup(count);
            let blocks = document.list_blocks();
            let outcome = manager.apply(&document, &blocks, window(size, true), false, token);

            let expected = count.saturating_sub(size as usize);
            assert_eq!(outcome.cutoff, expected);
            assert_eq!(document.hidden_count(), expected);
            assert_eq!(document.has_marker(), expected > 0);
        }
    }

    #[test]
    fn test_marker_precedes_first_visible_block() {
        let (document, mut manager, token) = setup(50);
        let blocks = document.list_blocks();
        manager.apply(&document, &blocks, window(30, true), false, token);

        assert_eq!(document.marker_before(), Some(blocks[20].id));
        assert!(document.marker_text().unwrap().contains("20"));
        assert_eq!(document.is_hidden(blocks[19].id), Some(true));
        assert_eq!(document.is_hidden(blocks[20].id), Some(false));
    }

    #[test]
    fn test_disabled_shows_everything() {
        let (document, mut manager, token) = setup(50);
        let blocks = document.list_blocks();
        manager.apply(&document, &blocks, window(30, true), false, token);
        assert_eq!(document.hidden_count(), 20);

        let outcome = manager.apply(&document, &blocks, window(30, false), false, token);
        assert!(outcome.mutated);
        assert_eq!(document.hidden_count(), 0);
        assert!(!document.has_marker());
    }

    #[test]
    fn test_unchanged_signature_performs_no_mutation() {
        let (document, mut manager, token) = setup(40);
        let blocks = document.list_blocks();
        let mut feed = crate::feed::ChangeFeed::subscribe(&document);

        assert!(manager.apply(&document, &blocks, window(30, true), false, token).mutated);
        let first_pass = feed.drain().len();
        assert!(first_pass > 0);

        let again = manager.apply(&document, &blocks, window(30, true), false, token);
        assert!(!again.mutated);
        assert!(feed.drain().is_empty());
    }

    #[test]
    fn test_ultra_flag_is_part_of_signature() {
        let (document, mut manager, token) = setup(40);
        let blocks = document.list_blocks();
        manager.apply(&document, &blocks, window(30, true), false, token);
        assert!(manager.apply(&document, &blocks, window(30, true), true, token).mutated);
    }

    #[test]
    fn test_empty_list_removes_marker_and_forgets_signature() {
        let (document, mut manager, token) = setup(40);
        let blocks = document.list_blocks();
        manager.apply(&document, &blocks, window(30, true), false, token);

        let outcome = manager.apply(&document, &[], window(30, true), false, token);
        assert_eq!(outcome, ApplyOutcome::default());
        assert!(!document.has_marker());
        assert_eq!(manager.last_signature(), None);

        let outcome = manager.apply(&document, &blocks, window(30, true), false, token);
        assert!(outcome.mutated);
        assert!(document.has_marker());
        assert_eq!(document.hidden_count(), 10);
    }

    #[test]
    fn test_invalidate_forces_reapply() {
        let (document, mut manager, token) = setup(40);
        let blocks = document.list_blocks();
        manager.apply(&document, &blocks, window(30, true), false, token);
        manager.invalidate();
        assert!(manager.apply(&document, &blocks, window(30, true), false, token).mutated);
    }

    #[test]
    fn test_own_mutations_are_tagged() {
        let (document, mut manager, token) = setup(40);
        let blocks = document.list_blocks();
        let mut feed = crate::feed::ChangeFeed::subscribe(&document);

        manager.apply(&document, &blocks, window(30, true), false, token);
        let batches = feed.drain();
        assert!(!batches.is_empty());
        assert!(batches.iter().all(|batch| batch.is_from(token)));
    }

    #[test]
    fn test_marker_text_pluralization() {
        assert_eq!(marker_text(1), "SpeedChat hid 1 earlier message");
        assert_eq!(marker_text(20), "SpeedChat hid 20 earlier messages");
    }
}
