//! Internal constants for windowing, scheduling, and license tuning.
//!
//! Constants are grouped by functionality:
//! - `timing` - Debouncing, frame alignment, and throttling
//! - `window` - Visible window bounds
//! - `license` - Trial clock and unlock key format
//! - `storage_keys` - Keys persisted in the config store

/// Application name used for config and state directories.
pub const APP_NAME: &str = "speedchat";

/// Timing constants for the update scheduler.
pub mod timing {
    /// Quiet period after the last trigger before an update is queued (ms).
    ///
    /// The change feed fires many times per second while a reply is being
    /// generated; only the last trigger in a burst arms a frame.
    pub const DEBOUNCE_MS: u64 = 100;

    /// Lower bound accepted for a configured debounce (ms).
    pub const MIN_DEBOUNCE_MS: u64 = 10;

    /// Upper bound accepted for a configured debounce (ms).
    pub const MAX_DEBOUNCE_MS: u64 = 1_000;

    /// Interval between rendering opportunities (ms), roughly 60 fps.
    pub const FRAME_INTERVAL_MS: u64 = 16;

    /// Upper bound accepted for a configured frame interval (ms).
    pub const MAX_FRAME_INTERVAL_MS: u64 = 100;

    /// Minimum spacing between applies while content is actively growing (ms).
    pub const STREAMING_THROTTLE_MS: u64 = 1_200;

    /// Upper bound accepted for a configured streaming throttle (ms).
    pub const MAX_STREAMING_THROTTLE_MS: u64 = 10_000;
}

/// Visible window bounds.
pub mod window {
    /// Number of blocks kept visible when nothing is configured.
    pub const DEFAULT_VISIBLE: u32 = 30;

    /// Smallest accepted window.
    pub const MIN_VISIBLE: u32 = 10;

    /// Largest accepted window.
    pub const MAX_VISIBLE: u32 = 120;

    /// Window sizes are quantized to multiples of this step.
    pub const STEP_VISIBLE: u32 = 5;
}

/// Trial clock and unlock key format.
pub mod license {
    /// Length of the free trial in days.
    pub const TRIAL_DAYS: u32 = 7;

    /// Milliseconds in one day.
    pub const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    /// Required key prefix (after normalization).
    pub const KEY_PREFIX: &str = "SPD-";

    /// Required key suffix (after normalization).
    pub const KEY_SUFFIX: &str = "-PRO";

    /// Minimum total key length, prefix and suffix included.
    pub const MIN_KEY_LEN: usize = 16;

    /// Maximum total key length, prefix and suffix included.
    pub const MAX_KEY_LEN: usize = 32;

    /// Minimum body length once separators are stripped.
    pub const MIN_BODY_LEN: usize = 6;

    /// Checksum modulus; a key is valid when the weighted sum is divisible by it.
    pub const CHECKSUM_MODULUS: u64 = 7;

    /// Weight applied to the first body character; later characters add one each.
    pub const CHECKSUM_WEIGHT_OFFSET: u64 = 3;
}

/// Keys persisted in the config store.
///
/// The names match the ones the browser extension has always written, so an
/// existing store keeps working.
pub mod storage_keys {
    /// Whether the visible window is applied (`bool`).
    pub const ENABLED: &str = "speedchatEnabled";

    /// Number of trailing blocks kept visible (`number`).
    pub const VISIBLE_MESSAGES: &str = "speedchatVisibleMessages";

    /// Whether hidden blocks are evicted automatically (`bool`).
    pub const ULTRA_MODE: &str = "speedchatUltraMode";

    /// Blocks evicted during the current session (`number`).
    pub const PURGED_COUNT: &str = "speedchatPurgedCount";

    /// Set once the expired trial has switched the window off (`bool`).
    pub const BLOCKED_ENFORCED: &str = "speedchatBlockedEnforced";

    /// First time the trial clock was observed, epoch ms (`number`).
    pub const TRIAL_START: &str = "trialStart";

    /// Set once a valid key has been entered (`bool`).
    pub const PRO_UNLOCKED: &str = "proUnlocked";

    /// The normalized key that unlocked the app (`string`).
    pub const LICENSE_KEY: &str = "licenseKey";
}
