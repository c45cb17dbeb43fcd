//! Trial clock and offline license keys.
//!
//! The application is in one of three states:
//!
//! - `TRIAL` while fewer than [`TRIAL_DAYS`] whole days have passed since the
//!   first time the trial clock was observed,
//! - `PRO` once a valid key has been entered,
//! - `BLOCKED` when the trial has run out without a key.
//!
//! The state is derived, never stored. Once `PRO` has been observed it stays
//! `PRO` for the rest of the session even if the stored flag disappears.
//!
//! Keys are validated offline: `SPD-<body>-PRO` where the body (dashes
//! removed) is uppercase alphanumeric and its weighted character sum is a
//! multiple of 7.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::license::{
    CHECKSUM_MODULUS, CHECKSUM_WEIGHT_OFFSET, DAY_MS, KEY_PREFIX, KEY_SUFFIX, MAX_KEY_LEN, MIN_BODY_LEN,
    MIN_KEY_LEN, TRIAL_DAYS,
};
use crate::constants::storage_keys::{BLOCKED_ENFORCED, ENABLED, LICENSE_KEY, PRO_UNLOCKED, TRIAL_START};
use crate::store::settings::truthy;
use crate::store::{ConfigStore, StoreError, map_of, read_value};

// ============================================================================
// Keys
// ============================================================================

/// Canonical form of a key as typed by the user.
#[must_use]
pub fn normalize_key(key: &str) -> String { key.trim().to_uppercase() }

/// Checks a license key offline. Whitespace and case are ignored.
#[must_use]
pub fn validate_key(key: &str) -> bool {
    let normalized = normalize_key(key);

    if !normalized.starts_with(KEY_PREFIX) || !normalized.ends_with(KEY_SUFFIX) {
        return false;
    }
    if !(MIN_KEY_LEN..=MAX_KEY_LEN).contains(&normalized.len()) {
        return false;
    }

    let body: Vec<u8> = normalized.as_bytes()[KEY_PREFIX.len()..normalized.len() - KEY_SUFFIX.len()]
        .iter()
        .copied()
        .filter(|byte| *byte != b'-')
        .collect();

    if body.len() < MIN_BODY_LEN || !body.iter().all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit()) {
        return false;
    }

    checksum(&body) % CHECKSUM_MODULUS == 0
}

fn checksum(body: &[u8]) -> u64 {
    body.iter()
        .zip(CHECKSUM_WEIGHT_OFFSET..)
        .map(|(byte, weight)| u64::from(*byte) * weight)
        .sum()
}

// ============================================================================
// Trial clock
// ============================================================================

/// Whole trial days left when the trial started at `start_ms`.
#[must_use]
pub fn remaining_days(start_ms: u64, now_ms: u64, trial_days: u32) -> u32 {
    let elapsed_days = now_ms.saturating_sub(start_ms) / DAY_MS;
    u32::try_from(u64::from(trial_days).saturating_sub(elapsed_days)).unwrap_or(0)
}

/// Trial clock snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialInfo {
    /// First observation of the trial clock, epoch milliseconds.
    pub trial_start: u64,
    /// Whole days left.
    pub remaining_days: u32,
    /// Whether any day is left.
    pub is_active: bool,
}

/// Derived application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    /// Inside the trial period.
    Trial,
    /// Unlocked with a valid key.
    Pro,
    /// Trial over, no key.
    Blocked,
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Trial => "TRIAL",
            Self::Pro => "PRO",
            Self::Blocked => "BLOCKED",
        })
    }
}

/// Reads a stored trial start the way a loose number conversion would.
///
/// Returns `None` for anything that is not a positive finite number.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Checked positive and finite
fn stored_trial_start(value: &Value) -> Option<u64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (number.is_finite() && number > 0.0).then(|| number as u64)
}

// ============================================================================
// LicenseGate
// ============================================================================

/// Derives the application state from the store and applies its effects.
#[derive(Debug, Clone)]
pub struct LicenseGate {
    trial_days: u32,
    pro_seen: bool,
}

impl Default for LicenseGate {
    fn default() -> Self { Self::new(TRIAL_DAYS) }
}

impl LicenseGate {
    /// Creates a gate with a trial of `trial_days` days.
    #[must_use]
    pub const fn new(trial_days: u32) -> Self { Self { trial_days, pro_seen: false } }

    /// Reads the trial clock, starting it at `now_ms` if it never started.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the start cannot be
    /// persisted.
    pub fn trial_info(&self, store: &dyn ConfigStore, now_ms: u64) -> Result<TrialInfo, StoreError> {
        if let Some(info) = self.peek_trial_info(store, now_ms)? {
            return Ok(info);
        }

        store.set(map_of([(TRIAL_START, Value::from(now_ms))]))?;
        tracing::info!(trial_start = now_ms, "trial clock started");
        Ok(self.info_from(now_ms, now_ms))
    }

    /// Reads the trial clock without starting it.
    ///
    /// Returns `None` if no usable trial start is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn peek_trial_info(&self, store: &dyn ConfigStore, now_ms: u64) -> Result<Option<TrialInfo>, StoreError> {
        let stored = read_value(store, TRIAL_START, Value::from(0))?;
        Ok(stored_trial_start(&stored).map(|start| self.info_from(start, now_ms)))
    }

    fn info_from(&self, trial_start: u64, now_ms: u64) -> TrialInfo {
        let remaining_days = remaining_days(trial_start, now_ms, self.trial_days);
        TrialInfo { trial_start, remaining_days, is_active: remaining_days > 0 }
    }

    /// Current application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn app_state(&mut self, store: &dyn ConfigStore, now_ms: u64) -> Result<AppState, StoreError> {
        if self.pro_seen {
            return Ok(AppState::Pro);
        }
        if truthy(&read_value(store, PRO_UNLOCKED, Value::Bool(false))?) {
            self.pro_seen = true;
            return Ok(AppState::Pro);
        }
        Ok(if self.trial_info(store, now_ms)?.is_active { AppState::Trial } else { AppState::Blocked })
    }

    /// Records that `PRO` was observed elsewhere (for example through a
    /// store notification).
    pub fn mark_pro(&mut self) { self.pro_seen = true; }

    /// Unlocks with `key`.
    ///
    /// Returns `false` and writes nothing if the key is invalid. A valid key
    /// is persisted together with the unlocked flag in a single write.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. Nothing is persisted in that case.
    pub fn unlock(&mut self, store: &dyn ConfigStore, key: &str) -> Result<bool, StoreError> {
        if !validate_key(key) {
            tracing::info!("license key rejected");
            return Ok(false);
        }

        store.set(map_of([(PRO_UNLOCKED, Value::Bool(true)), (LICENSE_KEY, Value::String(normalize_key(key)))]))?;
        self.pro_seen = true;
        tracing::info!("license unlocked");
        Ok(true)
    }

    /// Applies the effect of `state`.
    ///
    /// The first time `BLOCKED` is seen the window is switched off and the
    /// enforcement is recorded, so the switch-off is written at most once.
    /// Returns `true` if this call wrote it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn enforce(&self, store: &dyn ConfigStore, state: AppState) -> Result<bool, StoreError> {
        if state != AppState::Blocked || truthy(&read_value(store, BLOCKED_ENFORCED, Value::Bool(false))?) {
            return Ok(false);
        }

        store.set(map_of([(ENABLED, Value::Bool(false)), (BLOCKED_ENFORCED, Value::Bool(true))]))?;
        tracing::warn!("trial expired, window disabled");
        Ok(true)
    }
}
