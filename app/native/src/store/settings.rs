//! User settings as persisted in the config store.
//!
//! Stored values are untrusted: they may have been written by an older
//! version, by hand, or by another observer. Reading never fails on a bad
//! value; it is coerced or replaced by its default instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ConfigStore, StoreChange, StoreError, StoreMap, map_of};
use crate::constants::storage_keys::{ENABLED, ULTRA_MODE, VISIBLE_MESSAGES};
use crate::constants::window::DEFAULT_VISIBLE;
use crate::window::VisibilityWindow;

/// User-controlled settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Whether the visible window is applied.
    pub enabled: bool,
    /// Number of trailing blocks kept visible.
    pub window_size: u32,
    /// Whether hidden blocks are evicted automatically after each apply.
    pub ultra_mode: bool,
}

impl Default for Settings {
    fn default() -> Self { Self { enabled: true, window_size: DEFAULT_VISIBLE, ultra_mode: false } }
}

impl Settings {
    /// The defaults, keyed the way they are stored.
    #[must_use]
    pub fn defaults_map() -> StoreMap { Self::default().to_map() }

    /// Encodes the settings as store entries.
    #[must_use]
    pub fn to_map(&self) -> StoreMap {
        map_of([
            (ENABLED, Value::Bool(self.enabled)),
            (VISIBLE_MESSAGES, Value::from(self.window_size)),
            (ULTRA_MODE, Value::Bool(self.ultra_mode)),
        ])
    }

    /// Decodes settings, coercing malformed values.
    #[must_use]
    pub fn from_map(map: &StoreMap) -> Self {
        let defaults = Self::default();
        Self {
            enabled: map.get(ENABLED).map_or(defaults.enabled, truthy),
            window_size: map.get(VISIBLE_MESSAGES).map_or(defaults.window_size, window_size_from_value),
            ultra_mode: map.get(ULTRA_MODE).map_or(defaults.ultra_mode, truthy),
        }
    }

    /// Reads the settings from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load(store: &dyn ConfigStore) -> Result<Self, StoreError> {
        Ok(Self::from_map(&store.get(&Self::defaults_map())?))
    }

    /// Folds a store notification into these settings.
    ///
    /// Returns `true` if any setting changed.
    pub fn apply_change(&mut self, change: &StoreChange) -> bool {
        let before = *self;
        if let Some(value) = change.new_value(ENABLED) {
            self.enabled = truthy(value);
        }
        if let Some(value) = change.new_value(VISIBLE_MESSAGES) {
            self.window_size = window_size_from_value(value);
        }
        if let Some(value) = change.new_value(ULTRA_MODE) {
            self.ultra_mode = truthy(value);
        }
        *self != before
    }

    /// The visible window described by these settings.
    #[must_use]
    pub const fn window(&self) -> VisibilityWindow {
        VisibilityWindow { size: self.window_size, enabled: self.enabled }
    }
}

/// Loose truthiness: `null`, `false`, `0`, `NaN`-like and `""` are false.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Leading integer of a value, the way a lenient number parser reads it.
///
/// Numbers are truncated; strings may carry leading whitespace, a sign and
/// trailing junk (`" 45px"` reads as 45). Anything else yields `None`.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Saturating float-to-int cast is the intended truncation
pub fn parse_leading_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|n| n.is_finite()).map(|n| n.trunc() as i64)),
        Value::String(text) => {
            let trimmed = text.trim_start();
            let (negative, digits) = match trimmed.as_bytes().first() {
                Some(b'-') => (true, &trimmed[1..]),
                Some(b'+') => (false, &trimmed[1..]),
                _ => (false, trimmed),
            };
            let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
            let magnitude: i64 = digits[..end].parse().ok()?;
            Some(if negative { -magnitude } else { magnitude })
        }
        _ => None,
    }
}

/// Reads a stored window size: unparsable or zero falls back to the
/// default, anything else is clamped and snapped.
#[must_use]
pub fn window_size_from_value(value: &Value) -> u32 {
    match parse_leading_int(value) {
        Some(0) | None => DEFAULT_VISIBLE,
        Some(raw) => VisibilityWindow::normalize_size(raw),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::constants::window::{MAX_VISIBLE, MIN_VISIBLE};
    use crate::store::{StoreScope, ValueChange};

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.enabled);
        assert_eq!(settings.window_size, 30);
        assert!(!settings.ultra_mode);
    }

    #[test]
    fn test_round_trip_through_map() {
        let settings = Settings { enabled: false, window_size: 45, ultra_mode: true };
        assert_eq!(Settings::from_map(&settings.to_map()), settings);
    }

    #[test]
    fn test_malformed_values_are_coerced() {
        let map = map_of([
            (ENABLED, json!("yes")),
            (VISIBLE_MESSAGES, json!("not a number")),
            (ULTRA_MODE, json!(0)),
        ]);
        let settings = Settings::from_map(&map);
        assert!(settings.enabled);
        assert_eq!(settings.window_size, DEFAULT_VISIBLE);
        assert!(!settings.ultra_mode);
    }

    #[test]
    fn test_window_size_from_value() {
        assert_eq!(window_size_from_value(&json!(45)), 45);
        assert_eq!(window_size_from_value(&json!("60")), 60);
        assert_eq!(window_size_from_value(&json!(" 45px")), 45);
        assert_eq!(window_size_from_value(&json!(47.9)), 45);
        assert_eq!(window_size_from_value(&json!(0)), DEFAULT_VISIBLE);
        assert_eq!(window_size_from_value(&json!(null)), DEFAULT_VISIBLE);
        assert_eq!(window_size_from_value(&json!(true)), DEFAULT_VISIBLE);
        assert_eq!(window_size_from_value(&json!(3)), MIN_VISIBLE);
        assert_eq!(window_size_from_value(&json!(-20)), MIN_VISIBLE);
        assert_eq!(window_size_from_value(&json!(5_000)), MAX_VISIBLE);
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int(&json!("-12abc")), Some(-12));
        assert_eq!(parse_leading_int(&json!("+7")), Some(7));
        assert_eq!(parse_leading_int(&json!("abc")), None);
        assert_eq!(parse_leading_int(&json!("")), None);
        assert_eq!(parse_leading_int(&json!([1])), None);
    }

    #[test]
    fn test_truthy() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("false")));
        assert!(truthy(&json!({})));
    }

    #[test]
    fn test_apply_change_reports_differences() {
        let mut settings = Settings::default();
        let mut changes = BTreeMap::new();
        changes.insert(
            VISIBLE_MESSAGES.to_string(),
            ValueChange { old_value: Some(json!(30)), new_value: Some(json!(90)) },
        );
        let change = StoreChange { changes, scope: StoreScope::Local };

        assert!(settings.apply_change(&change));
        assert_eq!(settings.window_size, 90);
        assert!(!settings.apply_change(&change));
    }
}
