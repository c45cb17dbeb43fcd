//! Persistent key-value state with change notifications.
//!
//! Settings and license state live in a [`ConfigStore`]. Several observers
//! may watch the same store; each one resynchronizes from the
//! [`StoreChange`] notifications it receives. There is no locking across
//! observers: the last write wins.
//!
//! Two backends are provided:
//! - [`MemoryStore`] - shared in-process map (tests, simulation)
//! - [`JsonFileStore`] - JSON object on disk, written atomically, optionally
//!   watched for writes from other processes

mod file;
mod memory;
pub mod settings;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use file::{JsonFileStore, default_state_path};
pub use memory::MemoryStore;
pub use settings::Settings;

use crate::hub::Subscription;

/// A JSON object of stored values.
pub type StoreMap = serde_json::Map<String, Value>;

/// Errors raised by store backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Reading or writing the backing storage failed.
    #[error("I/O failure: {0}")]
    Io(String),
    /// Stored data could not be encoded or decoded.
    #[error("malformed data: {0}")]
    Parse(String),
    /// The store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self { Self::Io(err.to_string()) }
}

impl From<notify::Error> for StoreError {
    fn from(err: notify::Error) -> Self { Self::Io(err.to_string()) }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self { Self::Parse(err.to_string()) }
}

/// Storage area a change belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreScope {
    /// Device-local state. The only scope the controller reacts to.
    #[default]
    Local,
    /// State synchronized from elsewhere.
    Sync,
}

/// Old and new value of one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    /// Value before the write, `None` if the key was absent.
    pub old_value: Option<Value>,
    /// Value after the write.
    pub new_value: Option<Value>,
}

/// Notification describing one write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreChange {
    /// Keys whose value actually changed.
    pub changes: BTreeMap<String, ValueChange>,
    /// Area the write went to.
    pub scope: StoreScope,
}

impl StoreChange {
    /// New value of `key`, if this change touched it.
    #[must_use]
    pub fn new_value(&self, key: &str) -> Option<&Value> {
        self.changes.get(key).and_then(|change| change.new_value.as_ref())
    }

    /// Whether this change touched `key`.
    #[must_use]
    pub fn touches(&self, key: &str) -> bool { self.changes.contains_key(key) }
}

/// Key-value store with change notifications.
pub trait ConfigStore {
    /// Reads every key of `defaults`, substituting the default for absent keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, defaults: &StoreMap) -> Result<StoreMap, StoreError>;

    /// Writes all `values` in a single update.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written. Nothing is
    /// written in that case.
    fn set(&self, values: StoreMap) -> Result<(), StoreError>;

    /// Starts observing writes to this store.
    fn subscribe(&self) -> Subscription<StoreChange>;
}

/// Builds a [`StoreMap`] from key/value pairs.
pub fn map_of<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> StoreMap {
    pairs.into_iter().map(|(key, value)| (key.into(), value)).collect()
}

/// Reads a single key with a default.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn read_value(store: &dyn ConfigStore, key: &str, default: Value) -> Result<Value, StoreError> {
    let mut values = store.get(&map_of([(key, default.clone())]))?;
    Ok(values.remove(key).unwrap_or(default))
}

/// Merges `updates` into `current` and reports which keys changed.
fn merge_changes(current: &mut StoreMap, updates: StoreMap) -> BTreeMap<String, ValueChange> {
    let mut changes = BTreeMap::new();
    for (key, value) in updates {
        let old_value = current.get(&key).cloned();
        if old_value.as_ref() == Some(&value) {
            continue;
        }
        current.insert(key.clone(), value.clone());
        changes.insert(key, ValueChange { old_value, new_value: Some(value) });
    }
    changes
}

/// Projects `defaults` over `current`.
fn project(current: &StoreMap, defaults: &StoreMap) -> StoreMap {
    defaults
        .iter()
        .map(|(key, default)| (key.clone(), current.get(key).unwrap_or(default).clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_merge_reports_only_changed_keys() {
        let mut current = map_of([("a", json!(1)), ("b", json!(true))]);
        let changes = merge_changes(&mut current, map_of([("a", json!(1)), ("b", json!(false))]));

        assert_eq!(changes.len(), 1);
        let change = &changes["b"];
        assert_eq!(change.old_value, Some(json!(true)));
        assert_eq!(change.new_value, Some(json!(false)));
        assert_eq!(current["b"], json!(false));
    }

    #[test]
    fn test_merge_new_key_has_no_old_value() {
        let mut current = StoreMap::new();
        let changes = merge_changes(&mut current, map_of([("fresh", json!("x"))]));
        assert_eq!(changes["fresh"].old_value, None);
    }

    #[test]
    fn test_project_fills_defaults() {
        let current = map_of([("a", json!(5))]);
        let defaults = map_of([("a", json!(1)), ("b", json!(2))]);
        let projected = project(&current, &defaults);

        assert_eq!(projected["a"], json!(5));
        assert_eq!(projected["b"], json!(2));
        assert_eq!(projected.len(), 2);
    }

    #[test]
    fn test_store_change_accessors() {
        let mut changes = BTreeMap::new();
        changes.insert(
            "k".to_string(),
            ValueChange { old_value: None, new_value: Some(json!(3)) },
        );
        let change = StoreChange { changes, scope: StoreScope::Local };

        assert!(change.touches("k"));
        assert!(!change.touches("other"));
        assert_eq!(change.new_value("k"), Some(&json!(3)));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Parse("expected object".to_string());
        assert!(err.to_string().contains("malformed data"));
    }
}
