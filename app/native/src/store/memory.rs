//! In-process store shared by every clone of the handle.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{ConfigStore, StoreChange, StoreError, StoreMap, StoreScope, merge_changes, project};
use crate::hub::{Hub, Subscription};

/// Shared in-memory [`ConfigStore`].
///
/// Clones observe and modify the same map, which models several script
/// instances watching one extension store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<StoreMap>>,
    hub: Hub<StoreChange>,
    scope: StoreScope,
}

impl MemoryStore {
    /// Creates an empty local store.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Creates a local store holding `values`.
    #[must_use]
    pub fn with_values(values: StoreMap) -> Self {
        Self { values: Arc::new(Mutex::new(values)), ..Self::default() }
    }

    /// Returns a copy of everything stored.
    #[must_use]
    pub fn snapshot(&self) -> StoreMap { self.values.lock().clone() }
}

impl ConfigStore for MemoryStore {
    fn get(&self, defaults: &StoreMap) -> Result<StoreMap, StoreError> {
        Ok(project(&self.values.lock(), defaults))
    }

    fn set(&self, values: StoreMap) -> Result<(), StoreError> {
        let changes = merge_changes(&mut self.values.lock(), values);
        if !changes.is_empty() {
            self.hub.publish(&StoreChange { changes, scope: self.scope });
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription<StoreChange> { self.hub.subscribe() }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::map_of;

    #[test]
    fn test_get_uses_defaults_for_missing_keys() {
        let store = MemoryStore::with_values(map_of([("present", json!(7))]));
        let values = store.get(&map_of([("present", json!(0)), ("absent", json!("d"))])).unwrap();

        assert_eq!(values["present"], json!(7));
        assert_eq!(values["absent"], json!("d"));
    }

    #[test]
    fn test_set_notifies_every_observer() {
        let store = MemoryStore::new();
        let other_instance = store.clone();
        let mut mine = store.subscribe();
        let mut theirs = other_instance.subscribe();

        other_instance.set(map_of([("speedchatEnabled", json!(false))])).unwrap();

        for sub in [&mut mine, &mut theirs] {
            let change = sub.try_next().expect("change notification");
            assert_eq!(change.new_value("speedchatEnabled"), Some(&json!(false)));
            assert_eq!(change.scope, StoreScope::Local);
        }
        assert_eq!(store.snapshot()["speedchatEnabled"], json!(false));
    }

    #[test]
    fn test_unchanged_write_is_silent() {
        let store = MemoryStore::with_values(map_of([("k", json!(1))]));
        let mut sub = store.subscribe();
        store.set(map_of([("k", json!(1))])).unwrap();
        assert!(sub.try_next().is_none());
    }
}
