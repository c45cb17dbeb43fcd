//! JSON file backed store.
//!
//! The whole store is a single JSON object. Writes go to a temporary file in
//! the same directory which then replaces the original, so a crash never
//! leaves a half-written state file behind.
//!
//! A missing file reads as empty. A file that is not a JSON object is
//! treated as empty as well (and replaced on the next write) so that a
//! corrupted state file never prevents startup.
//!
//! Writes made through a handle are published to that handle's subscribers
//! right away. Writes made by other processes are only seen once
//! [`JsonFileStore::watch`] is active: the file's directory is then watched
//! and every external write is diffed against the last contents seen.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tempfile::NamedTempFile;

use super::{ConfigStore, StoreChange, StoreError, StoreMap, StoreScope, ValueChange, merge_changes, project};
use crate::constants::APP_NAME;
use crate::hub::{Hub, Subscription};

/// File name of the state file inside the data directory.
const STATE_FILE_NAME: &str = "state.json";

/// State shared by every handle and the watcher callback.
struct Shared {
    path: PathBuf,
    write_lock: Mutex<()>,
    /// Contents last seen, kept only while watching.
    seen: Mutex<Option<StoreMap>>,
    hub: Hub<StoreChange>,
}

/// [`ConfigStore`] persisted as a JSON object on disk.
#[derive(Clone)]
pub struct JsonFileStore {
    shared: Arc<Shared>,
    watcher: Arc<Mutex<Option<RecommendedWatcher>>>,
}

impl JsonFileStore {
    /// Opens (without creating) the store at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.into(),
                write_lock: Mutex::new(()),
                seen: Mutex::new(None),
                hub: Hub::new(),
            }),
            watcher: Arc::new(Mutex::new(None)),
        }
    }

    /// Opens the store at the default location.
    #[must_use]
    pub fn open_default() -> Self { Self::new(default_state_path()) }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path { &self.shared.path }

    /// Whether writes from other processes are being observed.
    #[must_use]
    pub fn is_watching(&self) -> bool { self.watcher.lock().is_some() }

    /// Starts observing writes made to the file by other processes.
    ///
    /// The parent directory is watched rather than the file itself, since
    /// every write replaces the file. Calling this again is a no-op. The
    /// watcher stops when the last handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or watched, or
    /// the current contents cannot be read.
    pub fn watch(&self) -> Result<(), StoreError> {
        let mut slot = self.watcher.lock();
        if slot.is_some() {
            return Ok(());
        }

        let dir = self.shared.dir();
        fs::create_dir_all(&dir)?;
        {
            let _guard = self.shared.write_lock.lock();
            *self.shared.seen.lock() = Some(self.shared.read_object()?.unwrap_or_default());
        }

        let shared = Arc::clone(&self.shared);
        let file_name = self.shared.path.file_name().map(OsString::from).unwrap_or_default();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                let affects_state =
                    event.paths.iter().any(|path| path.file_name().is_some_and(|name| name == file_name));
                if affects_state && !event.kind.is_access() {
                    shared.reload();
                }
            }
            Err(err) => tracing::warn!(%err, "state file watch error"),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::debug!(path = %self.shared.path.display(), "watching state file");
        *slot = Some(watcher);
        Ok(())
    }
}

impl Shared {
    fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }

    /// Reads the file. `None` means it exists but is not a JSON object.
    fn read_object(&self) -> Result<Option<StoreMap>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Some(StoreMap::new())),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str::<serde_json::Value>(&contents) {
            Ok(serde_json::Value::Object(map)) => Ok(Some(map)),
            Ok(_) | Err(_) => Ok(None),
        }
    }

    fn read_all(&self) -> Result<StoreMap, StoreError> {
        Ok(self.read_object()?.unwrap_or_else(|| {
            tracing::warn!(path = %self.path.display(), "state file is not a JSON object, starting from defaults");
            StoreMap::new()
        }))
    }

    fn write_all(&self, values: &StoreMap) -> Result<(), StoreError> {
        let dir = self.dir();
        fs::create_dir_all(&dir)?;

        let mut file = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut file, values)?;
        file.write_all(b"\n")?;
        file.persist(&self.path).map_err(|err| StoreError::Io(err.error.to_string()))?;
        Ok(())
    }

    /// Publishes whatever changed on disk since the contents were last seen.
    fn reload(&self) {
        let changes = {
            let _guard = self.write_lock.lock();
            let mut seen = self.seen.lock();
            let Some(previous) = seen.as_mut() else {
                return;
            };
            match self.read_object() {
                Ok(Some(current)) => diff_into(previous, current),
                // Unreadable or mid-replace; the next event catches up.
                Ok(None) => return,
                Err(err) => {
                    tracing::warn!(%err, path = %self.path.display(), "state file reload failed");
                    return;
                }
            }
        };

        if changes.is_empty() {
            return;
        }
        tracing::debug!(path = %self.path.display(), keys = changes.len(), "state file changed externally");
        self.hub.publish(&StoreChange { changes, scope: StoreScope::Local });
    }
}

/// Replaces `previous` with `current`, returning every key that differs.
fn diff_into(previous: &mut StoreMap, current: StoreMap) -> BTreeMap<String, ValueChange> {
    let removed: Vec<String> = previous.keys().filter(|key| !current.contains_key(*key)).cloned().collect();
    let mut changes = merge_changes(previous, current);
    for key in removed {
        let old_value = previous.remove(&key);
        changes.insert(key, ValueChange { old_value, new_value: None });
    }
    changes
}

impl ConfigStore for JsonFileStore {
    fn get(&self, defaults: &StoreMap) -> Result<StoreMap, StoreError> {
        Ok(project(&self.shared.read_all()?, defaults))
    }

    fn set(&self, values: StoreMap) -> Result<(), StoreError> {
        let changes = {
            let _guard = self.shared.write_lock.lock();
            let mut current = self.shared.read_all()?;
            let changes = merge_changes(&mut current, values);
            if changes.is_empty() {
                return Ok(());
            }
            self.shared.write_all(&current)?;
            let mut seen = self.shared.seen.lock();
            if seen.is_some() {
                *seen = Some(current);
            }
            changes
        };

        tracing::debug!(path = %self.shared.path.display(), keys = changes.len(), "state file updated");
        self.shared.hub.publish(&StoreChange { changes, scope: StoreScope::Local });
        Ok(())
    }

    fn subscribe(&self) -> Subscription<StoreChange> { self.shared.hub.subscribe() }
}

/// Returns the default state file location.
///
/// Uses the platform data directory (`~/.local/share/speedchat` on Linux,
/// `~/Library/Application Support/speedchat` on macOS), falling back to
/// `/tmp/speedchat` when no data directory is available.
#[must_use]
pub fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .map_or_else(|| PathBuf::from(format!("/tmp/{APP_NAME}")), |dir| dir.join(APP_NAME))
        .join(STATE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::store::map_of;

    fn store_in(dir: &TempDir) -> JsonFileStore { JsonFileStore::new(dir.path().join("state.json")) }

    fn wait_for(sub: &mut Subscription<StoreChange>, timeout: Duration) -> Option<StoreChange> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(change) = sub.try_next() {
                return Some(change);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_missing_file_reads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let values = store.get(&map_of([("speedchatEnabled", json!(true))])).unwrap();
        assert_eq!(values["speedchatEnabled"], json!(true));
    }

    #[test]
    fn test_set_persists_across_handles() {
        let dir = TempDir::new().unwrap();
        store_in(&dir).set(map_of([("speedchatVisibleMessages", json!(45))])).unwrap();

        let reopened = store_in(&dir);
        let values = reopened.get(&map_of([("speedchatVisibleMessages", json!(30))])).unwrap();
        assert_eq!(values["speedchatVisibleMessages"], json!(45));
    }

    #[test]
    fn test_set_notifies_subscribers() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut sub = store.subscribe();

        store.set(map_of([("proUnlocked", json!(true))])).unwrap();
        let change = sub.try_next().expect("notification");
        assert!(change.touches("proUnlocked"));

        store.set(map_of([("proUnlocked", json!(true))])).unwrap();
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "[1, 2, 3]").unwrap();

        let values = store.get(&map_of([("trialStart", json!(0))])).unwrap();
        assert_eq!(values["trialStart"], json!(0));

        store.set(map_of([("trialStart", json!(1_000))])).unwrap();
        let values = store.get(&map_of([("trialStart", json!(0))])).unwrap();
        assert_eq!(values["trialStart"], json!(1_000));
    }

    #[test]
    fn test_creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("deeper").join("state.json"));
        store.set(map_of([("k", json!(1))])).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_default_state_path_ends_with_file_name() {
        let path = default_state_path();
        assert!(path.ends_with(format!("{APP_NAME}/{STATE_FILE_NAME}")));
    }

    #[test]
    fn test_watch_reports_writes_from_other_handles() {
        let dir = TempDir::new().unwrap();
        let watched = store_in(&dir);
        watched.set(map_of([("speedchatVisibleMessages", json!(30))])).unwrap();
        watched.watch().unwrap();
        assert!(watched.is_watching());
        let mut sub = watched.subscribe();

        let other_shell = store_in(&dir);
        other_shell.set(map_of([("speedchatVisibleMessages", json!(45))])).unwrap();

        let change = wait_for(&mut sub, Duration::from_secs(5)).expect("external change");
        let value = &change.changes["speedchatVisibleMessages"];
        assert_eq!(value.old_value, Some(json!(30)));
        assert_eq!(value.new_value, Some(json!(45)));
    }

    #[test]
    fn test_watch_does_not_repeat_own_writes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.watch().unwrap();
        let mut sub = store.subscribe();

        store.set(map_of([("speedchatUltraMode", json!(true))])).unwrap();
        assert!(sub.try_next().is_some());
        assert!(wait_for(&mut sub, Duration::from_millis(300)).is_none());
    }

    #[test]
    fn test_diff_reports_removed_keys() {
        let mut previous = map_of([("a", json!(1)), ("b", json!(2))]);
        let changes = diff_into(&mut previous, map_of([("a", json!(1))]));

        assert_eq!(changes.len(), 1);
        assert_eq!(changes["b"], ValueChange { old_value: Some(json!(2)), new_value: None });
        assert!(!previous.contains_key("b"));
    }
}
