//! Configuration types for SpeedChat.
//!
//! The tuning file holds timing and environment options. User settings
//! (window size, enabled flags) live in the state store instead.
//! The file supports JSONC format (JSON with comments).

use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::APP_NAME;
use crate::constants::license::TRIAL_DAYS;
use crate::constants::timing::{
    DEBOUNCE_MS, FRAME_INTERVAL_MS, MAX_DEBOUNCE_MS, MAX_FRAME_INTERVAL_MS, MAX_STREAMING_THROTTLE_MS,
    MIN_DEBOUNCE_MS, STREAMING_THROTTLE_MS,
};
use crate::store::default_state_path;

/// Root configuration structure for SpeedChat.
///
/// Every field is optional in the file; missing fields take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeedchatConfig {
    /// Silence (ms) required after the last change before an update is queued.
    /// Clamped to 10..=1000.
    pub debounce_ms: u64,

    /// Frame interval (ms) updates are aligned to. Clamped to 1..=100.
    pub frame_interval_ms: u64,

    /// Minimum spacing (ms) between updates while content is streaming in.
    /// Clamped to 0..=10000; 0 disables the throttle.
    pub streaming_throttle_ms: u64,

    /// Length of the trial in days.
    pub trial_days: u32,

    /// Default log filter, used when `SPEEDCHAT_LOG` is not set.
    pub log_level: String,

    /// Location of the state file. Defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

impl Default for SpeedchatConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEBOUNCE_MS,
            frame_interval_ms: FRAME_INTERVAL_MS,
            streaming_throttle_ms: STREAMING_THROTTLE_MS,
            trial_days: TRIAL_DAYS,
            log_level: "info".to_string(),
            state_path: None,
        }
    }
}

impl SpeedchatConfig {
    /// Debounce clamped to its accepted range.
    #[must_use]
    pub fn effective_debounce_ms(&self) -> u64 { self.debounce_ms.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS) }

    /// Frame interval clamped to its accepted range.
    #[must_use]
    pub fn effective_frame_interval_ms(&self) -> u64 { self.frame_interval_ms.clamp(1, MAX_FRAME_INTERVAL_MS) }

    /// Streaming throttle clamped to its accepted range.
    #[must_use]
    pub fn effective_streaming_throttle_ms(&self) -> u64 {
        self.streaming_throttle_ms.min(MAX_STREAMING_THROTTLE_MS)
    }

    /// State file location, falling back to the platform default.
    #[must_use]
    pub fn state_path(&self) -> PathBuf { self.state_path.clone().unwrap_or_else(default_state_path) }
}

/// Errors that can occur when loading the configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// No configuration file was found in any of the expected locations.
    NotFound,
    /// The configuration file exists but could not be read.
    IoError(std::io::Error),
    /// The configuration file contains invalid JSON.
    ParseError(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(
                f,
                "No configuration file found. Expected at ~/.config/speedchat/config.jsonc \
                or ~/.speedchat.jsonc"
            ),
            Self::IoError(err) => write!(f, "Failed to read configuration file: {err}"),
            Self::ParseError(err) => write!(f, "Failed to parse configuration file: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            Self::ParseError(err) => Some(err),
            Self::NotFound => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self { Self::IoError(err) }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self { Self::ParseError(err) }
}

/// Configuration file names to search for (in priority order).
const CONFIG_FILE_NAMES: &[&str] = &["config.jsonc", "config.json"];

/// Configuration file names directly in the home directory.
const HOME_CONFIG_FILE_NAMES: &[&str] = &[".speedchat.jsonc", ".speedchat.json"];

/// Returns the possible configuration file paths in priority order.
///
/// 1. `$XDG_CONFIG_HOME/speedchat/config.jsonc` or `config.json`, if set
/// 2. `~/.config/speedchat/config.jsonc` or `config.json`
/// 3. The platform config directory (`~/Library/Application Support` on macOS)
/// 4. `~/.speedchat.jsonc` or `~/.speedchat.json`
#[must_use]
pub fn config_paths() -> Vec<PathBuf> {
    fn push_dir(paths: &mut Vec<PathBuf>, dir: &Path) {
        for filename in CONFIG_FILE_NAMES {
            let path = dir.join(filename);
            // XDG_CONFIG_HOME may well be ~/.config
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    let mut paths = Vec::new();

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        push_dir(&mut paths, &PathBuf::from(xdg_config).join(APP_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        push_dir(&mut paths, &home.join(".config").join(APP_NAME));
    }
    if let Some(config_dir) = dirs::config_dir() {
        push_dir(&mut paths, &config_dir.join(APP_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        for filename in HOME_CONFIG_FILE_NAMES {
            paths.push(home.join(filename));
        }
    }

    paths
}

/// Loads the configuration from the first available config file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if no configuration file exists in any of the expected locations.
/// Returns `ConfigError::IoError` if a configuration file exists but could not be read.
/// Returns `ConfigError::ParseError` if the configuration file contains invalid JSON.
pub fn load_config() -> Result<(SpeedchatConfig, PathBuf), ConfigError> {
    match config_paths().into_iter().find(|path| path.exists()) {
        Some(path) => load_config_from_path(path),
        None => Err(ConfigError::NotFound),
    }
}

/// Loads the configuration from a specific file.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if the file does not exist, and the IO or
/// parse variants if it cannot be read or parsed.
pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<(SpeedchatConfig, PathBuf), ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound);
    }

    let file = fs::File::open(path)?;
    // Strip comments from JSONC before parsing
    let reader = json_comments::StripComments::new(file);
    let config: SpeedchatConfig = serde_json::from_reader(reader)?;
    Ok((config, path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config_matches_constants() {
        let config = SpeedchatConfig::default();
        assert_eq!(config.debounce_ms, 100);
        assert_eq!(config.frame_interval_ms, 16);
        assert_eq!(config.streaming_throttle_ms, 1_200);
        assert_eq!(config.trial_days, 7);
        assert_eq!(config.log_level, "info");
        assert!(config.state_path.is_none());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: SpeedchatConfig = serde_json::from_str(r#"{ "debounceMs": 80 }"#).unwrap();
        assert_eq!(config.debounce_ms, 80);
        assert_eq!(config.streaming_throttle_ms, 1_200);
    }

    #[test]
    fn test_effective_values_are_clamped() {
        let config = SpeedchatConfig {
            debounce_ms: 0,
            frame_interval_ms: 0,
            streaming_throttle_ms: 1_000_000,
            ..Default::default()
        };
        assert_eq!(config.effective_debounce_ms(), MIN_DEBOUNCE_MS);
        assert_eq!(config.effective_frame_interval_ms(), 1);
        assert_eq!(config.effective_streaming_throttle_ms(), MAX_STREAMING_THROTTLE_MS);
    }

    #[test]
    fn test_load_jsonc_with_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.jsonc");
        fs::write(
            &path,
            r#"{
                // faster debounce
                "debounceMs": 50,
                /* keep state next to the config */
                "statePath": "/tmp/speedchat-test/state.json"
            }"#,
        )
        .unwrap();

        let (config, loaded_from) = load_config_from_path(&path).unwrap();
        assert_eq!(loaded_from, path);
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.state_path(), PathBuf::from("/tmp/speedchat-test/state.json"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_config_from_path(dir.path().join("nope.jsonc")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_from_path(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_paths_are_not_empty() {
        let paths = config_paths();
        assert!(!paths.is_empty() || std::env::var("HOME").is_err());
    }
}
