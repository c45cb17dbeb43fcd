//! Configuration template generation.
//!
//! Generates a commented configuration template with all available options.

use std::fs;
use std::path::Path;

/// Generates a configuration template with all options commented out.
#[must_use]
pub fn generate_config_template() -> String {
    r#"// SpeedChat Configuration File
// ============================
// This file uses JSONC format (JSON with comments).
// All options below are commented out and show their default values.
// Uncomment and modify the options you want to configure.
//
// Window size, the enabled switch and ultra mode are user settings and are
// changed with `speedchat settings set`, not here.

{
  // ============================================================================
  // Update Scheduling
  // ============================================================================
  // Silence in milliseconds required after the last change before the
  // window is re-applied (10 to 1000)
  // "debounceMs": 100,

  // Updates are aligned to frame boundaries of this many milliseconds (1 to 100)
  // "frameIntervalMs": 16,

  // While a reply is streaming in, updates are spaced at least this many
  // milliseconds apart (0 to 10000, 0 disables the throttle)
  // "streamingThrottleMs": 1200,

  // ============================================================================
  // License
  // ============================================================================
  // Length of the trial period in days
  // "trialDays": 7,

  // ============================================================================
  // Environment
  // ============================================================================
  // Log filter used when SPEEDCHAT_LOG is not set (error, warn, info, debug, trace)
  // "logLevel": "info",

  // Location of the state file holding settings and license data
  // "statePath": "~/.local/share/speedchat/state.json"
}
"#
    .to_string()
}

/// Creates a configuration file with the template at the specified path.
///
/// Creates parent directories if they don't exist.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn create_config_file(path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, generate_config_template())
}
