//! License CLI commands.

use clap::Subcommand;

use super::state_store;
use crate::cli::output;
use crate::clock::{Clock, SystemClock};
use crate::config;
use crate::error::SpeedchatError;
use crate::license::{AppState, LicenseGate, normalize_key, validate_key};

/// License management commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum LicenseCommands {
    /// Show the license state and the days left in the trial.
    ///
    /// Starts the trial clock if it never started.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check a key without storing it.
    Validate {
        /// The license key, for example SPD-XXXXXXXX-PRO.
        key: String,
    },

    /// Store a key and unlock PRO.
    Unlock {
        /// The license key, for example SPD-XXXXXXXX-PRO.
        key: String,
    },
}

/// Execute license subcommands.
///
/// # Errors
///
/// Returns an error if the key is invalid or the state file cannot be used.
pub fn execute(cmd: &LicenseCommands) -> Result<(), SpeedchatError> {
    match cmd {
        LicenseCommands::Status { json } => status(*json),
        LicenseCommands::Validate { key } => {
            if !validate_key(key) {
                return Err(SpeedchatError::InvalidLicenseKey(normalize_key(key)));
            }
            println!("{} {}", output::format_bool(true), normalize_key(key));
            Ok(())
        }
        LicenseCommands::Unlock { key } => unlock(key),
    }
}

fn gate() -> LicenseGate { LicenseGate::new(config::get_config().trial_days) }

fn status(json: bool) -> Result<(), SpeedchatError> {
    let store = state_store();
    let now = SystemClock.now_ms();
    let mut gate = gate();

    let state = gate.app_state(store.as_ref(), now)?;
    let trial = gate.trial_info(store.as_ref(), now)?;

    if json {
        let value = serde_json::json!({ "appState": state, "trial": trial });
        output::print_highlighted_json(&value);
    } else {
        println!("State: {}", output::format_state(state));
        if state != AppState::Pro {
            println!("Trial days left: {}", trial.remaining_days);
        }
    }
    Ok(())
}

fn unlock(key: &str) -> Result<(), SpeedchatError> {
    let store = state_store();
    if !gate().unlock(store.as_ref(), key)? {
        return Err(SpeedchatError::InvalidLicenseKey(normalize_key(key)));
    }
    println!("{} SpeedChat PRO unlocked.", output::format_bool(true));
    Ok(())
}
