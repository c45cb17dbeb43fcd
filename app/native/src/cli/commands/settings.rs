//! Settings CLI commands.
//!
//! Reads and writes the persisted user settings in the state file. Writes go
//! through the controller so clamping and license rules are the same as in a
//! live session.

use clap::{Subcommand, ValueEnum};
use serde_json::Value;

use super::{offline_controller, state_store};
use crate::cli::output;
use crate::error::SpeedchatError;
use crate::store::Settings;
use crate::store::settings::parse_leading_int;

/// Settings management commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum SettingsCommands {
    /// Show the current settings.
    Show {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Change one setting.
    #[command(after_long_help = r"Examples:
  speedchat settings set enabled off
  speedchat settings set window 45
  speedchat settings set ultra on")]
    Set {
        /// Setting to change.
        #[arg(value_enum)]
        key: SettingKey,

        /// New value: on/off for switches, a number for the window.
        value: String,
    },
}

/// Settings that can be changed from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SettingKey {
    /// Whether older messages are hidden.
    Enabled,
    /// Number of trailing messages kept visible (10 to 120, steps of 5).
    Window,
    /// Whether hidden messages are evicted automatically.
    Ultra,
}

/// Execute settings subcommands.
///
/// # Errors
///
/// Returns an error if the value is invalid, the state file cannot be read,
/// or enabling is refused because the trial has expired.
pub fn execute(cmd: &SettingsCommands) -> Result<(), SpeedchatError> {
    match cmd {
        SettingsCommands::Show { json } => show(*json),
        SettingsCommands::Set { key, value } => set(*key, value),
    }
}

fn show(json: bool) -> Result<(), SpeedchatError> {
    let settings = Settings::load(state_store().as_ref())?;
    if json {
        output::print_highlighted_json(&serde_json::to_value(settings)?);
    } else {
        output::print_settings(&settings);
    }
    Ok(())
}

fn set(key: SettingKey, value: &str) -> Result<(), SpeedchatError> {
    let mut controller = offline_controller(state_store());

    match key {
        SettingKey::Enabled => controller.set_enabled(parse_switch(value)?)?,
        SettingKey::Ultra => controller.set_ultra_mode(parse_switch(value)?),
        SettingKey::Window => {
            let requested = parse_leading_int(&Value::String(value.to_string())).ok_or_else(|| {
                SpeedchatError::InvalidArguments(format!("window must be a number, got '{value}'"))
            })?;
            let applied = controller.set_window_size(requested);
            if i64::from(applied) != requested {
                println!("Window adjusted to {applied} (range 10 to 120, steps of 5).");
            }
        }
    }

    let status = controller.status();
    if status.pending_writes > 0 {
        return Err(SpeedchatError::CommandError("the state file could not be written".to_string()));
    }
    output::print_settings(&controller.settings());
    Ok(())
}

/// Parses an on/off style switch.
fn parse_switch(value: &str) -> Result<bool, SpeedchatError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(SpeedchatError::InvalidArguments(format!("expected on or off, got '{other}'"))),
    }
}
