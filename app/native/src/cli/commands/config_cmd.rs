//! Config CLI commands.
//!
//! Commands for creating, locating and inspecting the configuration file.

use std::path::PathBuf;

use clap::Subcommand;

use crate::cli::output;
use crate::config::{self, config_paths};
use crate::config::template::{create_config_file, generate_config_template};
use crate::error::SpeedchatError;

/// Config management commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum ConfigCommands {
    /// Initialize a new configuration file with all options documented.
    ///
    /// Creates a new configuration file at the default location with all
    /// available options commented out. This allows you to see all possible
    /// configuration options and uncomment the ones you want to use.
    #[command(
        name = "init",
        after_long_help = r#"Examples:
  speedchat config init              # Create config at default location
  speedchat config init --force      # Overwrite existing config
  speedchat config init --path ~/my-config.jsonc  # Create at custom path
  speedchat config init --stdout     # Print template to stdout"#
    )]
    Init {
        /// Overwrite existing configuration file if it exists.
        #[arg(long, short)]
        force: bool,

        /// Custom path for the configuration file.
        /// If not specified, uses ~/.config/speedchat/config.jsonc
        #[arg(long, short, value_name = "PATH")]
        path: Option<PathBuf>,

        /// Print the configuration template to stdout instead of writing to a file.
        #[arg(long)]
        stdout: bool,
    },

    /// Show the configuration currently in effect, defaults included.
    Show {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the path to the configuration file.
    ///
    /// Displays the path where SpeedChat looks for configuration files,
    /// and indicates which one is currently in use (if any).
    Path,
}

/// Execute config subcommands.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cmd: &ConfigCommands) -> Result<(), SpeedchatError> {
    match cmd {
        ConfigCommands::Init { stdout: true, .. } => println!("{}", generate_config_template()),
        ConfigCommands::Init { force, path, .. } => init_config(*force, path.clone())?,
        ConfigCommands::Show { json } => show_config(*json)?,
        ConfigCommands::Path => show_config_path(),
    }
    Ok(())
}

/// Initialize a new configuration file.
fn init_config(force: bool, custom_path: Option<PathBuf>) -> Result<(), SpeedchatError> {
    let config_path = custom_path
        .or_else(|| config_paths().into_iter().next())
        .unwrap_or_else(|| PathBuf::from("config.jsonc"));

    if config_path.exists() && !force {
        return Err(SpeedchatError::ConfigError(format!(
            "Configuration file already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        )));
    }

    create_config_file(&config_path).map_err(|err| {
        SpeedchatError::ConfigError(format!("Failed to create config file {}: {err}", config_path.display()))
    })?;

    println!("Configuration file created at: {}", config_path.display());
    println!("All options are commented out and show their defaults.");
    Ok(())
}

/// Show the effective configuration.
fn show_config(json: bool) -> Result<(), SpeedchatError> {
    let config = config::get_config();
    if json {
        output::print_highlighted_json(&serde_json::to_value(config)?);
        return Ok(());
    }

    match config::get_config_path() {
        Some(path) => println!("Loaded from: {}\n", path.display()),
        None => println!("No configuration file loaded, using defaults.\n"),
    }
    println!("Debounce:           {} ms", config.effective_debounce_ms());
    println!("Frame interval:     {} ms", config.effective_frame_interval_ms());
    println!("Streaming throttle: {} ms", config.effective_streaming_throttle_ms());
    println!("Trial length:       {} days", config.trial_days);
    println!("Log level:          {}", config.log_level);
    println!("State file:         {}", config.state_path().display());
    Ok(())
}

/// Lists the search paths and marks the one that was loaded.
fn show_config_path() {
    let state_path = config::get_config().state_path();
    let loaded = config::get_config_path();
    println!("Configuration file search paths (in priority order):\n");

    for (i, path) in config_paths().iter().enumerate() {
        let marker = if loaded == Some(path) {
            " (active)"
        } else if path.exists() {
            " (exists)"
        } else {
            ""
        };
        println!("  {}. {}{marker}", i + 1, path.display());
    }

    match loaded {
        Some(path) if !config_paths().contains(path) => println!("\nLoaded from --config: {}", path.display()),
        Some(_) => {}
        None => {
            println!("\nNo configuration file found.");
            println!("Run 'speedchat config init' to create one.");
        }
    }

    println!("\nState file: {}", state_path.display());
}
