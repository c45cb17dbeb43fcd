//! CLI command definitions using Clap.
//!
//! This module defines all CLI commands and their arguments, organized into
//! domain-specific submodules:
//!
//! - `config_cmd` - Configuration file management
//! - `license` - Trial status and license keys
//! - `settings` - Persisted user settings
//! - `simulate` - Scripted session in virtual time
//! - `watch` - Live session fed from stdin

use std::io;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Generator, Shell, generate};

use crate::clock::SystemClock;
use crate::content::Document;
use crate::controller::{Controller, Tuning};
use crate::error::SpeedchatError;
use crate::store::JsonFileStore;
use crate::{config, schema};

pub mod config_cmd;
pub mod license;
pub mod settings;
pub mod simulate;
pub mod watch;

pub use config_cmd::ConfigCommands;
pub use license::LicenseCommands;
pub use settings::SettingsCommands;
pub use simulate::SimulateArgs;

/// Application version from Cargo.toml.
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// SpeedChat CLI - keeps long conversation views fast.
#[derive(Parser, Debug)]
#[command(name = "speedchat")]
#[command(author, version = APP_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a custom configuration file.
    ///
    /// Overrides the default configuration file search paths.
    /// Supports JSONC format (JSON with comments).
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum Commands {
    /// Replay a scripted conversation in virtual time.
    ///
    /// Builds an in-memory conversation, runs the windowing engine over it
    /// without sleeping and prints the resulting state. Nothing is persisted.
    Simulate(SimulateArgs),

    /// Run the engine live over turns read from stdin.
    ///
    /// Every non-empty line becomes a new conversation turn. Settings and
    /// license state are read from and written to the state file. Stops at
    /// end of input and prints the final state.
    Watch {
        /// Print the final state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show or change the persisted settings.
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Trial status and license keys.
    #[command(subcommand)]
    License(LicenseCommands),

    /// Configuration file management commands.
    ///
    /// Initialize and locate the configuration file.
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Output SpeedChat configuration JSON Schema.
    ///
    /// Outputs a JSON Schema to stdout that describes the structure of the
    /// configuration file. Can be redirected to a file for use with editors
    /// that support JSON Schema validation.
    Schema,

    /// Generate shell completions.
    ///
    /// Outputs shell completion script to stdout for the specified shell.
    ///
    /// Usage:
    ///   eval "$(speedchat completions --shell zsh)"
    ///   speedchat completions --shell fish > ~/.config/fish/completions/speedchat.fish
    Completions {
        /// The shell to generate completions for.
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Returns the custom config path if specified via --config flag.
    #[must_use]
    pub fn config_path(&self) -> Option<std::path::PathBuf> {
        self.config.as_ref().map(std::path::PathBuf::from)
    }

    /// Registers the `--config` override, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the given file does not exist.
    pub fn apply_config_override(&self) -> Result<(), SpeedchatError> {
        if let Some(path) = self.config_path() {
            if !path.exists() {
                return Err(SpeedchatError::ConfigError(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            config::set_custom_config_path(path);
        }
        Ok(())
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command execution fails.
    pub fn execute(&self) -> Result<(), SpeedchatError> {
        self.apply_config_override()?;

        match &self.command {
            Commands::Simulate(args) => simulate::execute(args),
            Commands::Watch { json } => watch::execute(*json),
            Commands::Settings(cmd) => settings::execute(cmd),
            Commands::License(cmd) => license::execute(cmd),
            Commands::Config(cmd) => config_cmd::execute(cmd),

            Commands::Schema => {
                println!("{}", schema::print_schema());
                Ok(())
            }

            Commands::Completions { shell } => {
                Self::print_completions(*shell);
                Ok(())
            }
        }
    }

    /// Print shell completions to stdout.
    fn print_completions<G: Generator>(generator: G) {
        let mut cmd = Self::command();
        generate(generator, &mut cmd, "speedchat", &mut io::stdout());
    }
}

/// Opens the state file named by the configuration.
fn state_store() -> Arc<JsonFileStore> {
    let path = config::get_config().state_path();
    tracing::debug!(path = %path.display(), "using state file");
    Arc::new(JsonFileStore::new(path))
}

/// A controller over an empty document, used to change persisted state with
/// the same rules the live engine applies.
fn offline_controller(store: Arc<JsonFileStore>) -> Controller {
    let document = Document::new();
    Controller::new(
        Arc::new(document.clone()),
        &document,
        store,
        Arc::new(SystemClock),
        Tuning::from(config::get_config()),
    )
}
