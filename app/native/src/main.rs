//! SpeedChat command-line entry point.
//!
//! Logging goes to stderr so command output on stdout stays machine-readable.
//! The filter comes from `SPEEDCHAT_LOG`, then the `logLevel` config option.

use clap::Parser;
use speedchat_lib::cli::Cli;
use speedchat_lib::config;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "SPEEDCHAT_LOG";

fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli.apply_config_override() {
        eprintln!("speedchat: {err}");
        std::process::exit(1);
    }

    init_tracing();

    if let Err(err) = cli.execute() {
        eprintln!("speedchat: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let level = std::env::var(LOG_ENV).unwrap_or_else(|_| config::get_config().log_level.clone());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
