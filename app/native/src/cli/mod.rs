//! CLI module for SpeedChat.
//!
//! Scripted and live sessions, settings and license management, and
//! configuration helpers. The binary parses a [`Cli`] and calls
//! [`Cli::execute`].

mod commands;
mod output;

pub use commands::Cli;
