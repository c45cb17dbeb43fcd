//! SpeedChat - keeps long, fast-growing conversation views responsive.
//!
//! The engine watches a conversation document, keeps only the most recent
//! turns visible behind a cutoff marker, optionally evicts the hidden ones,
//! and gates all of it behind a trial or license. The host page, the clock
//! and the persisted settings are injected, so the same controller runs in
//! virtual time ([`sim`]) and in real time ([`runtime`]).

// Engine
pub mod content;
pub mod controller;
pub mod feed;
pub mod license;
pub mod prune;
pub mod scheduler;
pub mod window;

// Environment
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod hub;
pub mod runtime;
pub mod schema;
pub mod sim;
pub mod store;

// Command line
pub mod cli;

pub use controller::{Controller, ControllerStatus, Tuning};
pub use error::SpeedchatError;
pub use license::AppState;
