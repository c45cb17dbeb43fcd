//! Scripted session in virtual time.
//!
//! Builds a conversation in memory, replays it through the engine without
//! sleeping and prints the final state. Useful to see what a given window,
//! eviction setting or trial age does to a long conversation.

use std::sync::Arc;

use clap::Args;
use serde_json::Value;

use crate::cli::output;
use crate::clock::{Clock, SystemClock};
use crate::config;
use crate::constants::license::DAY_MS;
use crate::constants::storage_keys::TRIAL_START;
use crate::controller::Tuning;
use crate::error::SpeedchatError;
use crate::license::normalize_key;
use crate::sim::Simulation;
use crate::store::{MemoryStore, StoreMap, map_of};

/// Arguments for `speedchat simulate`.
#[derive(Args, Debug)]
#[command(after_long_help = r"Examples:
  speedchat simulate                          # 50 turns, default window
  speedchat simulate -m 200 --window 45 --ultra
  speedchat simulate --stream-chunks 40       # stream a reply token by token
  speedchat simulate --trial-age-days 9       # expired trial")]
pub struct SimulateArgs {
    /// Number of conversation turns to create.
    #[arg(long, short, default_value_t = 50)]
    pub messages: usize,

    /// Visible window size (clamped to 10..120 and snapped to steps of 5).
    #[arg(long, short, allow_hyphen_values = true)]
    pub window: Option<i64>,

    /// Evict hidden turns automatically.
    #[arg(long)]
    pub ultra: bool,

    /// Evict hidden turns once at the end.
    #[arg(long)]
    pub purge: bool,

    /// Stream one more reply in this many chunks after the conversation.
    #[arg(long, default_value_t = 0, value_name = "N")]
    pub stream_chunks: usize,

    /// Virtual time between streamed chunks.
    #[arg(long, default_value_t = 50, value_name = "MS")]
    pub chunk_interval_ms: u64,

    /// Pretend the trial started this many days ago.
    #[arg(long, default_value_t = 0, value_name = "DAYS")]
    pub trial_age_days: u64,

    /// Unlock with this license key before starting.
    #[arg(long, value_name = "KEY")]
    pub key: Option<String>,

    /// Print the final state as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Runs the scripted session.
///
/// # Errors
///
/// Returns an error if `--key` is not a valid license key or if enabling is
/// refused because the trial has expired.
pub fn execute(args: &SimulateArgs) -> Result<(), SpeedchatError> {
    let start_ms = SystemClock.now_ms();
    let store = Arc::new(MemoryStore::with_values(initial_state(args, start_ms)));
    let mut sim = Simulation::new(store, Tuning::from(config::get_config()), start_ms);

    if let Some(key) = &args.key {
        if !sim.controller.unlock(key)? {
            return Err(SpeedchatError::InvalidLicenseKey(normalize_key(key)));
        }
    }
    if let Some(window) = args.window {
        sim.controller.set_window_size(window);
    }
    if args.ultra {
        sim.controller.set_ultra_mode(true);
    }

    for n in 1..=args.messages {
        sim.document.push_turn(format!("turn {n}"));
    }
    sim.settle();

    if args.stream_chunks > 0 {
        stream_reply(&mut sim, args.stream_chunks, args.chunk_interval_ms);
    }

    if args.purge {
        let removed = sim.controller.purge_now();
        tracing::info!(removed, "manual purge");
        sim.settle();
    }

    let status = sim.controller.status();
    if args.json {
        output::print_highlighted_json(&serde_json::to_value(&status)?);
    } else {
        output::print_status(&status);
    }
    Ok(())
}

fn initial_state(args: &SimulateArgs, start_ms: u64) -> StoreMap {
    if args.trial_age_days == 0 {
        return StoreMap::new();
    }
    let started = start_ms.saturating_sub(args.trial_age_days.saturating_mul(DAY_MS)).max(1);
    map_of([(TRIAL_START, Value::from(started))])
}

/// Streams a reply chunk by chunk while the host reports itself as growing.
fn stream_reply(sim: &mut Simulation, chunks: usize, interval_ms: u64) {
    sim.document.set_growing(true);
    let reply = sim.document.push_turn(String::new());
    for n in 0..chunks {
        sim.document.append_text(reply, &format!("token{n} "));
        sim.advance(interval_ms);
    }
    sim.document.set_growing(false);
    sim.document.append_text(reply, "[done]");
    sim.settle();
}
