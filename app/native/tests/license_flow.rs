//! Trial expiry, enforcement and unlocking as seen through the controller.

use std::sync::Arc;

use serde_json::{Value, json};
use speedchat_lib::constants::license::DAY_MS;
use speedchat_lib::constants::storage_keys::{BLOCKED_ENFORCED, ENABLED, LICENSE_KEY, PRO_UNLOCKED, TRIAL_START};
use speedchat_lib::controller::Tuning;
use speedchat_lib::sim::Simulation;
use speedchat_lib::store::{ConfigStore, MemoryStore, map_of};
use speedchat_lib::{AppState, SpeedchatError};

const T0: u64 = 1_700_000_000_000;

fn expired_store() -> MemoryStore {
    MemoryStore::with_values(map_of([(TRIAL_START, Value::from(T0 - 8 * DAY_MS))]))
}

fn with_turns(store: &MemoryStore, turns: usize) -> Simulation {
    let sim = Simulation::new(Arc::new(store.clone()), Tuning::default(), T0);
    for n in 0..turns {
        sim.document.push_turn(format!("turn {n}"));
    }
    sim
}

#[test]
fn test_fresh_install_starts_trial() {
    let store = MemoryStore::new();
    let mut sim = with_turns(&store, 50);
    sim.settle();

    let status = sim.controller.status();
    assert_eq!(status.app_state, AppState::Trial);
    assert_eq!(status.remaining_trial_days, Some(7));
    assert_eq!(store.snapshot()[TRIAL_START], json!(T0));
    assert_eq!(sim.document.hidden_count(), 20);
}

#[test]
fn test_status_never_starts_the_trial() {
    let store = MemoryStore::new();
    let mut sim = with_turns(&store, 10);
    sim.settle();

    // Cleared elsewhere; the notification is still queued.
    store.set(map_of([(TRIAL_START, Value::Null)])).unwrap();
    let status = sim.controller.status();

    assert_eq!(status.remaining_trial_days, None);
    assert_eq!(store.snapshot()[TRIAL_START], Value::Null);
}

#[test]
fn test_expired_trial_blocks_and_disables_once() {
    let store = expired_store();
    let mut sim = with_turns(&store, 50);
    sim.settle();

    let status = sim.controller.status();
    assert_eq!(status.app_state, AppState::Blocked);
    assert_eq!(status.remaining_trial_days, Some(0));
    assert!(!status.enabled);
    assert!(!status.effective_enabled);
    assert_eq!(sim.document.hidden_count(), 0);
    assert!(!sim.document.has_marker());

    let snapshot = store.snapshot();
    assert_eq!(snapshot[ENABLED], json!(false));
    assert_eq!(snapshot[BLOCKED_ENFORCED], json!(true));
}

#[test]
fn test_blocked_refuses_enable_and_purge() {
    let store = expired_store();
    let mut sim = with_turns(&store, 50);
    sim.settle();

    assert!(matches!(sim.controller.set_enabled(true), Err(SpeedchatError::LicenseRequired)));
    assert_eq!(sim.controller.purge_now(), 0);
    assert_eq!(sim.controller.status().total, 50);
    assert_eq!(store.snapshot()[ENABLED], json!(false));
}

#[test]
fn test_enforcement_is_not_repeated() {
    let store = expired_store();
    let mut first = with_turns(&store, 0);
    first.settle();

    // Someone flips the switch back on by hand; a new session must not undo it.
    store.set(map_of([(ENABLED, Value::Bool(true))])).unwrap();
    let mut second = with_turns(&store, 50);
    second.settle();

    assert_eq!(second.controller.app_state(), AppState::Blocked);
    assert!(second.controller.settings().enabled);
    assert!(!second.controller.effective_enabled());
    assert_eq!(second.document.hidden_count(), 0);
}

#[test]
fn test_unlock_restores_windowing() {
    let store = expired_store();
    let mut sim = with_turns(&store, 50);
    sim.settle();

    assert!(!sim.controller.unlock("SPD-ABCD1234-PRO").unwrap());
    assert_eq!(sim.controller.app_state(), AppState::Blocked);

    assert!(sim.controller.unlock(" spd-abcd1237-pro ").unwrap());
    assert_eq!(sim.controller.app_state(), AppState::Pro);
    assert_eq!(store.snapshot()[LICENSE_KEY], json!("SPD-ABCD1237-PRO"));

    sim.controller.set_enabled(true).unwrap();
    sim.settle();
    assert_eq!(sim.document.hidden_count(), 20);
    assert_eq!(sim.controller.status().remaining_trial_days, None);
}

#[test]
fn test_unlock_elsewhere_reaches_blocked_instance() {
    let store = expired_store();
    let mut sim = with_turns(&store, 50);
    sim.settle();
    assert_eq!(sim.controller.app_state(), AppState::Blocked);

    store.set(map_of([(PRO_UNLOCKED, Value::Bool(true))])).unwrap();
    sim.settle();

    assert_eq!(sim.controller.app_state(), AppState::Pro);
}

#[test]
fn test_pro_is_sticky_for_the_session() {
    let store = expired_store();
    store.set(map_of([(PRO_UNLOCKED, Value::Bool(true))])).unwrap();
    let mut sim = with_turns(&store, 50);
    sim.settle();
    assert_eq!(sim.controller.app_state(), AppState::Pro);
    assert_eq!(sim.document.hidden_count(), 20);

    store.set(map_of([(PRO_UNLOCKED, Value::Bool(false))])).unwrap();
    sim.document.push_turn("after revoke");
    sim.settle();

    assert_eq!(sim.controller.app_state(), AppState::Pro);
    assert_eq!(sim.document.hidden_count(), 21);
}
