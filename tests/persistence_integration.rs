//! Integration tests for state persistence.
//!
//! These exercise the state store through the public API the way
//! separate CLI invocations would: every "invocation" builds a fresh
//! store over the same directory and must see exactly what the last
//! one committed.

use std::fs;

use tempfile::TempDir;

use airlocal::core::lock::{EnvLock, LockError};
use airlocal::core::paths::EnvPaths;
use airlocal::core::state::{AppState, ClusterState, EnvironmentState, Phase};
use airlocal::core::store::{StateStore, StoreError};

fn paths(temp: &TempDir) -> EnvPaths {
    EnvPaths::new(temp.path().to_path_buf())
}

fn store(temp: &TempDir) -> StateStore {
    StateStore::new(paths(temp), "cdp-local")
}

/// A ready state as an install would leave it.
fn ready_state() -> EnvironmentState {
    let mut state = EnvironmentState::absent("cdp-local");
    state.cluster_status = ClusterState::Ready;
    state.app_status = AppState::Ready;
    state.installed_chart_version = Some("1.13.1".into());
    state.port_forwards.insert("webserver".into(), 4242);
    state.record_success("install");
    state
}

#[test]
fn state_survives_across_store_instances() {
    let temp = TempDir::new().expect("temp dir");

    // "First invocation" writes.
    store(&temp).save(&ready_state()).expect("save");

    // "Second invocation" reads with a brand new store.
    let loaded = store(&temp).load().expect("load");
    assert_eq!(loaded.phase(), Phase::Ready);
    assert_eq!(loaded.installed_chart_version.as_deref(), Some("1.13.1"));
    assert_eq!(loaded.port_forwards.get("webserver"), Some(&4242));
}

#[test]
fn record_is_human_inspectable_json() {
    let temp = TempDir::new().expect("temp dir");
    store(&temp).save(&ready_state()).expect("save");

    let raw = fs::read_to_string(paths(&temp).state_path()).expect("read");
    // pretty-printed, field names visible
    assert!(raw.contains("\"cluster_status\""));
    assert!(raw.contains("\"ready\""));
    assert!(raw.lines().count() > 5);
}

#[test]
fn crash_between_temp_write_and_rename_keeps_old_record() {
    let temp = TempDir::new().expect("temp dir");
    let store = store(&temp);

    let mut old = ready_state();
    old.installed_chart_version = Some("1.0.0".into());
    store.save(&old).expect("save old");

    // Simulate a crash mid-save: the temp file exists with half of a
    // newer record, the rename never happened.
    fs::write(
        store.paths().state_tmp_path(),
        "{\"schema_version\":1,\"cluster_na",
    )
    .expect("write torn temp");

    let loaded = store.load().expect("load");
    assert_eq!(loaded.installed_chart_version.as_deref(), Some("1.0.0"));

    // And the next save still works, replacing the stale temp file.
    store.save(&ready_state()).expect("save new");
    assert_eq!(
        store.load().expect("load").installed_chart_version.as_deref(),
        Some("1.13.1")
    );
}

#[test]
fn corrupt_record_errors_and_is_left_in_place() {
    let temp = TempDir::new().expect("temp dir");
    let store = store(&temp);
    fs::create_dir_all(store.paths().root()).expect("mkdir");
    fs::write(store.paths().state_path(), "definitely not json").expect("write");

    let err = store.load().expect_err("corrupt");
    assert!(matches!(err, StoreError::Corrupt { .. }));
    let raw = fs::read_to_string(store.paths().state_path()).expect("read");
    assert_eq!(raw, "definitely not json");
}

#[test]
fn two_stores_cannot_transact_concurrently() {
    let temp = TempDir::new().expect("temp dir");
    let store_a = store(&temp);
    let store_b = store(&temp);

    let tx = store_a.transaction().expect("first transaction");
    let err = store_b.transaction().expect_err("second transaction");
    assert!(matches!(err, StoreError::Locked));

    drop(tx);
    store_b.transaction().expect("after release");
}

#[test]
fn lock_conflicts_with_raw_lock_holders() {
    // A lifecycle operation's transaction and any other lock user
    // contend on the same file.
    let temp = TempDir::new().expect("temp dir");
    let p = paths(&temp);

    let raw = EnvLock::acquire(&p).expect("raw lock");
    let err = store(&temp).transaction().expect_err("locked out");
    assert!(matches!(err, StoreError::Locked));
    drop(raw);

    let lock = EnvLock::acquire(&p);
    assert!(lock.is_ok());
    drop(lock);

    // And vice versa: a held transaction blocks raw acquisition.
    let tx = store(&temp).transaction().expect("tx");
    let err = EnvLock::acquire(&p).expect_err("raw locked out");
    assert!(matches!(err, LockError::AlreadyLocked));
    drop(tx);
}

#[test]
fn checkpoints_are_durable_mid_transaction() {
    let temp = TempDir::new().expect("temp dir");
    let store = store(&temp);

    let mut tx = store.transaction().expect("tx");
    tx.state_mut().cluster_status = ClusterState::Creating;
    tx.state_mut().last_operation = Some("install".into());
    tx.save().expect("checkpoint");

    // A reader (e.g. the next invocation after a crash) sees the
    // checkpoint even while the transaction object still exists.
    let observed = StateStore::new(paths(&temp), "cdp-local")
        .load()
        .expect("load");
    assert_eq!(observed.cluster_status, ClusterState::Creating);
    assert_eq!(observed.phase(), Phase::Provisioning);
}

#[test]
fn reset_returns_environment_to_absent() {
    let temp = TempDir::new().expect("temp dir");
    let store = store(&temp);
    store.save(&ready_state()).expect("save");

    store.reset().expect("reset");
    let loaded = store.load().expect("load");
    assert_eq!(loaded.phase(), Phase::Absent);
    assert!(loaded.port_forwards.is_empty());
    assert!(loaded.installed_chart_version.is_none());
}
