//! Integration tests for the binary surface.
//!
//! These run the real `airlocal` binary with `AIRLOCAL_HOME` pointed at
//! a temp directory. They only cover paths that need no docker/kind on
//! the machine: argument handling, read-only status, lock contention,
//! state-corruption reporting, and the no-op destroy.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use airlocal::core::lock::EnvLock;
use airlocal::core::paths::EnvPaths;

fn airlocal(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("airlocal").expect("binary");
    cmd.env("AIRLOCAL_HOME", home.path());
    cmd
}

#[test]
fn help_lists_the_lifecycle_commands() {
    let home = TempDir::new().expect("temp dir");
    airlocal(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("install")
                .and(predicate::str::contains("start"))
                .and(predicate::str::contains("stop"))
                .and(predicate::str::contains("status"))
                .and(predicate::str::contains("logs"))
                .and(predicate::str::contains("destroy")),
        );
}

#[test]
fn version_prints_name() {
    let home = TempDir::new().expect("temp dir");
    airlocal(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("airlocal"));
}

#[test]
fn status_on_fresh_machine_succeeds() {
    let home = TempDir::new().expect("temp dir");
    airlocal(&home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("cdp-local"));
}

#[test]
fn status_never_fails_even_with_corrupt_state() {
    let home = TempDir::new().expect("temp dir");
    std::fs::write(home.path().join("state.json"), "garbage").expect("write");

    airlocal(&home)
        .arg("status")
        .assert()
        .success()
        .stderr(predicate::str::contains("state record problem"));
}

#[test]
fn start_without_install_points_at_install() {
    let home = TempDir::new().expect("temp dir");
    airlocal(&home)
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("airlocal install"));
}

#[test]
fn stop_with_corrupt_state_exits_with_state_code() {
    let home = TempDir::new().expect("temp dir");
    std::fs::write(home.path().join("state.json"), "{ torn").expect("write");

    airlocal(&home)
        .arg("stop")
        .assert()
        .code(6)
        .stderr(predicate::str::contains("corrupt"));
}

#[test]
fn concurrent_invocation_fails_fast_with_conflict_code() {
    let home = TempDir::new().expect("temp dir");
    let paths = EnvPaths::new(home.path().to_path_buf());
    let _lock = EnvLock::acquire(&paths).expect("hold the lock");

    airlocal(&home)
        .arg("stop")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("already running"));
}

#[test]
fn destroy_on_fresh_machine_is_a_noop() {
    let home = TempDir::new().expect("temp dir");
    airlocal(&home)
        .args(["destroy", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to do"));
}

#[test]
fn logs_rejects_unknown_services() {
    let home = TempDir::new().expect("temp dir");
    airlocal(&home)
        .args(["logs", "nonsense"])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("unknown service")
                .and(predicate::str::contains("scheduler")),
        );
}

#[test]
fn completion_generates_a_script() {
    let home = TempDir::new().expect("temp dir");
    airlocal(&home)
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("airlocal"));
}
