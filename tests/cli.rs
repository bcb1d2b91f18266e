//! End-to-end tests of the `nexora-queue` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn nexora(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nexora-queue").unwrap();
    cmd.env_remove("RUST_LOG")
        .env("HOME", temp_dir.path())
        .env("NEXORA_BASE_URL", "http://127.0.0.1:9")
        .arg("--db")
        .arg(temp_dir.path().join("queue.db"));
    cmd
}

#[test]
fn enqueue_then_peek_as_json() {
    let temp_dir = TempDir::new().unwrap();

    nexora(&temp_dir)
        .args(["enqueue", "password-reset", "--payload", r#"{"token":"abc"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("Password Reset"));

    let output = nexora(&temp_dir)
        .args(["--output", "json", "peek", "password-reset"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["count"], 1);
    assert_eq!(parsed["items"][0]["payload"]["token"], "abc");
    assert_eq!(parsed["items"][0]["retry"], 0);
}

#[test]
fn unknown_type_exits_with_usage_code() {
    let temp_dir = TempDir::new().unwrap();

    nexora(&temp_dir)
        .args(["enqueue", "billing"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("billing"));
}

#[test]
fn clear_requires_force() {
    let temp_dir = TempDir::new().unwrap();

    nexora(&temp_dir)
        .args(["clear"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    nexora(&temp_dir)
        .args(["clear", "--force"])
        .assert()
        .success();
}

#[test]
fn unknown_sync_tag_is_a_no_op() {
    let temp_dir = TempDir::new().unwrap();

    nexora(&temp_dir)
        .args(["trigger", "sync-bogus"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending operations"));
}

#[test]
fn status_reports_pending_counts() {
    let temp_dir = TempDir::new().unwrap();

    nexora(&temp_dir)
        .args(["send", "forgot-password", "--offline", "-p", r#"{"email":"a@b.mx"}"#])
        .assert()
        .success();

    let output = nexora(&temp_dir)
        .args(["-o", "json", "status"])
        .output()
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["pending"], 1);
    assert_eq!(parsed["by_type"]["forgot-password"], 1);
}

#[test]
fn worker_stops_at_end_of_input() {
    let temp_dir = TempDir::new().unwrap();

    nexora(&temp_dir)
        .args(["-o", "json", "worker", "--no-watch"])
        .write_stdin("{\"kind\":\"drain_all\"}\nnot json\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"accepted\": 1"))
        .stdout(predicate::str::contains("\"rejected\": 1"));
}
