//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify its JSON output.

use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command with FOCUSLOOP_HOME pointed at `home`.
fn run_cli(home: &TempDir, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_focusloop"))
        .env("FOCUSLOOP_HOME", home.path())
        .env_remove("FOCUSLOOP_LOG")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(home: &TempDir, args: &[&str]) -> Value {
    let (code, stdout, stderr) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("stdout is JSON")
}

#[test]
fn test_timer_status_starts_idle() {
    let home = TempDir::new().unwrap();
    let out = run_json(&home, &["timer", "status"]);
    let snap = &out["snapshot"];
    assert_eq!(snap["currentSessionKind"], "work");
    assert_eq!(snap["isRunning"], false);
    assert_eq!(snap["timeRemainingSeconds"], 1500);
}

#[test]
fn test_timer_start_then_pause() {
    let home = TempDir::new().unwrap();
    let out = run_json(&home, &["timer", "start"]);
    assert_eq!(out["changed"], true);
    assert_eq!(out["snapshot"]["isRunning"], true);

    let out = run_json(&home, &["timer", "pause"]);
    assert_eq!(out["changed"], true);
    assert_eq!(out["snapshot"]["isPaused"], true);
    assert_eq!(out["snapshot"]["isRunning"], false);
}

#[test]
fn test_timer_skip_moves_to_break_without_credit() {
    let home = TempDir::new().unwrap();
    let out = run_json(&home, &["timer", "skip"]);
    assert_eq!(out["snapshot"]["currentSessionKind"], "shortBreak");
    let events = out["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["type"] == "session_advanced" && e["skipped"] == true));
    assert!(!events.iter().any(|e| e["type"] == "work_completed"));

    let stats = run_json(&home, &["stats", "all"]);
    assert_eq!(stats["total_count"], 0);
}

#[test]
fn test_timer_complete_credits_work() {
    let home = TempDir::new().unwrap();
    run_json(&home, &["timer", "switch", "--task", "T1"]);
    run_json(&home, &["timer", "start"]);
    let out = run_json(&home, &["timer", "complete"]);
    assert_eq!(out["recorded"]["outcome"], "forwarded");
    assert_eq!(out["snapshot"]["currentSessionKind"], "shortBreak");
    assert!(out["snapshot"]["taskId"].is_null());

    let today = run_json(&home, &["stats", "today"]);
    assert_eq!(today["completed"], 1);
    assert_eq!(today["streakDays"], 1);
}

#[test]
fn test_timer_complete_during_break_fails() {
    let home = TempDir::new().unwrap();
    run_json(&home, &["timer", "skip"]);
    let (code, _, stderr) = run_cli(&home, &["timer", "complete"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_timer_switch_needs_confirmation_while_running() {
    let home = TempDir::new().unwrap();
    run_json(&home, &["timer", "start"]);
    let out = run_json(&home, &["timer", "switch", "--task", "T2"]);
    assert_eq!(out["decision"], "requires_confirmation");
    assert!(out["snapshot"]["taskId"].is_null());

    let out = run_json(&home, &["timer", "switch", "--task", "T2", "--confirm"]);
    assert_eq!(out["decision"], "applied");
    assert_eq!(out["snapshot"]["taskId"], "T2");
    assert_eq!(out["snapshot"]["isRunning"], false);
}

#[test]
fn test_reload_of_break_is_fresh_work() {
    let home = TempDir::new().unwrap();
    run_json(&home, &["timer", "skip"]);
    run_json(&home, &["timer", "start"]);
    // A new process reloads the persisted break.
    let out = run_json(&home, &["timer", "status"]);
    assert_eq!(out["snapshot"]["currentSessionKind"], "work");
    assert_eq!(out["snapshot"]["isRunning"], false);
}

#[test]
fn test_timer_reset() {
    let home = TempDir::new().unwrap();
    run_json(&home, &["timer", "start"]);
    let out = run_json(&home, &["timer", "reset"]);
    assert_eq!(out["snapshot"]["isRunning"], false);
    assert_eq!(out["snapshot"]["timeRemainingSeconds"], 1500);
}

#[test]
fn test_config_set_and_get() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(&home, &["config", "get", "session.work_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "25");

    let (code, _, _) = run_cli(&home, &["config", "set", "session.work_minutes", "50"]);
    assert_eq!(code, 0);
    let out = run_json(&home, &["timer", "reset"]);
    assert_eq!(out["snapshot"]["timeRemainingSeconds"], 3000);
}

#[test]
fn test_config_rejects_invalid_values() {
    let home = TempDir::new().unwrap();
    let (code, _, _) = run_cli(&home, &["config", "set", "session.work_minutes", "0"]);
    assert_eq!(code, 1);
    let (code, _, _) = run_cli(&home, &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);
}
