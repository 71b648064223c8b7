//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. Each test
//! points HOME at its own scratch directory so profile state (config,
//! cooldown store, telemetry archive) never leaks between tests.

use std::path::PathBuf;
use std::process::Command;

/// Run a CLI command against the given scratch home and return output.
fn run_cli(home: &PathBuf, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "nudgekit-cli", "--"])
        .args(args)
        .env("HOME", home)
        .env("NUDGEKIT_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn scratch_home(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nudgekit-cli-test-{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch home");
    dir
}

#[test]
fn test_config_list() {
    let home = scratch_home("config-list");
    let (stdout, _, code) = run_cli(&home, &["config", "list"]);
    assert_eq!(code, 0, "config list failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("config list JSON");
    assert!(parsed.get("triggers").is_some());
    assert!(parsed.get("scroll").is_some());
}

#[test]
fn test_config_get_default() {
    let home = scratch_home("config-get");
    let (stdout, _, code) = run_cli(&home, &["config", "get", "scroll.fixed_delay_secs"]);
    assert_eq!(code, 0, "config get failed");
    assert_eq!(stdout.trim(), "30");
}

#[test]
fn test_config_set_roundtrip() {
    let home = scratch_home("config-set");
    let (_, _, code) = run_cli(&home, &["config", "set", "exit_intent.min_dwell_secs", "5"]);
    assert_eq!(code, 0, "config set failed");
    let (stdout, _, code) = run_cli(&home, &["config", "get", "exit_intent.min_dwell_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "5");
}

#[test]
fn test_config_get_unknown_key_fails() {
    let home = scratch_home("config-unknown");
    let (_, _, code) = run_cli(&home, &["config", "get", "no.such.key"]);
    assert_ne!(code, 0, "unknown key should fail");
}

#[test]
fn test_gate_check_fresh_key_is_eligible() {
    let home = scratch_home("gate-fresh");
    let (stdout, _, code) = run_cli(&home, &["gate", "check", "floatingCta"]);
    assert_eq!(code, 0, "gate check failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("gate check JSON");
    assert_eq!(parsed["eligible"], serde_json::Value::Bool(true));
}

#[test]
fn test_gate_record_shown_starts_cooldown() {
    let home = scratch_home("gate-shown");
    let (_, _, code) = run_cli(&home, &["gate", "record-shown", "floatingCta"]);
    assert_eq!(code, 0, "gate record-shown failed");

    let (stdout, _, code) = run_cli(&home, &["gate", "check", "floatingCta"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["eligible"], serde_json::Value::Bool(false));
    assert!(parsed.get("eligible_again_at").is_some());

    // A zero-hour override releases it immediately.
    let (stdout, _, code) = run_cli(
        &home,
        &["gate", "check", "floatingCta", "--cooldown-hours", "0"],
    );
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["eligible"], serde_json::Value::Bool(true));
}

#[test]
fn test_gate_clear_forgets_record() {
    let home = scratch_home("gate-clear");
    let _ = run_cli(&home, &["gate", "record-shown", "exitIntentModal"]);
    let (_, _, code) = run_cli(&home, &["gate", "clear", "exitIntentModal"]);
    assert_eq!(code, 0, "gate clear failed");

    let (stdout, _, code) = run_cli(&home, &["gate", "check", "exitIntentModal"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["eligible"], serde_json::Value::Bool(true));
}

#[test]
fn test_gate_unknown_key_fails() {
    let home = scratch_home("gate-unknown");
    let (_, stderr, code) = run_cli(&home, &["gate", "check", "bogusKey"]);
    assert_ne!(code, 0, "unknown trigger key should fail");
    assert!(stderr.contains("unknown trigger key"));
}

#[test]
fn test_countdown_status_without_target() {
    let home = scratch_home("countdown-none");
    let (stdout, _, code) = run_cli(&home, &["countdown", "status"]);
    assert_eq!(code, 0, "countdown status failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(parsed["target"].is_null());
}

#[test]
fn test_countdown_set_and_status() {
    let home = scratch_home("countdown-set");
    let (_, _, code) = run_cli(&home, &["countdown", "set", "2099-01-01T00:00:00Z"]);
    assert_eq!(code, 0, "countdown set failed");

    let (stdout, _, code) = run_cli(&home, &["countdown", "status"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["completed"], serde_json::Value::Bool(false));
    assert!(parsed["remaining"]["days"].as_u64().unwrap() > 0);

    let (_, _, code) = run_cli(&home, &["countdown", "clear"]);
    assert_eq!(code, 0, "countdown clear failed");
}

#[test]
fn test_countdown_rejects_bad_target() {
    let home = scratch_home("countdown-bad");
    let (_, _, code) = run_cli(&home, &["countdown", "set", "next tuesday"]);
    assert_ne!(code, 0, "malformed target should fail");
}

#[test]
fn test_session_example_parses() {
    let home = scratch_home("session-example");
    let (stdout, _, code) = run_cli(&home, &["session", "example"]);
    assert_eq!(code, 0, "session example failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("example JSON");
    assert!(parsed["steps"].as_array().map(|s| !s.is_empty()).unwrap_or(false));
}

#[test]
fn test_session_simulate_example() {
    let home = scratch_home("session-simulate");
    let (example, _, code) = run_cli(&home, &["session", "example"]);
    assert_eq!(code, 0);

    let scenario_path = home.join("scenario.json");
    std::fs::write(&scenario_path, example).unwrap();

    let (stdout, _, code) = run_cli(
        &home,
        &["session", "simulate", scenario_path.to_str().unwrap()],
    );
    assert_eq!(code, 0, "session simulate failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let events = parsed["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["type"] == "SessionStarted"));
    assert!(events.iter().any(|e| e["type"] == "ExitIntentFired"));
    assert!(events.iter().any(|e| e["type"] == "SessionEnded"));
    // The example's exit intent shows a surface, which records a view.
    assert!(!parsed["interactions"].as_array().unwrap().is_empty());
}

#[test]
fn test_session_simulate_events_only() {
    let home = scratch_home("session-events-only");
    let (example, _, _) = run_cli(&home, &["session", "example"]);
    let scenario_path = home.join("scenario.json");
    std::fs::write(&scenario_path, example).unwrap();

    let (stdout, _, code) = run_cli(
        &home,
        &[
            "session",
            "simulate",
            scenario_path.to_str().unwrap(),
            "--events-only",
        ],
    );
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(parsed.is_array());
}

#[test]
fn test_telemetry_summary_empty_archive() {
    let home = scratch_home("telemetry-summary");
    let (stdout, _, code) = run_cli(&home, &["telemetry", "summary"]);
    assert_eq!(code, 0, "telemetry summary failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["views"].as_u64(), Some(0));
}

#[test]
fn test_telemetry_triggers_empty_archive() {
    let home = scratch_home("telemetry-triggers");
    let (stdout, _, code) = run_cli(&home, &["telemetry", "triggers"]);
    assert_eq!(code, 0, "telemetry triggers failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed.as_array().map(|a| a.len()), Some(0));
}

#[test]
fn test_completions_generate() {
    let home = scratch_home("completions");
    let (stdout, _, code) = run_cli(&home, &["completions", "bash"]);
    assert_eq!(code, 0, "completions failed");
    assert!(stdout.contains("nudgekit-cli"));
}
