//! Basic CLI E2E tests.
//!
//! Tests run the built `caffy` binary against a temporary data directory.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_caffy"))
        .env("CAFFY_DATA_DIR", data_dir)
        .env_remove("CAFFY_LOG")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let (stdout, stderr, code) = run_cli(data_dir, &full);
    assert_eq!(code, 0, "command {args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_intake_add_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    let event = run_json(
        path,
        &["intake", "add", "100", "--label", "coffee", "--at", "2026-05-01T08:00:00Z"],
    );
    assert_eq!(event["amount_mg"], 100.0);
    assert_eq!(event["label"], "coffee");

    let status = run_json(path, &["status", "--at", "2026-05-01T13:45:00Z"]);
    assert_eq!(status["remaining_mg"], 50.0);
    assert_eq!(status["half_life_hours"], 5.0);
    assert_eq!(status["level"], "faded");
}

#[test]
fn test_intake_update_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    let event = run_json(path, &["intake", "add", "150", "--at", "2026-05-01T08:00:00Z"]);
    let id = event["id"].as_i64().unwrap().to_string();

    let updated = run_json(path, &["intake", "update", &id, "--percent", "50"]);
    assert_eq!(updated["amount_mg"], 75.0);

    let (_, _, code) = run_cli(path, &["intake", "delete", &id]);
    assert_eq!(code, 0);
    let (_, stderr, code) = run_cli(path, &["intake", "delete", &id]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_intake_add_rejects_zero_amount() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["intake", "add", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));
}

#[test]
fn test_feedback_requires_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    let (_, stderr, code) = run_cli(path, &["feedback", "3"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("user profile not found"));

    run_json(path, &["profile", "set", "--metabolism", "slow", "--body-mass", "80"]);
    let profile = run_json(path, &["profile", "show"]);
    assert_eq!(profile["metabolism"], "slow");
    assert_eq!(profile["body_mass_kg"], 80.0);

    run_json(path, &["intake", "add", "200", "--at", "2026-05-01T08:00:00Z"]);
    let outcome = run_json(path, &["feedback", "5", "--at", "2026-05-01T10:00:00Z"]);
    assert_eq!(outcome["learning"]["reason"], "realtime_feedback");

    let stats = run_json(path, &["learn", "stats"]);
    assert_eq!(stats["total_feedback_count"], 1);
    assert_eq!(stats["phase"], "personalizing");
}

#[test]
fn test_feedback_rejects_level_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();
    run_json(path, &["profile", "set"]);
    let (_, stderr, code) = run_cli(path, &["feedback", "7"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("between 1 and 5"));
}

#[test]
fn test_learn_train_without_feedback_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();
    run_json(path, &["profile", "set"]);
    let result = run_json(path, &["learn", "train"]);
    assert!(result.is_null());
}

#[test]
fn test_graph_and_predict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();
    run_json(path, &["intake", "add", "80", "--at", "2026-05-01T08:00:00Z"]);

    let points = run_json(
        path,
        &["graph", "--days", "1", "--interval", "60", "--at", "2026-05-01T08:00:00Z"],
    );
    assert_eq!(points.as_array().unwrap().len(), 37);

    let prediction = run_json(path, &["predict", "--hours", "6", "--at", "2026-05-01T09:00:00Z"]);
    assert_eq!(prediction["points"].as_array().unwrap().len(), 7);
}

#[test]
fn test_graph_rejects_oversized_window() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["graph", "--days", "4294967295"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("window_days"));

    let (_, stderr, code) = run_cli(dir.path(), &["intake", "list", "--days", "4000"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("between 1 and 3650"));
}

#[test]
fn test_budget() {
    let dir = tempfile::tempdir().unwrap();
    let budget = run_json(
        dir.path(),
        &["budget", "--hours", "5", "--at", "2026-05-01T08:00:00Z"],
    );
    assert_eq!(budget["max_additional_mg"], 100.0);
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    let (stdout, _, code) = run_cli(path, &["config", "get", "display.view_period_days"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "7");

    let (_, _, code) = run_cli(path, &["config", "set", "model.sleep_threshold_mg", "40"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(path, &["config", "get", "model.sleep_threshold_mg"]);
    assert_eq!(stdout.trim(), "40.0");

    let (_, _, code) = run_cli(path, &["config", "set", "model.unknown", "1"]);
    assert_eq!(code, 1);

    let (_, _, code) = run_cli(path, &["config", "reset"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(path, &["config", "get", "model.sleep_threshold_mg"]);
    assert_eq!(stdout.trim(), "50.0");
}

#[test]
fn test_completions() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("caffy"));
}
