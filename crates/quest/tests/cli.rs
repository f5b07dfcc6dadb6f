use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn quest(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("quest").unwrap();
    cmd.arg("--data-dir")
        .arg(dir)
        .env_remove("RUST_LOG")
        .env_remove("QUEST_DATA_DIR");
    cmd
}

fn json(dir: &Path, args: &[&str]) -> Value {
    let output = quest(dir).arg("--json").args(args).output().unwrap();
    assert!(output.status.success(), "{:?} failed: {}", args, String::from_utf8_lossy(&output.stderr));
    let response: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["ok"], true);
    response["data"].clone()
}

#[test]
fn test_start_advance_complete() {
    let dir = tempdir().unwrap();

    quest(dir.path())
        .args(["start", "q1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Started q1"));

    let status = json(dir.path(), &["status"]);
    assert_eq!(status["activeQuests"]["q1"]["currentStep"], "started");
    assert_eq!(status["trackedQuestId"], "q1");

    quest(dir.path())
        .args(["advance", "q1", "research"])
        .assert()
        .success()
        .stdout(predicate::str::contains("started -> research"));
    quest(dir.path())
        .args(["advance", "q1", "research"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No change"));

    let done = json(dir.path(), &["complete", "q1"]);
    assert_eq!(done["event"]["type"], "quest.completed");
    assert_eq!(done["event"]["step"], "research");

    let status = json(dir.path(), &["status"]);
    assert_eq!(status["completedQuests"], serde_json::json!(["q1"]));
    assert!(status.get("trackedQuestId").is_none());

    let log = json(dir.path(), &["log", "--quest", "q1"]);
    assert_eq!(log["events"].as_array().unwrap().len(), 3);
}

#[test]
fn test_batch_file_is_idempotent() {
    let dir = tempdir().unwrap();
    let batch = dir.path().join("batch.json");
    std::fs::write(&batch, r#"[{"questId": "q2", "currentStep": "exploration"}]"#).unwrap();
    let batch = batch.to_str().unwrap();

    let first = json(dir.path(), &["batch", batch]);
    assert_eq!(first["events"].as_array().unwrap().len(), 1);

    let second = json(dir.path(), &["batch", batch]);
    assert!(second["events"].as_array().unwrap().is_empty());
}

#[test]
fn test_hydrate_and_doctor() {
    let dir = tempdir().unwrap();
    quest(dir.path()).args(["start", "local"]).assert().success();

    let snapshots = dir.path().join("snapshots.json");
    std::fs::write(
        &snapshots,
        r#"[{"id": "q3", "currentStep": "research"},
            {"id": "q4", "currentStep": "completed", "completedAt": 1000}]"#,
    )
    .unwrap();

    let report = json(dir.path(), &["hydrate", snapshots.to_str().unwrap()]);
    assert_eq!(report["active_count"], 1);
    assert_eq!(report["completed_count"], 1);

    let log = json(dir.path(), &["log"]);
    let events = log["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e["context"]["source"] == "server"));

    let projected = json(dir.path(), &["project"]);
    assert_eq!(projected["activeQuests"]["q3"]["currentStep"], "research");

    quest(dir.path())
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] consistency"));
}

#[test]
fn test_log_filters_and_clear() {
    let dir = tempdir().unwrap();
    quest(dir.path()).args(["start", "a"]).assert().success();
    quest(dir.path()).args(["start", "b"]).assert().success();
    quest(dir.path()).args(["advance", "a", "research"]).assert().success();

    let started = json(dir.path(), &["log", "--type", "started"]);
    assert_eq!(started["events"].as_array().unwrap().len(), 2);

    let newest = json(dir.path(), &["log", "--limit", "1"]);
    assert_eq!(newest["events"][0]["type"], "quest.advanced");

    let cleared = json(dir.path(), &["log-clear"]);
    assert_eq!(cleared["cleared"], 3);
    quest(dir.path())
        .arg("log")
        .assert()
        .success()
        .stdout(predicate::str::contains("No events"));
}

#[test]
fn test_players_are_isolated() {
    let dir = tempdir().unwrap();
    quest(dir.path())
        .args(["--player", "alice", "start", "q1"])
        .assert()
        .success();

    let bob = json(dir.path(), &["--player", "bob", "status"]);
    assert!(bob["activeQuests"].as_object().unwrap().is_empty());
}

#[test]
fn test_config_roundtrip() {
    let dir = tempdir().unwrap();
    let saved = json(dir.path(), &["config", "--log-capacity", "2", "--set-player", "carol"]);
    assert_eq!(saved["saved"], true);

    for id in ["a", "b", "c"] {
        quest(dir.path()).args(["start", id]).assert().success();
    }
    let log = json(dir.path(), &["log"]);
    assert_eq!(log["capacity"], 2);
    assert_eq!(log["events"].as_array().unwrap().len(), 2);

    let shown = json(dir.path(), &["config"]);
    assert_eq!(shown["config"]["player"], "carol");
    assert_eq!(shown["saved"], false);
}

#[test]
fn test_error_exit_codes() {
    let dir = tempdir().unwrap();

    quest(dir.path())
        .args(["batch", "missing.json"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not found"));

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{not json").unwrap();
    quest(dir.path())
        .args(["--json", "hydrate", bad.to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("\"invalid_json\""));

    quest(dir.path()).arg("track").assert().code(2);
}
