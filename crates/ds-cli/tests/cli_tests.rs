//! End-to-end tests for the `docshift` binary
//!
//! Each test writes a docshift.yml pointing at a DuckDB file in a temp
//! directory, seeds documents through the store API, then drives the CLI.

use ds_core::{document, CollectionName, Config, Filter};
use serde_json::{json, Value};
use std::path::Path;
use std::process::Command;

/// Path to the compiled docshift binary
fn docshift_bin() -> String {
    env!("CARGO_BIN_EXE_docshift").to_string()
}

/// Run a `docshift` command and return (stdout, stderr, exit code).
fn run_docshift(args: &[&str]) -> (String, String, Option<i32>) {
    let output = Command::new(docshift_bin())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to execute docshift with args {:?}: {}", args, e));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code(),
    )
}

const CONFIG: &str = r#"
name: platform
store:
  type: duckdb
  path: PLACEHOLDER
batch_size: 2
migrations:
  - sequence: 1
    name: add_disabled_to_users
    kind: add_field
    collection: users
    field: disabled
    value: false
  - sequence: 2
    name: archive_legacy_users
    kind: rename_collection
    from: legacyUsers
    to: archivedUsers
"#;

/// Write the config into `dir` and seed the store it points at
async fn setup(dir: &Path, collections: &[(&str, Vec<Value>)]) {
    let db_path = dir.join("platform.duckdb");
    let yaml = CONFIG.replace("PLACEHOLDER", &db_path.display().to_string());
    std::fs::write(dir.join("docshift.yml"), yaml).unwrap();

    let config = Config::load_from_dir(dir).unwrap();
    let store = ds_store::connect(&config.store).unwrap();
    for (collection, docs) in collections {
        let name = CollectionName::new(*collection);
        for doc in docs {
            store.insert_one(&name, document(doc.clone())).await.unwrap();
        }
    }
}

#[tokio::test]
async fn test_migrate_then_status_and_list() {
    let dir = tempfile::tempdir().unwrap();
    setup(
        dir.path(),
        &[
            ("users", vec![json!({ "_id": "u1" }), json!({ "_id": "u2", "disabled": true })]),
            ("legacyUsers", vec![json!({ "_id": "l1" })]),
        ],
    )
    .await;
    let project = dir.path().to_str().unwrap();
    let report_path = dir.path().join("run.json");

    let (stdout, stderr, code) = run_docshift(&[
        "-p",
        project,
        "migrate",
        "--report",
        report_path.to_str().unwrap(),
    ]);
    assert_eq!(code, Some(0), "stdout: {stdout}\nstderr: {stderr}");
    assert!(stdout.contains("add_disabled_to_users"));
    assert!(stdout.contains("Checkpoint: v000 -> v002"));

    let report: Value = serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap())
        .unwrap();
    assert_eq!(report["status"], "completed");
    assert_eq!(report["finalCheckpoint"], 2);
    assert_eq!(report["entries"][0]["counters"]["updated"], 1);

    let (stdout, _, code) = run_docshift(&["-p", project, "status", "-o", "json"]);
    assert_eq!(code, Some(0));
    let status: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["lastAppliedSequenceNumber"], 2);
    assert_eq!(status["upToDate"], true);

    let (stdout, _, code) = run_docshift(&["-p", project, "list", "-o", "json"]);
    assert_eq!(code, Some(0));
    let list: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(list.as_array().unwrap().len(), 2);
    assert_eq!(list[1]["kind"], "rename_collection");
    assert_eq!(list[1]["applied"], true);

    // Second run has nothing to do
    let (stdout, _, code) = run_docshift(&["-p", project, "migrate"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("Nothing to apply"));
}

#[tokio::test]
async fn test_failed_run_exits_nonzero_and_keeps_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    // Both collections present: the rename refuses to clobber the target
    setup(
        dir.path(),
        &[
            ("users", vec![json!({ "_id": "u1" })]),
            ("legacyUsers", vec![json!({ "_id": "l1" })]),
            ("archivedUsers", vec![json!({ "_id": "a1" })]),
        ],
    )
    .await;
    let project = dir.path().to_str().unwrap();

    let (stdout, stderr, code) = run_docshift(&["-p", project, "migrate"]);
    assert_eq!(code, Some(1), "stdout: {stdout}\nstderr: {stderr}");
    assert!(stdout.contains("failed"));

    let (stdout, _, code) = run_docshift(&["-p", project, "status", "-o", "json"]);
    assert_eq!(code, Some(0));
    let status: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["lastAppliedSequenceNumber"], 1);
    assert_eq!(status["pending"][0]["name"], "archive_legacy_users");

    let config = Config::load_from_dir(dir.path()).unwrap();
    let store = ds_store::connect(&config.store).unwrap();
    let users = store
        .count(&CollectionName::new("users"), &Filter::All)
        .await
        .unwrap();
    assert_eq!(users, 1);
}

#[test]
fn test_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_docshift(&["-p", dir.path().to_str().unwrap(), "status"]);
    assert_ne!(code, Some(0));
    assert!(stderr.contains("Failed to load project configuration"));
}
