use super::*;
use ds_store::StoreError;
use tempfile::tempdir;

fn record(seq: u32, name: &str) -> MigrationRecord {
    MigrationRecord::new(SequenceNumber::new(seq), MigrationName::new(name))
}

fn sample() -> RunReport {
    let mut report = RunReport::new(FailurePolicy::Continue, SequenceNumber::new(1));
    report.record_applied(
        &record(2, "add_disabled_to_users"),
        UnitSummary::new().with("scanned", 3).with("updated", 3),
        120,
    );
    report.record_failed(
        &record(3, "backfill_account_id"),
        &MigrationError::Store(StoreError::ExecutionError("connection reset".into())),
        30,
    );
    report.record_skipped(&record(4, "rename_setup_class"), "cancelled");
    report.finish(RunStatus::Failed, SequenceNumber::new(2));
    report
}

#[test]
fn test_new_report_is_running() {
    let report = RunReport::new(FailurePolicy::Halt, SequenceNumber::ZERO);
    assert_eq!(report.status, RunStatus::Running);
    assert_eq!(report.run_id.len(), 8);
    assert!(report.entries.is_empty());
    assert!(report.finished_at.is_none());
}

#[test]
fn test_summary() {
    let summary = sample().summary();
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.total_duration_ms, 150);
    assert_eq!(summary.to_string(), "1 applied, 1 failed, 1 skipped in 150ms");
}

#[test]
fn test_entries_carry_detail() {
    let report = sample();
    assert_eq!(report.entries[0].detail, "scanned=3, updated=3");
    assert_eq!(report.entries[1].error_kind, Some(ErrorKind::TransientStore));
    assert!(report.entries[1].detail.contains("connection reset"));
    assert_eq!(report.entries[2].outcome, Outcome::Skipped);
    assert!(!report.is_success());
}

#[test]
fn test_json_shape() {
    let value = serde_json::to_value(sample()).unwrap();
    assert_eq!(value["status"], "failed");
    assert_eq!(value["failurePolicy"], "continue");
    assert_eq!(value["initialCheckpoint"], 1);
    assert_eq!(value["finalCheckpoint"], 2);

    let first = &value["entries"][0];
    assert_eq!(first["sequenceNumber"], 2);
    assert_eq!(first["name"], "add_disabled_to_users");
    assert_eq!(first["outcome"], "applied");
    assert_eq!(first["durationMs"], 120);
    assert_eq!(first["counters"]["updated"], 3);
    assert!(first.get("errorKind").is_none());

    assert_eq!(value["entries"][1]["errorKind"], "transient_store");
}

#[test]
fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reports").join("run.json");

    let report = sample();
    report.save(&path).unwrap();
    assert!(!path.with_extension("json.tmp").exists());

    let loaded = RunReport::load(&path).unwrap().unwrap();
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.entries.len(), 3);
    assert_eq!(loaded.status, RunStatus::Failed);
}

#[test]
fn test_load_missing_file() {
    let dir = tempdir().unwrap();
    assert!(RunReport::load(&dir.path().join("absent.json"))
        .unwrap()
        .is_none());
}
