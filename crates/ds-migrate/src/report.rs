//! Run report returned by the migration runner
//!
//! A report lists every unit the run considered, in order, with its outcome.
//! It can be written to disk as JSON for deployment tooling to pick up.

use crate::error::{ErrorKind, MigrationError};
use crate::record::MigrationRecord;
use crate::unit::UnitSummary;
use chrono::{DateTime, Utc};
use ds_core::{FailurePolicy, MigrationName, SequenceNumber};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use uuid::Uuid;

/// Overall state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run is in progress
    Running,
    /// Every pending unit applied
    Completed,
    /// At least one unit failed, or the checkpoint could not be written
    Failed,
    /// Cancellation was requested between units
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What happened to one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Applied,
    Failed,
    Skipped,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Applied => write!(f, "applied"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Report line for one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub sequence_number: SequenceNumber,
    pub name: MigrationName,
    pub outcome: Outcome,

    /// Unit counters, the error message, or why the unit was skipped
    pub detail: String,

    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<UnitSummary>,
}

/// Result of one runner invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Unique identifier for this run
    pub run_id: String,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    pub status: RunStatus,

    pub failure_policy: FailurePolicy,

    /// Checkpoint read at the start of the run
    pub initial_checkpoint: SequenceNumber,

    /// Checkpoint persisted when the run ended
    pub final_checkpoint: SequenceNumber,

    pub entries: Vec<ReportEntry>,

    /// Run-level failure not tied to a unit's own result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts per outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub applied: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration_ms: u64,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} applied, {} failed, {} skipped in {}ms",
            self.applied, self.failed, self.skipped, self.total_duration_ms
        )
    }
}

impl RunReport {
    pub fn new(failure_policy: FailurePolicy, initial_checkpoint: SequenceNumber) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string()[..8].to_string(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            failure_policy,
            initial_checkpoint,
            final_checkpoint: initial_checkpoint,
            entries: Vec::new(),
            error: None,
        }
    }

    pub fn record_applied(&mut self, record: &MigrationRecord, summary: UnitSummary, duration_ms: u64) {
        self.entries.push(ReportEntry {
            sequence_number: record.sequence_number,
            name: record.name.clone(),
            outcome: Outcome::Applied,
            detail: summary.to_string(),
            duration_ms,
            error_kind: None,
            counters: Some(summary),
        });
    }

    pub fn record_failed(&mut self, record: &MigrationRecord, error: &MigrationError, duration_ms: u64) {
        self.entries.push(ReportEntry {
            sequence_number: record.sequence_number,
            name: record.name.clone(),
            outcome: Outcome::Failed,
            detail: error.to_string(),
            duration_ms,
            error_kind: Some(error.kind()),
            counters: None,
        });
    }

    pub fn record_skipped(&mut self, record: &MigrationRecord, reason: &str) {
        self.entries.push(ReportEntry {
            sequence_number: record.sequence_number,
            name: record.name.clone(),
            outcome: Outcome::Skipped,
            detail: reason.to_string(),
            duration_ms: 0,
            error_kind: None,
            counters: None,
        });
    }

    /// Close the report with its final status and checkpoint
    pub fn finish(&mut self, status: RunStatus, final_checkpoint: SequenceNumber) {
        self.status = status;
        self.final_checkpoint = final_checkpoint;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn entries_with(&self, outcome: Outcome) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(move |e| e.outcome == outcome)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            applied: self.entries_with(Outcome::Applied).count(),
            failed: self.entries_with(Outcome::Failed).count(),
            skipped: self.entries_with(Outcome::Skipped).count(),
            total_duration_ms: self.entries.iter().map(|e| e.duration_ms).sum(),
        }
    }

    /// Load a report from a file path
    pub fn load(path: &Path) -> io::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Save the report as JSON atomically
    ///
    /// Uses write-to-temp-then-rename so readers never see a partial file
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "report_test.rs"]
mod tests;
