//! Checkpointed migration runner.
//!
//! The runner reads the checkpoint, works out which registered units are
//! pending and applies them one at a time in sequence order:
//!
//! ```text
//! Idle -> Loading -> Applying(i) -> Checkpointing(i) -> Applying(i+1) -> ... -> Done
//!                    Applying(i) -> Failed(i)
//!                    (between units) -> Cancelled
//! ```
//!
//! The checkpoint is written after every unit that succeeds while all
//! earlier units in the run also succeeded. Under [`FailurePolicy::Continue`]
//! a failed unit freezes the checkpoint, so units after it are applied but
//! attempted again on the next start. A checkpoint that cannot be written
//! always ends the run. A unit that panics is caught and reported as failed
//! like any other unit error.

use crate::error::{MigrationError, MigrationResult};
use crate::record::MigrationRecord;
use crate::registry::{MigrationRegistry, RegistryEntry};
use crate::report::{RunReport, RunStatus};
use crate::status::{DocumentStatusStore, StatusStore};
use crate::unit::MigrationContext;
use chrono::{DateTime, Utc};
use ds_core::{CollectionName, Config, FailurePolicy, SequenceNumber};
use ds_store::DocumentStore;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Documents per cursor batch when not configured
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Collection holding the checkpoint when not configured
pub const DEFAULT_STATUS_COLLECTION: &str = "_migration_status";

/// Where the runner is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Loading,
    Applying(SequenceNumber),
    Checkpointing(SequenceNumber),
    Done,
    Failed(SequenceNumber),
    Cancelled,
}

/// Checkpoint and pending units, without applying anything
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub last_applied: SequenceNumber,
    pub updated_at: Option<DateTime<Utc>>,
    pub latest_registered: Option<SequenceNumber>,
    pub pending: Vec<MigrationRecord>,
}

impl StatusReport {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

pub struct MigrationRunner {
    registry: MigrationRegistry,
    store: Arc<dyn DocumentStore>,
    status: Box<dyn StatusStore>,
    policy: FailurePolicy,
    batch_size: usize,
    cancel: Arc<AtomicBool>,
    state: RunnerState,
}

fn transition(state: &mut RunnerState, next: RunnerState) {
    log::debug!("Runner state {state:?} -> {next:?}");
    *state = next;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn skip_rest(report: &mut RunReport, rest: &[RegistryEntry], reason: &str) {
    for entry in rest {
        log::warn!("Skipping migration {}: {reason}", entry.record());
        report.record_skipped(entry.record(), reason);
    }
}

impl MigrationRunner {
    /// Runner with the checkpoint kept in `_migration_status` of `store`
    pub fn new(registry: MigrationRegistry, store: Arc<dyn DocumentStore>) -> Self {
        let status = DocumentStatusStore::new(
            Arc::clone(&store),
            CollectionName::new(DEFAULT_STATUS_COLLECTION),
        );
        Self {
            registry,
            store,
            status: Box::new(status),
            policy: FailurePolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: Arc::new(AtomicBool::new(false)),
            state: RunnerState::Idle,
        }
    }

    /// Runner configured from `docshift.yml` settings
    pub fn from_config(
        config: &Config,
        registry: MigrationRegistry,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self::new(registry, store)
            .with_status_collection(config.status_collection.clone())
            .with_policy(config.failure_policy)
            .with_batch_size(config.batch_size)
    }

    pub fn with_status_collection(mut self, collection: CollectionName) -> Self {
        self.status = Box::new(DocumentStatusStore::new(Arc::clone(&self.store), collection));
        self
    }

    pub fn with_status_store(mut self, status: Box<dyn StatusStore>) -> Self {
        self.status = status;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Share an externally owned cancellation flag (e.g. set from Ctrl-C)
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Read the checkpoint and list pending units.
    pub async fn status(&self) -> MigrationResult<StatusReport> {
        let status = self.status.load().await?;
        let pending = self
            .registry
            .pending_from(status.last_applied_sequence_number)
            .iter()
            .map(|e| e.record().clone())
            .collect();
        Ok(StatusReport {
            last_applied: status.last_applied_sequence_number,
            updated_at: status.updated_at,
            latest_registered: self.registry.latest(),
            pending,
        })
    }

    /// Apply every pending unit and return the run report.
    ///
    /// Unit failures and checkpoint write failures are reported through the
    /// returned report's status; `Err` means the checkpoint could not be read
    /// and nothing was attempted.
    pub async fn run(&mut self) -> MigrationResult<RunReport> {
        transition(&mut self.state, RunnerState::Loading);
        let status = match self.status.load().await {
            Ok(status) => status,
            Err(e) => {
                transition(&mut self.state, RunnerState::Idle);
                return Err(e.into());
            }
        };
        let initial = status.last_applied_sequence_number;
        if self.registry.latest().is_some_and(|latest| latest < initial) {
            log::warn!(
                "Checkpoint {initial} is ahead of the newest registered migration; nothing to do"
            );
        }

        let pending = self.registry.pending_from(initial);
        log::info!(
            "{} pending migration(s) after checkpoint {initial} (policy: {})",
            pending.len(),
            self.policy
        );

        let ctx = MigrationContext::new(Arc::clone(&self.store), self.batch_size)
            .with_cancel_flag(Arc::clone(&self.cancel));
        let mut report = RunReport::new(self.policy, initial);
        let mut checkpoint = initial;
        let mut contiguous = true;
        let mut first_failure: Option<SequenceNumber> = None;
        let mut stopped: Option<RunStatus> = None;

        for (i, entry) in pending.iter().enumerate() {
            let record = entry.record();
            let sequence = record.sequence_number;

            if self.cancel.load(Ordering::SeqCst) {
                log::warn!("Cancellation requested before {record}");
                skip_rest(&mut report, &pending[i..], "cancelled");
                stopped = Some(RunStatus::Cancelled);
                break;
            }

            transition(&mut self.state, RunnerState::Applying(sequence));
            log::info!("Applying migration {record}");
            let started = Instant::now();
            let result = AssertUnwindSafe(async { entry.instantiate().apply(&ctx).await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(MigrationError::unit_logic(format!(
                        "unit panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(summary) => {
                    log::info!("Applied migration {record} in {duration_ms}ms: {summary}");
                    report.record_applied(record, summary, duration_ms);
                    if !contiguous {
                        log::debug!("Checkpoint held at {checkpoint} after an earlier failure");
                        continue;
                    }
                    transition(&mut self.state, RunnerState::Checkpointing(sequence));
                    if let Err(source) = self.status.save(sequence).await {
                        let err = MigrationError::CheckpointPersist { sequence, source };
                        log::error!("Migration {record} applied but {err}");
                        report.error = Some(err.to_string());
                        skip_rest(&mut report, &pending[i + 1..], "checkpoint not persisted");
                        first_failure = Some(sequence);
                        stopped = Some(RunStatus::Failed);
                        break;
                    }
                    checkpoint = sequence;
                }
                Err(err) => {
                    log::error!(
                        "Migration {} '{}' failed ({}): {err}",
                        sequence,
                        record.name,
                        err.kind()
                    );
                    report.record_failed(record, &err, duration_ms);
                    first_failure.get_or_insert(sequence);
                    contiguous = false;
                    if self.policy == FailurePolicy::Halt {
                        let reason = format!("halted after {sequence} failed");
                        skip_rest(&mut report, &pending[i + 1..], &reason);
                        stopped = Some(RunStatus::Failed);
                        break;
                    }
                }
            }
        }

        let run_status = stopped.unwrap_or(if first_failure.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        });
        let final_state = match (run_status, first_failure) {
            (RunStatus::Cancelled, _) => RunnerState::Cancelled,
            (_, Some(failed)) => RunnerState::Failed(failed),
            _ => RunnerState::Done,
        };
        transition(&mut self.state, final_state);
        report.finish(run_status, checkpoint);

        log::info!(
            "Migration run {} {}: {} (checkpoint {})",
            report.run_id,
            run_status,
            report.summary(),
            checkpoint
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
