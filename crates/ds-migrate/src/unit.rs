//! The migration unit contract and the context units run in.

use crate::cursor::ScopedCursor;
use crate::error::MigrationResult;
use async_trait::async_trait;
use ds_core::{CollectionName, Filter};
use ds_store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Collaborators handed to every unit by the runner.
#[derive(Clone)]
pub struct MigrationContext {
    store: Arc<dyn DocumentStore>,
    batch_size: usize,
    cancel: Arc<AtomicBool>,
}

impl MigrationContext {
    pub fn new(store: Arc<dyn DocumentStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Whether cancellation has been requested. Units may check it, but the
    /// runner only acts on it between units.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Open a scoped cursor with the context's batch size.
    pub async fn cursor(
        &self,
        collection: &CollectionName,
        filter: &Filter,
    ) -> MigrationResult<ScopedCursor> {
        ScopedCursor::open(self.store(), collection, filter, self.batch_size).await
    }
}

/// Named counters reported by a unit, e.g. `{scanned: 3, updated: 2}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitSummary {
    counters: BTreeMap<String, u64>,
}

impl UnitSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style counter initialisation
    pub fn with(mut self, name: &str, value: u64) -> Self {
        self.counters.insert(name.to_string(), value);
        self
    }

    pub fn incr(&mut self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &str, value: u64) {
        *self.counters.entry(name.to_string()).or_insert(0) += value;
    }

    /// Counter value; missing counters read as zero
    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn counters(&self) -> &BTreeMap<String, u64> {
        &self.counters
    }
}

impl fmt::Display for UnitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counters.is_empty() {
            return write!(f, "no changes");
        }
        for (i, (name, value)) in self.counters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// A single migration operation.
///
/// Units must be idempotent: a crash between a unit finishing and its
/// checkpoint being written re-runs it on the next start. Failures are
/// returned; the runner decides what happens next.
#[async_trait]
pub trait MigrationUnit: Send + Sync {
    async fn apply(&self, ctx: &MigrationContext) -> MigrationResult<UnitSummary>;
}
