//! Ordered, append-only registry of migration units.
//!
//! The registry is the total execution order for the lifetime of a
//! deployment. It is built once at start-up through [`RegistryBuilder`];
//! nothing is discovered at runtime, so the order is whatever the code (or
//! `docshift.yml`) declares.

use crate::error::{MigrationError, MigrationResult};
use crate::record::MigrationRecord;
use crate::unit::MigrationUnit;
use ds_core::{MigrationName, SequenceNumber};
use std::collections::HashSet;

/// Creates a fresh unit instance for each run.
pub type UnitFactory = Box<dyn Fn() -> Box<dyn MigrationUnit> + Send + Sync>;

/// Erase a concrete unit constructor into a [`UnitFactory`].
pub fn boxed_factory<F, U>(factory: F) -> UnitFactory
where
    F: Fn() -> U + Send + Sync + 'static,
    U: MigrationUnit + 'static,
{
    Box::new(move || Box::new(factory()) as Box<dyn MigrationUnit>)
}

/// One registered unit
pub struct RegistryEntry {
    record: MigrationRecord,
    factory: UnitFactory,
}

impl RegistryEntry {
    pub fn record(&self) -> &MigrationRecord {
        &self.record
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        self.record.sequence_number
    }

    pub fn name(&self) -> &MigrationName {
        &self.record.name
    }

    pub fn instantiate(&self) -> Box<dyn MigrationUnit> {
        (self.factory)()
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

/// Validated, immutable list of units in ascending sequence order.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    entries: Vec<RegistryEntry>,
}

impl MigrationRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> Vec<MigrationRecord> {
        self.entries.iter().map(|e| e.record.clone()).collect()
    }

    /// Highest registered sequence number
    pub fn latest(&self) -> Option<SequenceNumber> {
        self.entries.last().map(RegistryEntry::sequence_number)
    }

    /// Entries strictly after `last_applied`, in ascending order.
    ///
    /// Gaps in numbering are fine; every entry above the checkpoint is
    /// returned.
    pub fn pending_from(&self, last_applied: SequenceNumber) -> &[RegistryEntry] {
        let start = self
            .entries
            .partition_point(|e| e.sequence_number() <= last_applied);
        &self.entries[start..]
    }
}

/// Collects registrations and validates them all at [`build`](Self::build).
#[derive(Default)]
pub struct RegistryBuilder {
    pending: Vec<(u32, String, UnitFactory)>,
}

impl RegistryBuilder {
    /// Register a unit type built by `factory`.
    pub fn register<F, U>(self, sequence: u32, name: &str, factory: F) -> Self
    where
        F: Fn() -> U + Send + Sync + 'static,
        U: MigrationUnit + 'static,
    {
        self.register_boxed(sequence, name, boxed_factory(factory))
    }

    pub fn register_boxed(mut self, sequence: u32, name: &str, factory: UnitFactory) -> Self {
        self.pending.push((sequence, name.to_string(), factory));
        self
    }

    /// Validate the registrations in declaration order.
    ///
    /// Sequence numbers must start above zero and strictly increase; names
    /// must be non-empty, free of whitespace and unique.
    pub fn build(self) -> MigrationResult<MigrationRegistry> {
        let mut entries = Vec::with_capacity(self.pending.len());
        let mut names = HashSet::new();
        let mut previous = SequenceNumber::ZERO;

        for (sequence, name, factory) in self.pending {
            let sequence = SequenceNumber::new(sequence);
            if sequence <= previous {
                return Err(MigrationError::Registry {
                    message: format!(
                        "'{name}' has sequence number {sequence}, which must be greater than {previous}"
                    ),
                });
            }
            let name = MigrationName::parse(name.as_str()).map_err(|reason| {
                MigrationError::Registry {
                    message: format!("invalid name for {sequence}: {reason}"),
                }
            })?;
            if !names.insert(name.to_string()) {
                return Err(MigrationError::Registry {
                    message: format!("name '{name}' is registered twice"),
                });
            }
            previous = sequence;
            entries.push(RegistryEntry {
                record: MigrationRecord::new(sequence, name),
                factory,
            });
        }

        Ok(MigrationRegistry { entries })
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
