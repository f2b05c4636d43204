//! Identity of a registered migration unit

use ds_core::{MigrationName, SequenceNumber};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `{sequenceNumber, name}` of a registered unit. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub sequence_number: SequenceNumber,
    pub name: MigrationName,
}

impl MigrationRecord {
    pub fn new(sequence_number: SequenceNumber, name: MigrationName) -> Self {
        Self {
            sequence_number,
            name,
        }
    }
}

impl fmt::Display for MigrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sequence_number, self.name)
    }
}
