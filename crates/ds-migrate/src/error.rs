//! Error types for ds-migrate

use ds_core::SequenceNumber;
use ds_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad class of a migration failure, used in logs and run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A store read or write failed
    TransientStore,
    /// A unit's own precondition or data check failed
    UnitLogic,
    /// The status write failed after a unit succeeded
    CheckpointPersist,
    /// The registry is malformed
    Registry,
    /// A declarative migration could not be built
    Configuration,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::TransientStore => "transient_store",
            ErrorKind::UnitLogic => "unit_logic",
            ErrorKind::CheckpointPersist => "checkpoint_persist",
            ErrorKind::Registry => "registry",
            ErrorKind::Configuration => "configuration",
        };
        write!(f, "{s}")
    }
}

/// Migration engine errors
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Store operation failed (MG001)
    #[error("[MG001] Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Unit precondition failed (MG002)
    #[error("[MG002] Migration precondition failed: {message}")]
    UnitLogic { message: String },

    /// Checkpoint could not be written (MG003)
    #[error("[MG003] Failed to persist checkpoint {sequence}: {source}")]
    CheckpointPersist {
        sequence: SequenceNumber,
        source: StoreError,
    },

    /// Invalid registration (MG004)
    #[error("[MG004] Invalid migration registry: {message}")]
    Registry { message: String },

    /// Invalid declarative migration (MG005)
    #[error("[MG005] Invalid migration '{name}': {message}")]
    Configuration { name: String, message: String },
}

impl MigrationError {
    pub fn unit_logic(message: impl Into<String>) -> Self {
        MigrationError::UnitLogic {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            // Retrying cannot help: the data or the naming conflicts with the unit
            MigrationError::Store(
                StoreError::UpdateRejected(_) | StoreError::CollectionCaseConflict { .. },
            ) => ErrorKind::UnitLogic,
            MigrationError::Store(_) => ErrorKind::TransientStore,
            MigrationError::UnitLogic { .. } => ErrorKind::UnitLogic,
            MigrationError::CheckpointPersist { .. } => ErrorKind::CheckpointPersist,
            MigrationError::Registry { .. } => ErrorKind::Registry,
            MigrationError::Configuration { .. } => ErrorKind::Configuration,
        }
    }
}

/// Result type alias for MigrationError
pub type MigrationResult<T> = Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::CoreError;

    #[test]
    fn test_kind_classification() {
        let store = MigrationError::from(StoreError::ExecutionError("timeout".into()));
        assert_eq!(store.kind(), ErrorKind::TransientStore);

        let rejected = MigrationError::from(StoreError::UpdateRejected(CoreError::PathConflict {
            path: "spec.className".into(),
            segment: "spec".into(),
        }));
        assert_eq!(rejected.kind(), ErrorKind::UnitLogic);

        let clash = MigrationError::from(StoreError::CollectionCaseConflict {
            requested: "Users".into(),
            existing: "users".into(),
        });
        assert_eq!(clash.kind(), ErrorKind::UnitLogic);

        let persist = MigrationError::CheckpointPersist {
            sequence: SequenceNumber::new(2),
            source: StoreError::ExecutionError("disk full".into()),
        };
        assert_eq!(persist.kind(), ErrorKind::CheckpointPersist);
        assert!(persist.to_string().starts_with("[MG003]"));
        assert!(persist.to_string().contains("v002"));
    }
}
