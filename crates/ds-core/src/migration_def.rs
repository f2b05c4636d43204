//! Declarative migration definitions.
//!
//! Most migration units are plain instances of a handful of templates, so they
//! can be declared as data in `docshift.yml` instead of code:
//!
//! ```yaml
//! migrations:
//!   - sequence: 3
//!     name: backfill_account_id
//!     kind: backfill_from_parent
//!     collection: infrastructureDefinitions
//!     foreign_key: appId
//!     parent_collection: apps
//!     parent_key: _id
//!     target_field: accountId
//! ```

use crate::document::FieldPath;
use crate::names::{CollectionName, IndexName, MigrationName};
use crate::sequence::SequenceNumber;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One registered migration: its position, stable name and what it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationDef {
    pub sequence: SequenceNumber,
    pub name: MigrationName,
    #[serde(flatten)]
    pub step: MigrationStep,
}

/// The operation a declarative migration performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationStep {
    /// Set `field` to a constant on every document that lacks it
    AddField {
        collection: CollectionName,
        field: FieldPath,
        value: Value,
    },

    /// Copy a value from a parent document onto children that lack it
    BackfillFromParent {
        collection: CollectionName,
        foreign_key: FieldPath,
        parent_collection: CollectionName,
        parent_key: FieldPath,
        target_field: FieldPath,
        /// Field read from the parent; defaults to `target_field`
        #[serde(default)]
        parent_field: Option<FieldPath>,
    },

    /// Rewrite a type discriminator, optionally with its class-name twin
    RenameDiscriminator {
        collection: CollectionName,
        discriminator_field: FieldPath,
        from: String,
        to: String,
        #[serde(default)]
        class_name: Option<ClassNameRename>,
    },

    RenameField {
        collection: CollectionName,
        from: FieldPath,
        to: FieldPath,
    },

    RemoveField {
        collection: CollectionName,
        field: FieldPath,
    },

    DropCollection {
        collection: CollectionName,
    },

    RenameCollection {
        from: CollectionName,
        to: CollectionName,
    },

    DropIndex {
        collection: CollectionName,
        index: IndexName,
    },
}

/// Class-name field rewritten together with a discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNameRename {
    pub field: FieldPath,
    pub from: String,
    pub to: String,
}

impl MigrationStep {
    /// Short identifier of the step kind, as written in YAML.
    pub fn kind(&self) -> &'static str {
        match self {
            MigrationStep::AddField { .. } => "add_field",
            MigrationStep::BackfillFromParent { .. } => "backfill_from_parent",
            MigrationStep::RenameDiscriminator { .. } => "rename_discriminator",
            MigrationStep::RenameField { .. } => "rename_field",
            MigrationStep::RemoveField { .. } => "remove_field",
            MigrationStep::DropCollection { .. } => "drop_collection",
            MigrationStep::RenameCollection { .. } => "rename_collection",
            MigrationStep::DropIndex { .. } => "drop_index",
        }
    }
}
