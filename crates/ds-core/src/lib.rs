//! ds-core - Core library for Docshift
//!
//! This crate provides the shared vocabulary used across all Docshift
//! components: validated names, sequence numbers, schemaless documents with
//! dotted field paths, store-neutral filters and updates, and the
//! `docshift.yml` configuration including declarative migration definitions.

pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod migration_def;
pub mod names;
mod newtype_string;
pub mod sequence;
pub mod update;

pub use config::{Config, FailurePolicy, StoreConfig, StoreType};
pub use document::{document, Document, DocumentExt, FieldPath, ID_FIELD};
pub use error::{CoreError, CoreResult};
pub use filter::Filter;
pub use migration_def::{ClassNameRename, MigrationDef, MigrationStep};
pub use names::{CollectionName, IndexName, MigrationName};
pub use sequence::SequenceNumber;
pub use update::{Update, UpdateOp};
