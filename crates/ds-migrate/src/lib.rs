//! ds-migrate - Migration engine for Docshift
//!
//! Applies an ordered, append-only list of migration units to a document
//! store exactly once per deployment. The pieces, leaf first:
//!
//! - [`ScopedCursor`]: bounded-memory iteration with guaranteed release
//! - [`MigrationUnit`]: the contract every unit implements
//! - [`templates`]: the reusable units most migrations are instances of
//! - [`MigrationRegistry`]: the total execution order
//! - [`StatusStore`]: the persisted checkpoint
//! - [`MigrationRunner`]: applies pending units and returns a [`RunReport`]

pub mod cursor;
pub mod declarative;
pub mod error;
pub mod record;
pub mod registry;
pub mod report;
pub mod runner;
pub mod status;
pub mod templates;
pub mod unit;

pub use cursor::ScopedCursor;
pub use declarative::registry_from_defs;
pub use error::{ErrorKind, MigrationError, MigrationResult};
pub use record::MigrationRecord;
pub use registry::{MigrationRegistry, RegistryBuilder, RegistryEntry, UnitFactory};
pub use report::{Outcome, ReportEntry, RunReport, RunStatus, RunSummary};
pub use runner::{MigrationRunner, RunnerState, StatusReport};
pub use status::{DocumentStatusStore, MigrationStatus, StatusStore};
pub use unit::{MigrationContext, MigrationUnit, UnitSummary};
