//! Reusable migration units.
//!
//! Almost every concrete migration is one of these, configured with the
//! collection and fields it touches. Each template is idempotent: running it
//! again over already-migrated data changes nothing.

pub mod add_field;
pub mod backfill;
pub mod rename_discriminator;
pub mod structural;

pub use add_field::{AddFieldIfAbsent, ValueProvider};
pub use backfill::BackfillFromParent;
pub use rename_discriminator::RenameDiscriminator;
pub use structural::{DropCollection, DropIndex, RemoveField, RenameCollection, RenameField};

use crate::error::{MigrationError, MigrationResult};
use ds_core::{CollectionName, Document, DocumentExt};

/// `_id` of a document returned by a cursor
fn document_id<'a>(collection: &CollectionName, doc: &'a Document) -> MigrationResult<&'a str> {
    doc.id().ok_or_else(|| {
        MigrationError::unit_logic(format!("document in '{collection}' has no string _id"))
    })
}
