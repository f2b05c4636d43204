//! Structural units: field renames and removals, collection and index drops.
//!
//! Each one is safe to re-run; operating on something that is already gone
//! is a no-op rather than an error.

use crate::error::{MigrationError, MigrationResult};
use crate::unit::{MigrationContext, MigrationUnit, UnitSummary};
use async_trait::async_trait;
use ds_core::{CollectionName, FieldPath, Filter, IndexName, Update};

/// Move a field's value to a new path on every document that has it.
///
/// `from` and `to` must not overlap (`a` to `a.b`), or a re-run would nest
/// the value one level deeper each time.
#[derive(Debug, Clone)]
pub struct RenameField {
    pub collection: CollectionName,
    pub from: FieldPath,
    pub to: FieldPath,
}

#[async_trait]
impl MigrationUnit for RenameField {
    async fn apply(&self, ctx: &MigrationContext) -> MigrationResult<UnitSummary> {
        if self.from.overlaps(&self.to) {
            return Err(MigrationError::unit_logic(format!(
                "cannot rename '{}' to '{}': paths overlap",
                self.from, self.to
            )));
        }
        let renamed = ctx
            .store()
            .update_many(
                &self.collection,
                &Filter::exists(&self.from),
                &Update::new().rename(&self.from, &self.to),
            )
            .await?;
        Ok(UnitSummary::new().with("renamed", renamed as u64))
    }
}

/// Remove a field from every document that has it
#[derive(Debug, Clone)]
pub struct RemoveField {
    pub collection: CollectionName,
    pub field: FieldPath,
}

#[async_trait]
impl MigrationUnit for RemoveField {
    async fn apply(&self, ctx: &MigrationContext) -> MigrationResult<UnitSummary> {
        let removed = ctx
            .store()
            .update_many(
                &self.collection,
                &Filter::exists(&self.field),
                &Update::new().unset(&self.field),
            )
            .await?;
        Ok(UnitSummary::new().with("removed", removed as u64))
    }
}

#[derive(Debug, Clone)]
pub struct DropCollection {
    pub collection: CollectionName,
}

#[async_trait]
impl MigrationUnit for DropCollection {
    async fn apply(&self, ctx: &MigrationContext) -> MigrationResult<UnitSummary> {
        let dropped = ctx.store().drop_collection(&self.collection).await?;
        if !dropped {
            log::debug!("Collection '{}' already absent", self.collection);
        }
        Ok(UnitSummary::new().with("dropped", u64::from(dropped)))
    }
}

/// Rename a collection.
///
/// Already renamed (source gone, target present) is a no-op. Both present
/// is refused, since proceeding would mean merging or discarding data.
#[derive(Debug, Clone)]
pub struct RenameCollection {
    pub from: CollectionName,
    pub to: CollectionName,
}

#[async_trait]
impl MigrationUnit for RenameCollection {
    async fn apply(&self, ctx: &MigrationContext) -> MigrationResult<UnitSummary> {
        let store = ctx.store();
        let source_exists = store.collection_exists(&self.from).await?;
        let target_exists = store.collection_exists(&self.to).await?;

        match (source_exists, target_exists) {
            (false, _) => {
                log::debug!("Collection '{}' absent, nothing to rename", self.from);
                Ok(UnitSummary::new().with("renamed", 0))
            }
            (true, true) => Err(MigrationError::unit_logic(format!(
                "cannot rename '{}' to '{}': target already exists",
                self.from, self.to
            ))),
            (true, false) => {
                store.rename_collection(&self.from, &self.to).await?;
                Ok(UnitSummary::new().with("renamed", 1))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DropIndex {
    pub collection: CollectionName,
    pub index: IndexName,
}

#[async_trait]
impl MigrationUnit for DropIndex {
    async fn apply(&self, ctx: &MigrationContext) -> MigrationResult<UnitSummary> {
        let dropped = ctx.store().drop_index(&self.collection, &self.index).await?;
        if !dropped {
            log::debug!(
                "Index '{}' on '{}' already absent",
                self.index,
                self.collection
            );
        }
        Ok(UnitSummary::new().with("dropped", u64::from(dropped)))
    }
}

#[cfg(test)]
#[path = "structural_test.rs"]
mod tests;
