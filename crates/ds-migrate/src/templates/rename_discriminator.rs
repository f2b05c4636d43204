//! Rename a type discriminator together with its class-name twin.

use super::document_id;
use crate::error::MigrationResult;
use crate::unit::{MigrationContext, MigrationUnit, UnitSummary};
use async_trait::async_trait;
use ds_core::{ClassNameRename, CollectionName, DocumentExt, FieldPath, Filter, Update};
use serde_json::Value;

/// Rewrites every document whose discriminator equals `from`.
///
/// The discriminator becomes `to` and, when a class-name mapping is
/// configured and the document's class field holds the old class, the class
/// field becomes the new class. Both fields change in one document write, so
/// a tag and class name never disagree. `from == to` is allowed for a
/// class-name-only rename.
///
/// Reports `scanned`, `updated` and `already_current`.
#[derive(Debug, Clone)]
pub struct RenameDiscriminator {
    collection: CollectionName,
    field: FieldPath,
    from: String,
    to: String,
    class_name: Option<ClassNameRename>,
}

impl RenameDiscriminator {
    pub fn new(
        collection: CollectionName,
        field: FieldPath,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            collection,
            field,
            from: from.into(),
            to: to.into(),
            class_name: None,
        }
    }

    pub fn with_class_name(mut self, mapping: ClassNameRename) -> Self {
        self.class_name = Some(mapping);
        self
    }
}

#[async_trait]
impl MigrationUnit for RenameDiscriminator {
    async fn apply(&self, ctx: &MigrationContext) -> MigrationResult<UnitSummary> {
        let mut summary = UnitSummary::new()
            .with("scanned", 0)
            .with("updated", 0)
            .with("already_current", 0);
        let filter = Filter::eq(&self.field, self.from.as_str());
        let mut cursor = ctx.cursor(&self.collection, &filter).await?;

        while let Some(doc) = cursor.next().await? {
            summary.incr("scanned");
            let id = document_id(&self.collection, &doc)?;

            let mut update = Update::new().set(&self.field, self.to.as_str());
            if let Some(class) = &self.class_name {
                let old_class = Value::String(class.from.clone());
                if doc.get_path(&class.field) == Some(&old_class) {
                    update = update.set(&class.field, class.to.as_str());
                }
            }

            if ctx.store().update_one(&self.collection, id, &update).await? {
                summary.incr("updated");
            } else {
                summary.incr("already_current");
            }
        }

        log::debug!(
            "Renamed '{}' {} -> {} in '{}': {}",
            self.field,
            self.from,
            self.to,
            self.collection,
            summary
        );
        Ok(summary)
    }
}
