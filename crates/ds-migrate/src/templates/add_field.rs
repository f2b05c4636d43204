//! Add a field to every document that lacks it.

use super::document_id;
use crate::error::MigrationResult;
use crate::unit::{MigrationContext, MigrationUnit, UnitSummary};
use async_trait::async_trait;
use ds_core::{CollectionName, Document, FieldPath, Filter, Update};
use serde_json::Value;
use std::sync::Arc;

/// Computes the value written to a document.
#[derive(Clone)]
pub enum ValueProvider {
    Constant(Value),
    Computed(Arc<dyn Fn(&Document) -> Value + Send + Sync>),
}

impl ValueProvider {
    pub fn value_for(&self, doc: &Document) -> Value {
        match self {
            ValueProvider::Constant(value) => value.clone(),
            ValueProvider::Computed(f) => f(doc),
        }
    }
}

/// Sets `field` on every document of `collection` where it does not exist.
///
/// Documents that already carry the field, even as `null`, are never
/// touched. Reports `scanned` and `updated`.
#[derive(Clone)]
pub struct AddFieldIfAbsent {
    collection: CollectionName,
    field: FieldPath,
    provider: ValueProvider,
}

impl AddFieldIfAbsent {
    pub fn new(collection: CollectionName, field: FieldPath, value: impl Into<Value>) -> Self {
        Self {
            collection,
            field,
            provider: ValueProvider::Constant(value.into()),
        }
    }

    /// Value derived from the document being updated
    pub fn computed<F>(collection: CollectionName, field: FieldPath, f: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        Self {
            collection,
            field,
            provider: ValueProvider::Computed(Arc::new(f)),
        }
    }
}

#[async_trait]
impl MigrationUnit for AddFieldIfAbsent {
    async fn apply(&self, ctx: &MigrationContext) -> MigrationResult<UnitSummary> {
        let mut summary = UnitSummary::new().with("scanned", 0).with("updated", 0);
        let mut cursor = ctx
            .cursor(&self.collection, &Filter::missing(&self.field))
            .await?;

        while let Some(doc) = cursor.next().await? {
            summary.incr("scanned");
            let id = document_id(&self.collection, &doc)?;
            let update = Update::set_one(&self.field, self.provider.value_for(&doc));
            if ctx.store().update_one(&self.collection, id, &update).await? {
                summary.incr("updated");
            }
        }

        log::debug!("Added '{}' to '{}': {}", self.field, self.collection, summary);
        Ok(summary)
    }
}
