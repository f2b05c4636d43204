//! Back-fill a child field by joining through a parent collection.

use super::document_id;
use crate::error::MigrationResult;
use crate::unit::{MigrationContext, MigrationUnit, UnitSummary};
use async_trait::async_trait;
use ds_core::{CollectionName, DocumentExt, FieldPath, Filter, Update};
use serde_json::Value;
use std::sync::Arc;

type Derive = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Copies a value from a parent document onto children that lack it.
///
/// For each child without `target_field`, the parent is found with a point
/// lookup `parent_key == child[foreign_key]` and its `parent_field` (which
/// defaults to `target_field`) is written to the child. A missing parent is
/// counted and logged, never an error.
#[derive(Clone)]
pub struct BackfillFromParent {
    collection: CollectionName,
    foreign_key: FieldPath,
    parent_collection: CollectionName,
    parent_key: FieldPath,
    target_field: FieldPath,
    parent_field: FieldPath,
    derive: Option<Derive>,
}

impl BackfillFromParent {
    pub fn new(
        collection: CollectionName,
        foreign_key: FieldPath,
        parent_collection: CollectionName,
        parent_key: FieldPath,
        target_field: FieldPath,
    ) -> Self {
        Self {
            collection,
            foreign_key,
            parent_collection,
            parent_key,
            parent_field: target_field.clone(),
            target_field,
            derive: None,
        }
    }

    /// Read the value from a differently named parent field
    pub fn with_parent_field(mut self, field: FieldPath) -> Self {
        self.parent_field = field;
        self
    }

    /// Transform the parent's value before writing it; `None` skips the child
    pub fn with_derive<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.derive = Some(Arc::new(f));
        self
    }
}

#[async_trait]
impl MigrationUnit for BackfillFromParent {
    async fn apply(&self, ctx: &MigrationContext) -> MigrationResult<UnitSummary> {
        let mut summary = UnitSummary::new()
            .with("updated", 0)
            .with("skipped_missing_parent", 0)
            .with("skipped_already_present", 0)
            .with("skipped_missing_key", 0)
            .with("skipped_missing_value", 0);
        let mut cursor = ctx.cursor(&self.collection, &Filter::All).await?;

        while let Some(child) = cursor.next().await? {
            if child.has_path(&self.target_field) {
                summary.incr("skipped_already_present");
                continue;
            }
            let id = document_id(&self.collection, &child)?;
            let key = match child.get_path(&self.foreign_key) {
                Some(key) if !key.is_null() => key.clone(),
                _ => {
                    summary.incr("skipped_missing_key");
                    continue;
                }
            };

            let lookup = Filter::eq(&self.parent_key, key.clone());
            let Some(parent) = ctx
                .store()
                .find_one(&self.parent_collection, &lookup)
                .await?
            else {
                log::warn!(
                    "'{}' {} references missing '{}' {}={}",
                    self.collection,
                    id,
                    self.parent_collection,
                    self.parent_key,
                    key
                );
                summary.incr("skipped_missing_parent");
                continue;
            };

            let source = parent
                .get_path(&self.parent_field)
                .filter(|v| !v.is_null());
            let value = match (source, &self.derive) {
                (Some(v), Some(derive)) => derive(v),
                (Some(v), None) => Some(v.clone()),
                (None, _) => None,
            };
            let Some(value) = value else {
                summary.incr("skipped_missing_value");
                continue;
            };

            let update = Update::set_one(&self.target_field, value);
            if ctx.store().update_one(&self.collection, id, &update).await? {
                summary.incr("updated");
            }
        }

        log::debug!(
            "Back-filled '{}.{}' from '{}': {}",
            self.collection,
            self.target_field,
            self.parent_collection,
            summary
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::document;
    use ds_store::{DocumentStore, MemoryStore};
    use serde_json::json;

    fn infra() -> CollectionName {
        CollectionName::new("infrastructureDefinitions")
    }

    fn apps() -> CollectionName {
        CollectionName::new("apps")
    }

    async fn fixture() -> (MemoryStore, MigrationContext) {
        let store = MemoryStore::new();
        for app in [
            json!({ "_id": "app1", "accountId": "acc1" }),
            json!({ "_id": "app2", "accountId": "acc2", "owner": "team-b" }),
            json!({ "_id": "app3" }),
        ] {
            store.insert_one(&apps(), document(app)).await.unwrap();
        }
        for child in [
            json!({ "_id": "i1", "appId": "app1" }),
            json!({ "_id": "i2", "appId": "app2" }),
            json!({ "_id": "i3", "appId": "gone" }),
            json!({ "_id": "i4", "appId": "app1", "accountId": "acc1" }),
            json!({ "_id": "i5" }),
            json!({ "_id": "i6", "appId": "app3" }),
        ] {
            store.insert_one(&infra(), document(child)).await.unwrap();
        }
        let ctx = MigrationContext::new(Arc::new(store.clone()), 2);
        (store, ctx)
    }

    fn unit() -> BackfillFromParent {
        BackfillFromParent::new(
            infra(),
            FieldPath::new("appId"),
            apps(),
            FieldPath::new("_id"),
            FieldPath::new("accountId"),
        )
    }

    #[tokio::test]
    async fn test_counts_every_skip_reason() {
        let (store, ctx) = fixture().await;
        let summary = unit().apply(&ctx).await.unwrap();

        assert_eq!(summary.get("updated"), 2);
        assert_eq!(summary.get("skipped_missing_parent"), 1);
        assert_eq!(summary.get("skipped_already_present"), 1);
        assert_eq!(summary.get("skipped_missing_key"), 1);
        assert_eq!(summary.get("skipped_missing_value"), 1);

        let docs = store.documents("infrastructureDefinitions").unwrap();
        assert_eq!(docs[0]["accountId"], "acc1");
        assert_eq!(docs[1]["accountId"], "acc2");
        assert!(!docs[2].contains_key("accountId"));
    }

    #[tokio::test]
    async fn test_rerun_only_revisits_skipped_children() {
        let (_store, ctx) = fixture().await;
        unit().apply(&ctx).await.unwrap();
        let summary = unit().apply(&ctx).await.unwrap();

        assert_eq!(summary.get("updated"), 0);
        assert_eq!(summary.get("skipped_already_present"), 3);
        assert_eq!(summary.get("skipped_missing_parent"), 1);
    }

    #[tokio::test]
    async fn test_parent_field_and_derive() {
        let (store, ctx) = fixture().await;
        let unit = BackfillFromParent::new(
            infra(),
            FieldPath::new("appId"),
            apps(),
            FieldPath::new("_id"),
            FieldPath::new("meta.ownerTeam"),
        )
        .with_parent_field(FieldPath::new("owner"))
        .with_derive(|v| v.as_str().map(|s| Value::String(s.to_uppercase())));

        let summary = unit.apply(&ctx).await.unwrap();
        assert_eq!(summary.get("updated"), 1);

        let docs = store.documents("infrastructureDefinitions").unwrap();
        assert_eq!(docs[1]["meta"]["ownerTeam"], "TEAM-B");
    }

    #[tokio::test]
    async fn test_join_on_non_id_key() {
        let store = MemoryStore::new();
        let envs = CollectionName::new("environments");
        store
            .insert_one(&apps(), document(json!({ "_id": "p1", "slug": "web", "accountId": "acc9" })))
            .await
            .unwrap();
        store
            .insert_one(&envs, document(json!({ "_id": "e1", "appSlug": "web" })))
            .await
            .unwrap();
        let ctx = MigrationContext::new(Arc::new(store.clone()), 10);

        let summary = BackfillFromParent::new(
            envs,
            FieldPath::new("appSlug"),
            apps(),
            FieldPath::new("slug"),
            FieldPath::new("accountId"),
        )
        .apply(&ctx)
        .await
        .unwrap();

        assert_eq!(summary.get("updated"), 1);
        assert_eq!(store.documents("environments").unwrap()[0]["accountId"], "acc9");
    }
}
