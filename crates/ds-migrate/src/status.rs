//! Persisted migration checkpoint.
//!
//! The checkpoint is a single document per deployment:
//!
//! ```json
//! { "_id": "migration_status", "lastAppliedSequenceNumber": 3, "updatedAt": "2024-05-01T12:00:00Z" }
//! ```
//!
//! A missing document means nothing has been applied yet.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ds_core::{CollectionName, Document, FieldPath, Filter, SequenceNumber, ID_FIELD};
use ds_store::{DocumentStore, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// `_id` of the singleton status document
pub const STATUS_DOCUMENT_ID: &str = "migration_status";

/// The checkpoint as stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    pub last_applied_sequence_number: SequenceNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    fn to_document(&self) -> StoreResult<Document> {
        let mut doc = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Document::new(),
        };
        doc.insert(ID_FIELD.to_string(), Value::String(STATUS_DOCUMENT_ID.to_string()));
        Ok(doc)
    }

    fn from_document(doc: Document) -> StoreResult<Self> {
        Ok(serde_json::from_value(Value::Object(doc))?)
    }
}

/// Where the runner reads and writes its checkpoint.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Current checkpoint; zero when none has been written.
    async fn load(&self) -> StoreResult<MigrationStatus>;

    /// Persist `last_applied` as the new checkpoint.
    async fn save(&self, last_applied: SequenceNumber) -> StoreResult<MigrationStatus>;
}

/// Status store backed by a collection of the migrated document store.
pub struct DocumentStatusStore {
    store: Arc<dyn DocumentStore>,
    collection: CollectionName,
}

impl DocumentStatusStore {
    pub fn new(store: Arc<dyn DocumentStore>, collection: CollectionName) -> Self {
        Self { store, collection }
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    fn id_filter() -> Filter {
        Filter::eq(&FieldPath::new(ID_FIELD), STATUS_DOCUMENT_ID)
    }
}

#[async_trait]
impl StatusStore for DocumentStatusStore {
    async fn load(&self) -> StoreResult<MigrationStatus> {
        match self
            .store
            .find_one(&self.collection, &Self::id_filter())
            .await?
        {
            Some(doc) => MigrationStatus::from_document(doc),
            None => Ok(MigrationStatus::default()),
        }
    }

    async fn save(&self, last_applied: SequenceNumber) -> StoreResult<MigrationStatus> {
        let status = MigrationStatus {
            last_applied_sequence_number: last_applied,
            updated_at: Some(Utc::now()),
        };
        self.store
            .replace_one(&self.collection, status.to_document()?, true)
            .await?;
        log::debug!(
            "Checkpoint written to '{}': last applied {}",
            self.collection,
            last_applied
        );
        Ok(status)
    }
}
