//! Error types for ds-store

use ds_core::CoreError;
use thiserror::Error;

/// Document store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection error (D001)
    #[error("[D001] Store connection failed: {0}")]
    ConnectionError(String),

    /// Read or write failed (D002)
    #[error("[D002] Store operation failed: {0}")]
    ExecutionError(String),

    /// Collection not found (D003)
    #[error("[D003] Collection not found: {0}")]
    CollectionNotFound(String),

    /// Collection already exists (D004)
    #[error("[D004] Collection already exists: {0}")]
    CollectionExists(String),

    /// Duplicate document identifier (D005)
    #[error("[D005] Document '{id}' already exists in '{collection}'")]
    DuplicateId { collection: String, id: String },

    /// Document has no string `_id` (D006)
    #[error("[D006] Document in '{collection}' has no string _id")]
    MissingId { collection: String },

    /// Stored document could not be decoded (D007)
    #[error("[D007] Invalid stored document: {0}")]
    InvalidDocument(String),

    /// Mutex poisoned (D008)
    #[error("[D008] Store mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Update could not be applied to a document (D009)
    #[error("[D009] Update rejected: {0}")]
    UpdateRejected(#[from] CoreError),

    /// Collection name clashes with an existing one that differs only by case (D010)
    #[error("[D010] Collection '{requested}' conflicts with existing '{existing}' (names differ only by case)")]
    CollectionCaseConflict { requested: String, existing: String },
}

/// Result type alias for StoreError
pub type StoreResult<T> = Result<T, StoreError>;

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error carries no structured variant for catalog misses,
        // so classify by message.
        let msg = err.to_string();
        if msg.contains("Table with name")
            || (msg.contains("Catalog Error") && msg.contains("does not exist"))
        {
            StoreError::CollectionNotFound(msg)
        } else {
            StoreError::ExecutionError(msg)
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidDocument(err.to_string())
    }
}
