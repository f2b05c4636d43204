//! Document store adapter traits

use crate::error::StoreResult;
use async_trait::async_trait;
use ds_core::{CollectionName, Document, Filter, IndexName, Update};

/// A server-side cursor over the documents matching a filter.
///
/// Backends hand these out from [`DocumentStore::open_cursor`]; each open
/// cursor holds a backend resource until [`close`](RawCursor::close) is
/// called. Callers normally wrap them in a scoped cursor that guarantees the
/// close.
#[async_trait]
pub trait RawCursor: Send {
    /// Pull the next batch of at most `batch_size` documents.
    ///
    /// An empty batch means the cursor is exhausted.
    async fn next_batch(&mut self) -> StoreResult<Vec<Document>>;

    /// Release the backend resource. Calling it twice is a no-op.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Capability surface the migration engine needs from a document store.
///
/// Implementations must be Send + Sync. A missing collection behaves like an
/// empty one for reads and filtered writes; `insert_one` and `replace_one`
/// with upsert create it on demand.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a cursor over documents in `collection` matching `filter`,
    /// ordered by `_id`.
    async fn open_cursor(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        batch_size: usize,
    ) -> StoreResult<Box<dyn RawCursor>>;

    /// First document (by `_id`) matching `filter`
    async fn find_one(
        &self,
        collection: &CollectionName,
        filter: &Filter,
    ) -> StoreResult<Option<Document>>;

    /// Number of documents matching `filter`
    async fn count(&self, collection: &CollectionName, filter: &Filter) -> StoreResult<usize>;

    /// Insert a new document; its `_id` must be unused
    async fn insert_one(&self, collection: &CollectionName, doc: Document) -> StoreResult<()>;

    /// Replace the document with the same `_id`, inserting when `upsert`
    /// is set. Returns whether a document was written.
    async fn replace_one(
        &self,
        collection: &CollectionName,
        doc: Document,
        upsert: bool,
    ) -> StoreResult<bool>;

    /// Apply `update` to the document with the given `_id` in one write.
    /// Returns whether the document changed.
    async fn update_one(
        &self,
        collection: &CollectionName,
        id: &str,
        update: &Update,
    ) -> StoreResult<bool>;

    /// Apply `update` to every matching document; returns how many changed
    async fn update_many(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<usize>;

    /// Delete every matching document; returns how many were removed
    async fn delete_many(&self, collection: &CollectionName, filter: &Filter)
        -> StoreResult<usize>;

    async fn collection_exists(&self, collection: &CollectionName) -> StoreResult<bool>;

    /// Drop a collection; returns false when it did not exist
    async fn drop_collection(&self, collection: &CollectionName) -> StoreResult<bool>;

    /// Drop an index; returns false when it did not exist
    async fn drop_index(&self, collection: &CollectionName, index: &IndexName)
        -> StoreResult<bool>;

    /// Rename a collection. Fails when `from` is missing or `to` exists.
    async fn rename_collection(
        &self,
        from: &CollectionName,
        to: &CollectionName,
    ) -> StoreResult<()>;

    /// Store type identifier for logging
    fn store_type(&self) -> &'static str;
}
