//! In-process document store backend.
//!
//! Keeps every collection in a `BTreeMap` keyed by `_id`, which gives the same
//! `_id` ordering the DuckDB backend uses. Besides serving embedded and test
//! deployments it can simulate store failures per collection, and it counts
//! open cursors so callers can verify cursors are released.

use crate::error::{StoreError, StoreResult};
use crate::traits::{DocumentStore, RawCursor};
use async_trait::async_trait;
use ds_core::{CollectionName, Document, DocumentExt, Filter, IndexName, Update};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryCollection {
    docs: BTreeMap<String, Document>,
    indexes: BTreeSet<String>,
}

#[derive(Default)]
struct MemoryInner {
    collections: Mutex<BTreeMap<String, MemoryCollection>>,
    failing_reads: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
    open_cursors: AtomicUsize,
}

impl MemoryInner {
    fn collections(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, MemoryCollection>>> {
        self.collections
            .lock()
            .map_err(|e| StoreError::MutexPoisoned(e.to_string()))
    }

    fn check_read(&self, collection: &str) -> StoreResult<()> {
        let failing = self
            .failing_reads
            .lock()
            .map_err(|e| StoreError::MutexPoisoned(e.to_string()))?;
        if failing.contains(collection) {
            return Err(StoreError::ExecutionError(format!(
                "simulated read failure on '{collection}'"
            )));
        }
        Ok(())
    }

    fn check_write(&self, collection: &str) -> StoreResult<()> {
        let failing = self
            .failing_writes
            .lock()
            .map_err(|e| StoreError::MutexPoisoned(e.to_string()))?;
        if failing.contains(collection) {
            return Err(StoreError::ExecutionError(format!(
                "simulated write failure on '{collection}'"
            )));
        }
        Ok(())
    }
}

/// In-memory document store
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cursors opened and not yet closed
    pub fn open_cursors(&self) -> usize {
        self.inner.open_cursors.load(Ordering::SeqCst)
    }

    /// All documents of a collection in `_id` order
    pub fn documents(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let collections = self.inner.collections()?;
        Ok(collections
            .get(collection)
            .map(|c| c.docs.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Declare an index on a collection, creating the collection if needed
    pub fn create_index(&self, collection: &CollectionName, index: &IndexName) -> StoreResult<()> {
        let mut collections = self.inner.collections()?;
        collections
            .entry(collection.to_string())
            .or_default()
            .indexes
            .insert(index.to_string());
        Ok(())
    }

    pub fn has_index(&self, collection: &str, index: &str) -> StoreResult<bool> {
        let collections = self.inner.collections()?;
        Ok(collections
            .get(collection)
            .is_some_and(|c| c.indexes.contains(index)))
    }

    /// Make every subsequent read from `collection` fail
    pub fn fail_reads_from(&self, collection: &str) -> StoreResult<()> {
        self.inner
            .failing_reads
            .lock()
            .map_err(|e| StoreError::MutexPoisoned(e.to_string()))?
            .insert(collection.to_string());
        Ok(())
    }

    /// Make every subsequent write to `collection` fail
    pub fn fail_writes_to(&self, collection: &str) -> StoreResult<()> {
        self.inner
            .failing_writes
            .lock()
            .map_err(|e| StoreError::MutexPoisoned(e.to_string()))?
            .insert(collection.to_string());
        Ok(())
    }

    /// Remove all simulated failures
    pub fn clear_failures(&self) -> StoreResult<()> {
        self.inner
            .failing_reads
            .lock()
            .map_err(|e| StoreError::MutexPoisoned(e.to_string()))?
            .clear();
        self.inner
            .failing_writes
            .lock()
            .map_err(|e| StoreError::MutexPoisoned(e.to_string()))?
            .clear();
        Ok(())
    }
}

fn require_id(collection: &CollectionName, doc: &Document) -> StoreResult<String> {
    doc.id()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StoreError::MissingId {
            collection: collection.to_string(),
        })
}

/// Cursor over a snapshot-free range of a memory collection.
///
/// Each batch re-reads the collection after the last `_id` returned, so
/// documents updated in place by the caller are never revisited.
struct MemoryCursor {
    inner: Arc<MemoryInner>,
    collection: String,
    filter: Filter,
    batch_size: usize,
    last_id: Option<String>,
    closed: bool,
}

#[async_trait]
impl RawCursor for MemoryCursor {
    async fn next_batch(&mut self) -> StoreResult<Vec<Document>> {
        if self.closed {
            return Ok(Vec::new());
        }
        self.inner.check_read(&self.collection)?;
        let collections = self.inner.collections()?;
        let Some(coll) = collections.get(&self.collection) else {
            return Ok(Vec::new());
        };

        let lower = match &self.last_id {
            Some(id) => Bound::Excluded(id.clone()),
            None => Bound::Unbounded,
        };
        let batch: Vec<Document> = coll
            .docs
            .range((lower, Bound::Unbounded))
            .filter(|(_, doc)| self.filter.matches(doc))
            .take(self.batch_size)
            .map(|(_, doc)| doc.clone())
            .collect();

        if let Some(last) = batch.last().and_then(|d| d.id()) {
            self.last_id = Some(last.to_string());
        }
        Ok(batch)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.open_cursors.fetch_sub(1, Ordering::SeqCst);
            log::debug!("Closed cursor on '{}'", self.collection);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn open_cursor(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        batch_size: usize,
    ) -> StoreResult<Box<dyn RawCursor>> {
        self.inner.check_read(collection)?;
        self.inner.open_cursors.fetch_add(1, Ordering::SeqCst);
        log::debug!("Opened cursor on '{collection}' ({filter}, batch {batch_size})");
        Ok(Box::new(MemoryCursor {
            inner: Arc::clone(&self.inner),
            collection: collection.to_string(),
            filter: filter.clone(),
            batch_size: batch_size.max(1),
            last_id: None,
            closed: false,
        }))
    }

    async fn find_one(
        &self,
        collection: &CollectionName,
        filter: &Filter,
    ) -> StoreResult<Option<Document>> {
        self.inner.check_read(collection)?;
        let collections = self.inner.collections()?;
        let Some(coll) = collections.get(collection.as_str()) else {
            return Ok(None);
        };
        if let Some(id) = filter.id_lookup() {
            return Ok(coll.docs.get(id).cloned());
        }
        Ok(coll.docs.values().find(|d| filter.matches(d)).cloned())
    }

    async fn count(&self, collection: &CollectionName, filter: &Filter) -> StoreResult<usize> {
        self.inner.check_read(collection)?;
        let collections = self.inner.collections()?;
        Ok(collections
            .get(collection.as_str())
            .map(|c| c.docs.values().filter(|d| filter.matches(d)).count())
            .unwrap_or(0))
    }

    async fn insert_one(&self, collection: &CollectionName, doc: Document) -> StoreResult<()> {
        self.inner.check_write(collection)?;
        let id = require_id(collection, &doc)?;
        let mut collections = self.inner.collections()?;
        let coll = collections.entry(collection.to_string()).or_default();
        if coll.docs.contains_key(&id) {
            return Err(StoreError::DuplicateId {
                collection: collection.to_string(),
                id,
            });
        }
        coll.docs.insert(id, doc);
        Ok(())
    }

    async fn replace_one(
        &self,
        collection: &CollectionName,
        doc: Document,
        upsert: bool,
    ) -> StoreResult<bool> {
        self.inner.check_write(collection)?;
        let id = require_id(collection, &doc)?;
        let mut collections = self.inner.collections()?;
        if !upsert
            && !collections
                .get(collection.as_str())
                .is_some_and(|c| c.docs.contains_key(&id))
        {
            return Ok(false);
        }
        collections
            .entry(collection.to_string())
            .or_default()
            .docs
            .insert(id, doc);
        Ok(true)
    }

    async fn update_one(
        &self,
        collection: &CollectionName,
        id: &str,
        update: &Update,
    ) -> StoreResult<bool> {
        self.inner.check_write(collection)?;
        let mut collections = self.inner.collections()?;
        let Some(doc) = collections
            .get_mut(collection.as_str())
            .and_then(|c| c.docs.get_mut(id))
        else {
            return Ok(false);
        };
        Ok(update.apply(doc)?)
    }

    async fn update_many(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<usize> {
        self.inner.check_write(collection)?;
        let mut collections = self.inner.collections()?;
        let Some(coll) = collections.get_mut(collection.as_str()) else {
            return Ok(0);
        };
        let mut changed = 0;
        for doc in coll.docs.values_mut().filter(|d| filter.matches(d)) {
            if update.apply(doc)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete_many(
        &self,
        collection: &CollectionName,
        filter: &Filter,
    ) -> StoreResult<usize> {
        self.inner.check_write(collection)?;
        let mut collections = self.inner.collections()?;
        let Some(coll) = collections.get_mut(collection.as_str()) else {
            return Ok(0);
        };
        let before = coll.docs.len();
        coll.docs.retain(|_, d| !filter.matches(d));
        Ok(before - coll.docs.len())
    }

    async fn collection_exists(&self, collection: &CollectionName) -> StoreResult<bool> {
        let collections = self.inner.collections()?;
        Ok(collections.contains_key(collection.as_str()))
    }

    async fn drop_collection(&self, collection: &CollectionName) -> StoreResult<bool> {
        self.inner.check_write(collection)?;
        let mut collections = self.inner.collections()?;
        Ok(collections.remove(collection.as_str()).is_some())
    }

    async fn drop_index(
        &self,
        collection: &CollectionName,
        index: &IndexName,
    ) -> StoreResult<bool> {
        self.inner.check_write(collection)?;
        let mut collections = self.inner.collections()?;
        Ok(collections
            .get_mut(collection.as_str())
            .is_some_and(|c| c.indexes.remove(index.as_str())))
    }

    async fn rename_collection(
        &self,
        from: &CollectionName,
        to: &CollectionName,
    ) -> StoreResult<()> {
        self.inner.check_write(from)?;
        self.inner.check_write(to)?;
        let mut collections = self.inner.collections()?;
        if collections.contains_key(to.as_str()) {
            return Err(StoreError::CollectionExists(to.to_string()));
        }
        let coll = collections
            .remove(from.as_str())
            .ok_or_else(|| StoreError::CollectionNotFound(from.to_string()))?;
        collections.insert(to.to_string(), coll);
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
