//! Scoped, bounded-memory iteration over query results.
//!
//! A [`ScopedCursor`] owns the store's server-side cursor and pulls one batch
//! at a time, so at most `batch_size` documents are ever buffered. The
//! server-side cursor is released exactly once: when iteration runs off the
//! end, when a fetch fails, when [`ScopedCursor::close`] is called, or when
//! the cursor is dropped early (for example by `?` inside a unit).

use crate::error::MigrationResult;
use ds_core::{CollectionName, Document, Filter};
use ds_store::{DocumentStore, RawCursor};
use std::collections::VecDeque;

/// Single-traversal cursor with guaranteed release.
pub struct ScopedCursor {
    raw: Option<Box<dyn RawCursor>>,
    buffer: VecDeque<Document>,
    collection: CollectionName,
    batch_size: usize,
}

impl ScopedCursor {
    /// Open a cursor over the documents of `collection` matching `filter`.
    pub async fn open(
        store: &dyn DocumentStore,
        collection: &CollectionName,
        filter: &Filter,
        batch_size: usize,
    ) -> MigrationResult<Self> {
        let batch_size = batch_size.max(1);
        let raw = store.open_cursor(collection, filter, batch_size).await?;
        Ok(Self {
            raw: Some(raw),
            buffer: VecDeque::with_capacity(batch_size),
            collection: collection.clone(),
            batch_size,
        })
    }

    /// Whether another document is available, fetching a batch if needed.
    pub async fn has_next(&mut self) -> MigrationResult<bool> {
        if self.buffer.is_empty() {
            self.fill().await?;
        }
        Ok(!self.buffer.is_empty())
    }

    /// The next document, or `None` once the cursor is exhausted.
    pub async fn next(&mut self) -> MigrationResult<Option<Document>> {
        if !self.has_next().await? {
            return Ok(None);
        }
        Ok(self.buffer.pop_front())
    }

    /// Release the server-side cursor and drop any buffered documents.
    pub fn close(&mut self) {
        self.buffer.clear();
        if let Some(mut raw) = self.raw.take() {
            raw.close();
            log::debug!("Released cursor on '{}'", self.collection);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.raw.is_none()
    }

    /// Documents currently held in memory
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn fill(&mut self) -> MigrationResult<()> {
        let Some(raw) = self.raw.as_mut() else {
            return Ok(());
        };
        match raw.next_batch().await {
            Ok(batch) if batch.is_empty() => {
                self.close();
                Ok(())
            }
            Ok(batch) => {
                self.buffer.extend(batch);
                Ok(())
            }
            Err(e) => {
                self.close();
                Err(e.into())
            }
        }
    }
}

impl Drop for ScopedCursor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "cursor_test.rs"]
mod tests;
