//! DuckDB document store backend
//!
//! Each collection is a table `(id VARCHAR PRIMARY KEY, body VARCHAR)` holding
//! the document's `_id` and its JSON text. DuckDB resolves table names without
//! regard to case, so two collections whose names differ only by case are
//! refused rather than silently sharing a table. Filters are evaluated in Rust on pages
//! fetched with keyset pagination (`WHERE id > ? ORDER BY id LIMIT ?`), so a
//! scan never holds more than one page of rows regardless of table size.

use crate::error::{StoreError, StoreResult};
use crate::traits::{DocumentStore, RawCursor};
use async_trait::async_trait;
use ds_core::{CollectionName, Document, DocumentExt, Filter, IndexName, Update};
use duckdb::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Page size used by whole-collection writes (`update_many`, `delete_many`)
const WRITE_PAGE_SIZE: usize = 256;

struct DuckDbInner {
    conn: Mutex<Connection>,
    open_cursors: AtomicUsize,
}

/// DuckDB document store
#[derive(Clone)]
pub struct DuckDbStore {
    inner: Arc<DuckDbInner>,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl DuckDbStore {
    /// Create a new in-memory DuckDB store
    pub fn in_memory() -> StoreResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Open (or create) a DuckDB store at a file path
    pub fn from_path(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::ConnectionError(format!("{e}: {}", path.display())))?;
        log::debug!("Opened DuckDB store at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> StoreResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(DuckDbInner {
                conn: Mutex::new(conn),
                open_cursors: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of cursors opened and not yet closed
    pub fn open_cursors(&self) -> usize {
        self.inner.open_cursors.load(Ordering::SeqCst)
    }

    /// Execute raw SQL against the underlying database (indexes, fixtures)
    pub fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        let conn = self.inner.lock()?;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

impl DuckDbInner {
    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::MutexPoisoned(e.to_string()))
    }
}

/// Whether `collection` has a table, refusing a table that matches only
/// when case is ignored.
fn table_exists(conn: &Connection, collection: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'main' AND lower(table_name) = lower(?)",
    )?;
    let names = stmt.query_map(duckdb::params![collection], |row| row.get::<_, String>(0))?;
    let mut found = false;
    for name in names {
        let name = name?;
        if name != collection {
            return Err(StoreError::CollectionCaseConflict {
                requested: collection.to_string(),
                existing: name,
            });
        }
        found = true;
    }
    Ok(found)
}

fn create_table_sql(collection: &str) -> String {
    format!(
        "CREATE TABLE {} (id VARCHAR PRIMARY KEY, body VARCHAR NOT NULL)",
        quote_ident(collection)
    )
}

fn ensure_table(conn: &Connection, collection: &str) -> StoreResult<()> {
    if !table_exists(conn, collection)? {
        conn.execute_batch(&create_table_sql(collection))?;
    }
    Ok(())
}

/// Fetch up to `limit` raw rows with `id > after`, in id order.
fn fetch_page(
    conn: &Connection,
    collection: &str,
    after: &str,
    limit: usize,
) -> StoreResult<Vec<(String, String)>> {
    let sql = format!(
        "SELECT id, body FROM {} WHERE id > ? ORDER BY id LIMIT ?",
        quote_ident(collection)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(duckdb::params![after, limit as i64], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut page = Vec::with_capacity(limit);
    for row in rows {
        page.push(row?);
    }
    Ok(page)
}

fn fetch_by_id(conn: &Connection, collection: &str, id: &str) -> StoreResult<Option<Document>> {
    let sql = format!("SELECT body FROM {} WHERE id = ?", quote_ident(collection));
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(duckdb::params![id])?;
    match rows.next()? {
        Some(row) => {
            let body: String = row.get(0)?;
            Ok(Some(decode(&body)?))
        }
        None => Ok(None),
    }
}

fn write_body(conn: &Connection, collection: &str, id: &str, doc: &Document) -> StoreResult<()> {
    let body = serde_json::to_string(doc)?;
    conn.execute(
        &format!("UPDATE {} SET body = ? WHERE id = ?", quote_ident(collection)),
        duckdb::params![body, id],
    )?;
    Ok(())
}

fn decode(body: &str) -> StoreResult<Document> {
    Ok(serde_json::from_str(body)?)
}

fn require_id(collection: &CollectionName, doc: &Document) -> StoreResult<String> {
    doc.id()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StoreError::MissingId {
            collection: collection.to_string(),
        })
}

/// Walk every document in `collection` matching `filter`, one page at a time.
///
/// `visit` runs with the connection locked and may write the row it is given;
/// it returns `false` to stop the walk early.
fn for_each_match<F>(
    inner: &DuckDbInner,
    collection: &str,
    filter: &Filter,
    mut visit: F,
) -> StoreResult<()>
where
    F: FnMut(&Connection, &str, Document) -> StoreResult<bool>,
{
    let conn = inner.lock()?;
    if !table_exists(&conn, collection)? {
        return Ok(());
    }
    let mut after = String::new();
    loop {
        let page = fetch_page(&conn, collection, &after, WRITE_PAGE_SIZE)?;
        let exhausted = page.len() < WRITE_PAGE_SIZE;
        for (id, body) in page {
            let doc = decode(&body)?;
            if filter.matches(&doc) && !visit(&conn, &id, doc)? {
                return Ok(());
            }
            after = id;
        }
        if exhausted {
            return Ok(());
        }
    }
}

/// Keyset-paginated cursor; the open-cursor count is the server resource.
struct DuckDbCursor {
    inner: Arc<DuckDbInner>,
    collection: String,
    filter: Filter,
    batch_size: usize,
    after: String,
    exhausted: bool,
    closed: bool,
}

#[async_trait]
impl RawCursor for DuckDbCursor {
    async fn next_batch(&mut self) -> StoreResult<Vec<Document>> {
        let mut batch = Vec::new();
        if self.closed || self.exhausted {
            return Ok(batch);
        }
        let conn = self.inner.lock()?;
        if !table_exists(&conn, &self.collection)? {
            self.exhausted = true;
            return Ok(batch);
        }
        while batch.len() < self.batch_size {
            let page = fetch_page(&conn, &self.collection, &self.after, self.batch_size)?;
            let page_len = page.len();
            let mut consumed = 0;
            for (id, body) in page {
                consumed += 1;
                let doc = decode(&body)?;
                self.after = id;
                if self.filter.matches(&doc) {
                    batch.push(doc);
                    if batch.len() == self.batch_size {
                        break;
                    }
                }
            }
            if page_len < self.batch_size && consumed == page_len {
                self.exhausted = true;
                break;
            }
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
impl DocumentStore for DuckDbStore {
    async fn open_cursor(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        batch_size: usize,
    ) -> StoreResult<Box<dyn RawCursor>> {
        self.inner.open_cursors.fetch_add(1, Ordering::SeqCst);
        log::debug!("Opened cursor on '{collection}' ({filter}, batch {batch_size})");
        Ok(Box::new(DuckDbCursor {
            inner: Arc::clone(&self.inner),
            collection: collection.to_string(),
            filter: filter.clone(),
            batch_size: batch_size.max(1),
            after: String::new(),
            exhausted: false,
            closed: false,
        }))
    }

    async fn find_one(
        &self,
        collection: &CollectionName,
        filter: &Filter,
    ) -> StoreResult<Option<Document>> {
        if let Some(id) = filter.id_lookup() {
            let conn = self.inner.lock()?;
            if !table_exists(&conn, collection)? {
                return Ok(None);
            }
            return fetch_by_id(&conn, collection, id);
        }
        let mut found = None;
        for_each_match(&self.inner, collection, filter, |_, _, doc| {
            found = Some(doc);
            Ok(false)
        })?;
        Ok(found)
    }

    async fn count(&self, collection: &CollectionName, filter: &Filter) -> StoreResult<usize> {
        let mut n = 0;
        for_each_match(&self.inner, collection, filter, |_, _, _| {
            n += 1;
            Ok(true)
        })?;
        Ok(n)
    }

    async fn insert_one(&self, collection: &CollectionName, doc: Document) -> StoreResult<()> {
        let id = require_id(collection, &doc)?;
        let conn = self.inner.lock()?;
        ensure_table(&conn, collection)?;
        if fetch_by_id(&conn, collection, &id)?.is_some() {
            return Err(StoreError::DuplicateId {
                collection: collection.to_string(),
                id,
            });
        }
        let body = serde_json::to_string(&doc)?;
        conn.execute(
            &format!("INSERT INTO {} (id, body) VALUES (?, ?)", quote_ident(collection)),
            duckdb::params![id, body],
        )?;
        Ok(())
    }

    async fn replace_one(
        &self,
        collection: &CollectionName,
        doc: Document,
        upsert: bool,
    ) -> StoreResult<bool> {
        let id = require_id(collection, &doc)?;
        let conn = self.inner.lock()?;
        let exists =
            table_exists(&conn, collection)? && fetch_by_id(&conn, collection, &id)?.is_some();
        if exists {
            write_body(&conn, collection, &id, &doc)?;
            return Ok(true);
        }
        if !upsert {
            return Ok(false);
        }
        ensure_table(&conn, collection)?;
        let body = serde_json::to_string(&doc)?;
        conn.execute(
            &format!("INSERT INTO {} (id, body) VALUES (?, ?)", quote_ident(collection)),
            duckdb::params![id, body],
        )?;
        Ok(true)
    }

    async fn update_one(
        &self,
        collection: &CollectionName,
        id: &str,
        update: &Update,
    ) -> StoreResult<bool> {
        let conn = self.inner.lock()?;
        if !table_exists(&conn, collection)? {
            return Ok(false);
        }
        let Some(mut doc) = fetch_by_id(&conn, collection, id)? else {
            return Ok(false);
        };
        if !update.apply(&mut doc)? {
            return Ok(false);
        }
        write_body(&conn, collection, id, &doc)?;
        Ok(true)
    }

    async fn update_many(
        &self,
        collection: &CollectionName,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<usize> {
        let mut changed = 0;
        for_each_match(&self.inner, collection, filter, |conn, id, mut doc| {
            if update.apply(&mut doc)? {
                write_body(conn, collection, id, &doc)?;
                changed += 1;
            }
            Ok(true)
        })?;
        Ok(changed)
    }

    async fn delete_many(
        &self,
        collection: &CollectionName,
        filter: &Filter,
    ) -> StoreResult<usize> {
        let sql = format!("DELETE FROM {} WHERE id = ?", quote_ident(collection));
        let mut removed = 0;
        for_each_match(&self.inner, collection, filter, |conn, id, _| {
            removed += conn.execute(&sql, duckdb::params![id])?;
            Ok(true)
        })?;
        Ok(removed)
    }

    async fn collection_exists(&self, collection: &CollectionName) -> StoreResult<bool> {
        let conn = self.inner.lock()?;
        table_exists(&conn, collection)
    }

    async fn drop_collection(&self, collection: &CollectionName) -> StoreResult<bool> {
        let conn = self.inner.lock()?;
        if !table_exists(&conn, collection)? {
            return Ok(false);
        }
        conn.execute_batch(&format!("DROP TABLE {}", quote_ident(collection)))?;
        Ok(true)
    }

    async fn drop_index(
        &self,
        collection: &CollectionName,
        index: &IndexName,
    ) -> StoreResult<bool> {
        let conn = self.inner.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM duckdb_indexes() WHERE table_name = ? AND index_name = ?",
            duckdb::params![collection.as_str(), index.as_str()],
            |row| row.get(0),
        )?;
        if count == 0 {
            return Ok(false);
        }
        conn.execute_batch(&format!("DROP INDEX {}", quote_ident(index)))?;
        Ok(true)
    }

    async fn rename_collection(
        &self,
        from: &CollectionName,
        to: &CollectionName,
    ) -> StoreResult<()> {
        let conn = self.inner.lock()?;
        if table_exists(&conn, to)? {
            return Err(StoreError::CollectionExists(to.to_string()));
        }
        if !table_exists(&conn, from)? {
            return Err(StoreError::CollectionNotFound(from.to_string()));
        }
        // ALTER TABLE .. RENAME is refused while indexes depend on the table,
        // so copy into a fresh keyed table instead. Indexes on `from` are dropped.
        let sql = format!(
            "BEGIN TRANSACTION; {}; INSERT INTO {} SELECT id, body FROM {}; DROP TABLE {}; COMMIT;",
            create_table_sql(to),
            quote_ident(to),
            quote_ident(from),
            quote_ident(from)
        );
        if let Err(e) = conn.execute_batch(&sql) {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e.into());
        }
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
