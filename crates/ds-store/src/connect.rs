//! Store construction from configuration

use crate::duckdb::DuckDbStore;
use crate::error::StoreResult;
use crate::memory::MemoryStore;
use crate::traits::DocumentStore;
use ds_core::{StoreConfig, StoreType};
use std::sync::Arc;

/// Open the document store described by `config`.
pub fn connect(config: &StoreConfig) -> StoreResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store_type {
        StoreType::DuckDb => Arc::new(DuckDbStore::new(&config.path)?),
        StoreType::Memory => Arc::new(MemoryStore::new()),
    };
    log::debug!("Connected to {} store at {}", store.store_type(), config.path);
    Ok(store)
}
