//! ds-store - Document store abstraction for Docshift
//!
//! This crate provides the `DocumentStore` and `RawCursor` traits the
//! migration engine is written against, plus two backends: an in-process
//! `MemoryStore` and a `DuckDbStore` that keeps each collection as a table of
//! JSON documents.

pub mod connect;
pub mod duckdb;
pub mod error;
pub mod memory;
pub mod traits;

pub use connect::connect;
pub use duckdb::DuckDbStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::{DocumentStore, RawCursor};
