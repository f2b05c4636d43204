//! Command implementations

pub(crate) mod common;
pub mod list;
pub mod migrate;
pub mod status;
