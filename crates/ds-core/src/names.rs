//! Strongly-typed names for collections, indexes, and migrations.

use crate::newtype_string::define_name;

fn validate_collection(s: &str) -> Result<(), &'static str> {
    if s.contains('\0') {
        return Err("contains a NUL byte");
    }
    if s.contains('.') {
        return Err("contains '.'");
    }
    Ok(())
}

fn validate_index(s: &str) -> Result<(), &'static str> {
    if s.contains('\0') {
        return Err("contains a NUL byte");
    }
    Ok(())
}

fn validate_migration(s: &str) -> Result<(), &'static str> {
    if s.chars().any(char::is_whitespace) {
        return Err("contains whitespace");
    }
    Ok(())
}

define_name! {
    /// Name of a collection in the document store.
    pub struct CollectionName;
    validate = validate_collection;
}

define_name! {
    /// Name of a secondary index on a collection.
    pub struct IndexName;
    validate = validate_index;
}

define_name! {
    /// Stable, human-readable name of a migration unit.
    ///
    /// Appears in logs and run reports next to the sequence number.
    pub struct MigrationName;
    validate = validate_migration;
}
