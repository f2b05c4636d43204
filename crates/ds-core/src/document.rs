//! Schemaless documents and dotted field paths.
//!
//! A [`Document`] is a JSON object. The only field the engine relies on is
//! [`ID_FIELD`] (`_id`), a string that identifies the document inside its
//! collection. Everything else is addressed through [`FieldPath`]s such as
//! `spec.className`, which descend through nested objects.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A dynamically-shaped record stored in a collection.
pub type Document = serde_json::Map<String, Value>;

/// Name of the identifier field every stored document carries.
pub const ID_FIELD: &str = "_id";

/// A dotted path to a (possibly nested) field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path. Empty paths and empty segments (`a..b`) are
    /// rejected.
    pub fn parse(path: &str) -> CoreResult<Self> {
        if path.is_empty() {
            return Err(CoreError::InvalidFieldPath {
                path: path.to_string(),
                reason: "path is empty".to_string(),
            });
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(CoreError::InvalidFieldPath {
                path: path.to_string(),
                reason: "path contains an empty segment".to_string(),
            });
        }
        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    /// Parse a path known to be valid, panicking otherwise.
    ///
    /// Intended for literals in code; use [`parse`](Self::parse) for input.
    pub fn new(path: &str) -> Self {
        match Self::parse(path) {
            Ok(p) => p,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when the path addresses the document identifier.
    pub fn is_id(&self) -> bool {
        self.segments[0] == ID_FIELD
    }

    /// True when `other` lies strictly below this path (`a` contains `a.b`).
    pub fn contains(&self, other: &FieldPath) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }

    /// True when one path equals or contains the other.
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self == other || self.contains(other) || other.contains(self)
    }

    fn split_last(&self) -> (&String, &[String]) {
        // parse() guarantees at least one segment
        let (last, parents) = self
            .segments
            .split_last()
            .unwrap_or_else(|| unreachable!("FieldPath always has a segment"));
        (last, parents)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FieldPath::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Path-aware accessors on [`Document`].
pub trait DocumentExt {
    /// The `_id` of the document, when it is a string.
    fn id(&self) -> Option<&str>;

    /// Value at `path`, descending through nested objects.
    fn get_path(&self, path: &FieldPath) -> Option<&Value>;

    /// True when the field exists. An explicit `null` counts as present.
    fn has_path(&self, path: &FieldPath) -> bool {
        self.get_path(path).is_some()
    }

    /// Set `path` to `value`, creating intermediate objects.
    ///
    /// Returns `Ok(false)` when the field already held an equal value.
    fn set_path(&mut self, path: &FieldPath, value: Value) -> CoreResult<bool>;

    /// Remove the field at `path`, returning its previous value.
    fn remove_path(&mut self, path: &FieldPath) -> Option<Value>;
}

impl DocumentExt for Document {
    fn id(&self) -> Option<&str> {
        self.get(ID_FIELD).and_then(Value::as_str)
    }

    fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        let (last, parents) = path.split_last();
        let mut current = self;
        for segment in parents {
            current = current.get(segment)?.as_object()?;
        }
        current.get(last)
    }

    fn set_path(&mut self, path: &FieldPath, value: Value) -> CoreResult<bool> {
        let (last, parents) = path.split_last();
        let mut current: &mut Document = self;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Document::new()));
            current = match entry {
                Value::Object(map) => map,
                _ => {
                    return Err(CoreError::PathConflict {
                        path: path.to_string(),
                        segment: segment.clone(),
                    })
                }
            };
        }
        if current.get(last) == Some(&value) {
            return Ok(false);
        }
        current.insert(last.clone(), value);
        Ok(true)
    }

    fn remove_path(&mut self, path: &FieldPath) -> Option<Value> {
        let (last, parents) = path.split_last();
        let mut current: &mut Document = self;
        for segment in parents {
            match current.get_mut(segment) {
                Some(Value::Object(map)) => current = map,
                _ => return None,
            }
        }
        current.remove(last)
    }
}

/// Build a [`Document`] from a `serde_json::json!` object literal.
///
/// Non-object values produce an empty document.
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

#[cfg(test)]
#[path = "document_test.rs"]
mod tests;
