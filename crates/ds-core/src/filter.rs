//! Query filters understood by every store backend.
//!
//! Filters are evaluated against a [`Document`] in memory; backends are free
//! to push them down when they can, but must return exactly the documents for
//! which [`Filter::matches`] is true.

use crate::document::{Document, DocumentExt, FieldPath};
use serde_json::Value;
use std::fmt;

/// Predicate over a single document.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document
    All,
    /// The field exists (an explicit `null` counts)
    Exists(FieldPath),
    /// The field does not exist
    Missing(FieldPath),
    /// The field exists and equals the value
    Eq(FieldPath, Value),
    /// All sub-filters match
    And(Vec<Filter>),
}

impl Filter {
    pub fn exists(path: &FieldPath) -> Self {
        Filter::Exists(path.clone())
    }

    pub fn missing(path: &FieldPath) -> Self {
        Filter::Missing(path.clone())
    }

    pub fn eq(path: &FieldPath, value: impl Into<Value>) -> Self {
        Filter::Eq(path.clone(), value.into())
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), f) => {
                a.push(f);
                Filter::And(a)
            }
            (f, Filter::And(mut b)) => {
                b.insert(0, f);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// The `_id` this filter pins down, when it is a plain `_id` equality.
    ///
    /// Backends use it to turn a point lookup into a keyed read.
    pub fn id_lookup(&self) -> Option<&str> {
        match self {
            Filter::Eq(path, Value::String(id)) if path.is_id() && path.segments().len() == 1 => {
                Some(id.as_str())
            }
            _ => None,
        }
    }

    /// Evaluate the filter against `doc`.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Exists(path) => doc.has_path(path),
            Filter::Missing(path) => !doc.has_path(path),
            Filter::Eq(path, value) => doc.get_path(path) == Some(value),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "*"),
            Filter::Exists(p) => write!(f, "{p} exists"),
            Filter::Missing(p) => write!(f, "{p} missing"),
            Filter::Eq(p, v) => write!(f, "{p} == {v}"),
            Filter::And(filters) => {
                for (i, filter) in filters.iter().enumerate() {
                    if i > 0 {
                        write!(f, " && ")?;
                    }
                    write!(f, "({filter})")?;
                }
                Ok(())
            }
        }
    }
}
