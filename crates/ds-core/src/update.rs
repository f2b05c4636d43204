//! Field-level document updates.
//!
//! An [`Update`] is an ordered list of operations applied to one document in
//! a single write, so a multi-field update is never observed half-applied.

use crate::document::{Document, DocumentExt, FieldPath};
use crate::error::{CoreError, CoreResult};
use serde_json::Value;

/// A single field operation.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Set the field, creating intermediate objects
    Set(FieldPath, Value),
    /// Remove the field if present
    Unset(FieldPath),
    /// Move a field's value to a new path; no-op when the source is missing
    Rename { from: FieldPath, to: FieldPath },
}

/// An ordered set of field operations applied atomically to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for an update with a single `Set`.
    pub fn set_one(path: &FieldPath, value: impl Into<Value>) -> Self {
        Self::new().set(path, value)
    }

    pub fn set(mut self, path: &FieldPath, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(path.clone(), value.into()));
        self
    }

    pub fn unset(mut self, path: &FieldPath) -> Self {
        self.ops.push(UpdateOp::Unset(path.clone()));
        self
    }

    pub fn rename(mut self, from: &FieldPath, to: &FieldPath) -> Self {
        self.ops.push(UpdateOp::Rename {
            from: from.clone(),
            to: to.clone(),
        });
        self
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every operation to `doc`, returning whether anything changed.
    ///
    /// The update is validated before any operation runs: touching `_id` is
    /// rejected. Path conflicts are detected on a scratch copy, so on error
    /// `doc` is left untouched.
    pub fn apply(&self, doc: &mut Document) -> CoreResult<bool> {
        for op in &self.ops {
            let touched = match op {
                UpdateOp::Set(p, _) | UpdateOp::Unset(p) => p.is_id(),
                UpdateOp::Rename { from, to } => from.is_id() || to.is_id(),
            };
            if touched {
                let field = match op {
                    UpdateOp::Set(p, _) | UpdateOp::Unset(p) => p.to_string(),
                    UpdateOp::Rename { from, to } => format!("{from} -> {to}"),
                };
                return Err(CoreError::ImmutableField { field });
            }
        }

        let mut scratch = doc.clone();
        let mut changed = false;
        for op in &self.ops {
            changed |= match op {
                UpdateOp::Set(path, value) => scratch.set_path(path, value.clone())?,
                UpdateOp::Unset(path) => scratch.remove_path(path).is_some(),
                UpdateOp::Rename { from, to } => match scratch.remove_path(from) {
                    Some(value) => {
                        scratch.set_path(to, value)?;
                        true
                    }
                    None => false,
                },
            };
        }
        if changed {
            *doc = scratch;
        }
        Ok(changed)
    }
}
