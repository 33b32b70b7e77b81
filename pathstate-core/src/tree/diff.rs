//! Structural Diff
//!
//! Compares two values rooted at a base path and reports leaf-level changes.
//!
//! The comparison descends through objects and arrays of the same kind.
//! When one side is missing, a non-empty container is expanded into one
//! entry per leaf so subscribers of nested paths see the addition or
//! removal. A change of kind (object to array, number to string, ...) is a
//! single `update` at the node where the kinds differ.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path;

/// What happened at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAction {
    Add,
    Update,
    Remove,
}

/// One leaf-level change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub path: String,
    pub action: DiffAction,
}

impl DiffEntry {
    pub fn new(path: impl Into<String>, action: DiffAction) -> Self {
        Self {
            path: path.into(),
            action,
        }
    }
}

/// Diff `old` against `new` at `base`. An empty result means nothing
/// observable changed.
pub fn diff_values(old: Option<&Value>, new: Option<&Value>, base: &str) -> Vec<DiffEntry> {
    let mut out = Vec::new();
    diff_into(old, new, base, &mut out);
    out
}

fn diff_into(old: Option<&Value>, new: Option<&Value>, base: &str, out: &mut Vec<DiffEntry>) {
    match (old, new) {
        (None, None) => {}
        (None, Some(value)) => expand(value, base, DiffAction::Add, out),
        (Some(value), None) => expand(value, base, DiffAction::Remove, out),
        (Some(Value::Object(before)), Some(Value::Object(after))) => {
            for (key, value) in before {
                diff_into(Some(value), after.get(key), &path::join(base, key), out);
            }
            for (key, value) in after {
                if !before.contains_key(key) {
                    diff_into(None, Some(value), &path::join(base, key), out);
                }
            }
        }
        (Some(Value::Array(before)), Some(Value::Array(after))) => {
            for idx in 0..before.len().max(after.len()) {
                diff_into(
                    before.get(idx),
                    after.get(idx),
                    &path::join(base, &idx.to_string()),
                    out,
                );
            }
        }
        (Some(before), Some(after)) => {
            if !same_scalar(before, after) {
                out.push(DiffEntry::new(base, DiffAction::Update));
            }
        }
    }
}

/// Numbers compare by value, so `1` and `1.0` are the same.
fn same_scalar(before: &Value, after: &Value) -> bool {
    match (before, after) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => before == after,
    }
}

/// Emit one entry per leaf of `value`; empty containers count as leaves.
fn expand(value: &Value, base: &str, action: DiffAction, out: &mut Vec<DiffEntry>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                expand(child, &path::join(base, key), action, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (idx, child) in items.iter().enumerate() {
                expand(child, &path::join(base, &idx.to_string()), action, out);
            }
        }
        _ => out.push(DiffEntry::new(base, action)),
    }
}
