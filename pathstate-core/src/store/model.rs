//! Models
//!
//! A named registry of domain objects layered on the store. Anything
//! `Send + Sync` can be registered; [`Collection`] is the stock model for an
//! object of records kept at one path.

use std::any::Any;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{GetOptions, Store};
use crate::error::{Result, StoreError};
use crate::tree::path;

impl Store {
    /// Register `model` under `key`. A key can only be registered once.
    pub fn define_model<M>(&self, key: &str, model: M) -> Result<Arc<M>>
    where
        M: Any + Send + Sync,
    {
        let mut models = self.inner.models.lock();
        if models.contains_key(key) {
            return Err(StoreError::DuplicateModel(key.to_string()));
        }
        let model = Arc::new(model);
        models.insert(key.to_string(), model.clone());
        tracing::debug!(key, "model defined");
        Ok(model)
    }

    /// The model registered under `key`, if it has type `M`.
    pub fn model<M>(&self, key: &str) -> Option<Arc<M>>
    where
        M: Any + Send + Sync,
    {
        let model = self.inner.models.lock().get(key)?.clone();
        model.downcast::<M>().ok()
    }

    pub fn has_model(&self, key: &str) -> bool {
        self.inner.models.lock().contains_key(key)
    }
}

/// CRUD over the records stored at one path, keyed by an id field.
///
/// ```text
/// todos: {
///     "1": { "id": "1", "title": "write docs" },
///     "2": { "id": "2", "title": "ship" },
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Collection {
    path: String,
    id_field: String,
}

impl Collection {
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_id_field(path, "id")
    }

    pub fn with_id_field(path: impl Into<String>, id_field: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id_field: id_field.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn record_path(&self, id: &str) -> Result<String> {
        if id.is_empty() || id.contains('.') {
            return Err(StoreError::InvalidPath {
                path: path::join(&self.path, id),
                reason: "record ids must be a single non-empty segment",
            });
        }
        Ok(path::join(&self.path, id))
    }

    /// All records, in insertion order. Tracked like any other read.
    pub fn list(&self, store: &Store) -> Vec<Value> {
        match store.get(&self.path) {
            Some(Value::Object(records)) => records.into_iter().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        }
    }

    pub fn find(&self, store: &Store, id: &str) -> Result<Option<Value>> {
        Ok(store.get(&self.record_path(id)?))
    }

    /// Store `record` under its id field and return the id.
    ///
    /// Records without an id are given the next free numeric one.
    pub fn insert(&self, store: &Store, record: Value) -> Result<String> {
        let Value::Object(mut fields) = record else {
            return Err(StoreError::InvalidPath {
                path: self.path.clone(),
                reason: "records must be objects",
            });
        };
        let id = match fields.get(&self.id_field) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                let id = self.next_id(store);
                fields.insert(self.id_field.clone(), Value::String(id.clone()));
                id
            }
        };
        store.set(&self.record_path(&id)?, Value::Object(fields))?;
        Ok(id)
    }

    /// Shallow-merge `patch` into the record. Returns false if there is no
    /// such record.
    pub fn update(&self, store: &Store, id: &str, patch: Map<String, Value>) -> Result<bool> {
        let at = self.record_path(id)?;
        if store.peek(&at).is_none() {
            return Ok(false);
        }
        store.merge(&at, Value::Object(patch))?;
        Ok(true)
    }

    /// Remove the record, returning it.
    pub fn remove(&self, store: &Store, id: &str) -> Result<Option<Value>> {
        let at = self.record_path(id)?;
        let existing = store.peek(&at);
        if existing.is_some() {
            store.del(&at)?;
        }
        Ok(existing)
    }

    fn next_id(&self, store: &Store) -> String {
        let records = store.get_with(&self.path, &GetOptions::new().untracked().without_hooks());
        let next = match records {
            Some(Value::Object(records)) => records
                .keys()
                .filter_map(|k| k.parse::<u64>().ok())
                .max()
                .map_or(1, |max| max + 1),
            _ => 1,
        };
        next.to_string()
    }
}
