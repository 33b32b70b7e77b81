//! Store Configuration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{kind_of, Result, StoreError};
use crate::graph::GraphBackend;
use crate::scheduler::Queue;

/// Settings fixed for the lifetime of a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Queue for change hooks registered without one, and for tracker
    /// invalidations.
    pub default_queue: Queue,

    /// Queue for writing back the result of a synchronous access hook.
    pub hook_write_queue: Queue,

    /// Dependency graph implementation.
    pub backend: GraphBackend,

    /// Initial root. Must be an object.
    pub initial_state: Value,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_queue: Queue::Sync,
            hook_write_queue: Queue::Micro,
            backend: GraphBackend::default(),
            initial_state: Value::Object(Map::new()),
        }
    }
}

impl StoreConfig {
    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.initial_state.is_object() {
            return Err(StoreError::RootNotObject {
                found: kind_of(Some(&self.initial_state)),
            });
        }
        Ok(())
    }

    pub fn with_backend(mut self, backend: GraphBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_default_queue(mut self, queue: Queue) -> Self {
        self.default_queue = queue;
        self
    }

    pub fn with_hook_write_queue(mut self, queue: Queue) -> Self {
        self.hook_write_queue = queue;
        self
    }

    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }
}
