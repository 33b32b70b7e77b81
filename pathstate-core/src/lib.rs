//! Pathstate Core
//!
//! A reactive state store addressed by dot-separated paths. It implements:
//!
//! - Path resolution and structural diffing over one `serde_json::Value` tree
//! - Per-owner dependency tracking with rollback on failure
//! - Change hooks with ancestor, descendant and wildcard propagation
//! - Access hooks that populate paths on first read, synchronously or from
//!   async work
//! - Batched writes delivered in one notification pass
//! - Computed values and effects built on the tracker
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `tree`: path resolution and the diff engine
//! - `graph`: path to owner dependency graph, with two backends
//! - `reactive`: tracking context, tracker, computed values and effects
//! - `store`: the public read/write API and the hook runners
//! - `scheduler`: the queue abstraction callbacks are delivered through
//!
//! # Example
//!
//! ```rust,ignore
//! use pathstate_core::Store;
//!
//! let store = Store::new();
//!
//! // A derived value
//! let greeting = store.computed(|s| format!("Hello, {}", s.get("user.name").unwrap_or_default()));
//!
//! // A side effect
//! store.effect(move |_| println!("{}", greeting.value().unwrap()));
//!
//! // Prints: "Hello, "Ada""
//! store.set("user.name", "Ada")?;
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod scheduler;
pub mod store;
pub mod tree;

pub use config::StoreConfig;
pub use error::{HookError, Result, StoreError};
pub use graph::GraphBackend;
pub use reactive::{Computed, ComputedState, Effect, Invalidate, OwnerId};
pub use scheduler::{Queue, QueueScheduler, Scheduler, Task, TaskKey};
pub use store::{
    AccessCacheEntry, AccessContext, AccessResult, ChangeEvent, Collection, DiffQuery, GetOptions,
    Meta, SetOptions, Store, Subscription, WeakStore, WriteSource,
};
pub use tree::{DiffAction, DiffEntry};
