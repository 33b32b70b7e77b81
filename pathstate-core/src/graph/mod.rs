//! Dependency Graph
//!
//! This module holds the structure that maps store paths to the owners that
//! read them, and decides which owners a write invalidates.
//!
//! # Overview
//!
//! Both backends implement [`ReactiveGraph`] and satisfy the same contract:
//!
//! - `subscribe`/`unsubscribe` maintain the path to owner edges recorded by
//!   `track_access`
//! - `affected` returns every owner subscribed at a changed path, at any of
//!   its ancestors, or at any of its descendants
//! - paths with no subscribers left are dropped, so the graph does not grow
//!   over the store's lifetime
//!
//! # Backends
//!
//! 1. [`PathIndex`] is a flat `path -> owners` map. Ancestors and
//!    descendants are found by string prefix.
//!
//! 2. [`SignalGraph`] keeps one node per path linked to its parent, like a
//!    signal per path. A change marks the node, every ancestor, and every
//!    descendant dirty explicitly. Nested containers are mutated in place,
//!    so the identity of a parent value never tells us it changed.

mod index;
mod node;
mod signal;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::reactive::OwnerId;

pub use index::PathIndex;
pub use node::{DirtyState, PathNode};
pub use signal::SignalGraph;

/// Path to owner bookkeeping used by the dependency tracker.
pub trait ReactiveGraph: Send {
    /// Record that `owner` read `path`.
    fn subscribe(&mut self, path: &str, owner: OwnerId);

    /// Forget that `owner` read `path`.
    fn unsubscribe(&mut self, path: &str, owner: OwnerId);

    /// Forget every path `owner` read.
    fn remove_owner(&mut self, owner: OwnerId);

    /// Owners affected by changes at `changed`, in first-seen order.
    fn affected(&mut self, changed: &[&str]) -> IndexSet<OwnerId>;

    /// Number of owners subscribed at exactly `path`.
    fn subscriber_count(&self, path: &str) -> usize;

    /// Number of paths the graph currently keeps state for.
    fn path_count(&self) -> usize;
}

/// Which [`ReactiveGraph`] implementation a store uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackend {
    #[default]
    PathIndex,
    Signal,
}

impl GraphBackend {
    pub fn build(self) -> Box<dyn ReactiveGraph> {
        match self {
            GraphBackend::PathIndex => Box::new(PathIndex::new()),
            GraphBackend::Signal => Box::new(SignalGraph::new()),
        }
    }
}
