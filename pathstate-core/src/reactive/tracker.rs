//! Dependency Tracker
//!
//! Per-owner record of which paths were read, wired into a
//! [`ReactiveGraph`] so that writes can find the owners they invalidate.
//!
//! # How It Works
//!
//! 1. `begin` snapshots the owner's dependencies and invalidate callback
//!    before a tracked run.
//!
//! 2. Every tracked read calls `record`, which adds the path to the
//!    owner's in-progress set and subscribes the owner to it immediately.
//!
//! 3. On success, `commit` unsubscribes paths that were not read again and
//!    makes the in-progress set the owner's dependencies.
//!
//! 4. On failure, `rollback` restores the snapshot and unsubscribes every
//!    path the failed run added, so no partial subscription survives.
//!
//! Owners are either lazy (computed values, which only flip a dirty flag)
//! or eager (effects and render passes, which run work). Lazy owners are
//! listed first so that a derived value is dirty before anything that
//! reads it runs again.

use std::collections::HashMap;

use indexmap::IndexSet;

use super::{Invalidate, OwnerId};
use crate::graph::ReactiveGraph;

/// Tracking state of one owner.
#[derive(Debug, Default)]
pub struct TrackerItem {
    /// Paths read by the last successful run.
    deps: IndexSet<String>,

    /// Paths read by the run in progress.
    deps_run: IndexSet<String>,

    /// Callback returned by the last successful run.
    invalidate: Option<Invalidate>,

    lazy: bool,
}

impl TrackerItem {
    pub fn deps(&self) -> &IndexSet<String> {
        &self.deps
    }

    pub fn deps_run(&self) -> &IndexSet<String> {
        &self.deps_run
    }

    pub fn invalidate(&self) -> Option<&Invalidate> {
        self.invalidate.as_ref()
    }
}

/// State captured before a tracked run, restored if the run fails.
#[derive(Debug)]
pub struct Snapshot {
    deps: IndexSet<String>,
    invalidate: Option<Invalidate>,
}

/// An owner to notify, and whether the notification is only a dirty mark.
pub struct Invalidation {
    pub owner: OwnerId,
    pub invalidate: Invalidate,
    pub lazy: bool,
}

pub struct Tracker {
    items: HashMap<OwnerId, TrackerItem>,
    graph: Box<dyn ReactiveGraph>,
}

impl Tracker {
    pub fn new(graph: Box<dyn ReactiveGraph>) -> Self {
        Self {
            items: HashMap::new(),
            graph,
        }
    }

    pub fn item(&self, owner: OwnerId) -> Option<&TrackerItem> {
        self.items.get(&owner)
    }

    pub fn graph(&self) -> &dyn ReactiveGraph {
        self.graph.as_ref()
    }

    /// Mark `owner` as lazy, creating its item if needed.
    pub fn set_lazy(&mut self, owner: OwnerId) {
        self.items.entry(owner).or_default().lazy = true;
    }

    /// Start a run for `owner`.
    pub fn begin(&mut self, owner: OwnerId) -> Snapshot {
        let item = self.items.entry(owner).or_default();
        item.deps_run.clear();
        Snapshot {
            deps: item.deps.clone(),
            invalidate: item.invalidate.clone(),
        }
    }

    /// Record a read of `path` by `owner`'s current run.
    pub fn record(&mut self, owner: OwnerId, path: &str) {
        let Some(item) = self.items.get_mut(&owner) else {
            return;
        };
        if item.deps_run.insert(path.to_string()) {
            self.graph.subscribe(path, owner);
        }
    }

    /// Finish a successful run.
    pub fn commit(&mut self, owner: OwnerId, invalidate: Invalidate) {
        let Some(item) = self.items.get_mut(&owner) else {
            return;
        };
        for stale in item.deps.iter().filter(|p| !item.deps_run.contains(*p)) {
            self.graph.unsubscribe(stale, owner);
        }
        item.deps = std::mem::take(&mut item.deps_run);
        item.invalidate = Some(invalidate);
    }

    /// Undo a failed run.
    pub fn rollback(&mut self, owner: OwnerId, snapshot: Snapshot) {
        let Some(item) = self.items.get_mut(&owner) else {
            return;
        };
        for added in item.deps_run.iter().filter(|p| !snapshot.deps.contains(*p)) {
            self.graph.unsubscribe(added, owner);
        }
        item.deps_run.clear();
        item.deps = snapshot.deps;
        item.invalidate = snapshot.invalidate;
    }

    /// Drop everything known about `owner`.
    pub fn dispose(&mut self, owner: OwnerId) -> bool {
        let Some(item) = self.items.remove(&owner) else {
            return false;
        };
        for path in item.deps.iter().chain(&item.deps_run) {
            self.graph.unsubscribe(path, owner);
        }
        true
    }

    /// Owners invalidated by changes at `changed`, lazy owners first.
    /// Owners for which `skip` returns true are left out.
    pub fn invalidations(
        &mut self,
        changed: &[&str],
        skip: impl Fn(OwnerId) -> bool,
    ) -> Vec<Invalidation> {
        let mut out: Vec<Invalidation> = self
            .graph
            .affected(changed)
            .into_iter()
            .filter(|owner| !skip(*owner))
            .filter_map(|owner| {
                let item = self.items.get(&owner)?;
                Some(Invalidation {
                    owner,
                    invalidate: item.invalidate.clone()?,
                    lazy: item.lazy,
                })
            })
            .collect();
        // Stable, so first-seen order holds within each group
        out.sort_by_key(|inv| !inv.lazy);
        out
    }
}
