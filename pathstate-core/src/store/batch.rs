//! Batch Coordinator
//!
//! While a batch is open, writes go to a shared pending list instead of the
//! notifier. When the outermost batch returns successfully, the list is
//! collapsed to one entry per path (last write wins, ordered by first
//! write) and delivered in a single pass.
//!
//! Nested batches share the list. A failing inner batch truncates the list
//! back to where it started, so the outer batch can still commit what it
//! wrote before.

use indexmap::IndexMap;

use super::notify::Change;
use super::Store;

#[derive(Debug, Default)]
pub(crate) struct Batch {
    depth: usize,
    seq: u64,
    pending: Vec<(u64, Change)>,
}

impl Batch {
    fn is_open(&self) -> bool {
        self.depth > 0
    }

    fn push(&mut self, changes: Vec<Change>) {
        for change in changes {
            self.seq += 1;
            self.pending.push((self.seq, change));
        }
    }

    /// Collapse pending changes by path.
    fn drain(&mut self) -> Vec<Change> {
        let mut by_path: IndexMap<String, (u64, Change)> = IndexMap::new();
        for (seq, change) in self.pending.drain(..) {
            let first = by_path.get(&change.entry.path).map_or(seq, |(first, _)| *first);
            by_path.insert(change.entry.path.clone(), (first, change));
        }
        let mut out: Vec<_> = by_path.into_values().collect();
        out.sort_by_key(|(seq, _)| *seq);
        out.into_iter().map(|(_, change)| change).collect()
    }
}

/// Closes one batch level; truncates the pending list unless disarmed.
struct BatchScope<'a> {
    store: &'a Store,
    mark: Option<usize>,
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        let mut batch = self.store.inner.batch.lock();
        if let Some(mark) = self.mark {
            batch.pending.truncate(mark);
        }
        batch.depth -= 1;
    }
}

impl Store {
    /// Run `f` with change notifications deferred until it returns.
    ///
    /// If `f` fails or panics, the writes it made stay in the tree but
    /// their notifications are discarded.
    pub fn batch<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let mark = {
            let mut batch = self.inner.batch.lock();
            batch.depth += 1;
            batch.pending.len()
        };
        let mut scope = BatchScope {
            store: self,
            mark: Some(mark),
        };

        let value = match f() {
            Ok(value) => value,
            Err(err) => {
                drop(scope);
                self.settle();
                return Err(err);
            }
        };

        scope.mark = None;
        drop(scope);

        let changes = {
            let mut batch = self.inner.batch.lock();
            if batch.is_open() {
                return Ok(value);
            }
            batch.drain()
        };
        tracing::debug!(changes = changes.len(), "batch committed");
        self.run_change_hooks(changes);
        self.settle();
        Ok(value)
    }

    /// Whether a batch is currently open.
    pub fn in_batch(&self) -> bool {
        self.inner.batch.lock().is_open()
    }

    /// Queue `changes` on the open batch, or deliver them now.
    pub(super) fn dispatch(&self, changes: Vec<Change>) {
        {
            let mut batch = self.inner.batch.lock();
            if batch.is_open() {
                batch.push(changes);
                return;
            }
        }
        self.run_change_hooks(changes);
    }
}
