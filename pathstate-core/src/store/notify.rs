//! Change Notifier
//!
//! Delivers the diff of a write (or of a whole batch) to two audiences:
//!
//! 1. Tracker owners subscribed through the [`ReactiveGraph`]. Lazy owners
//!    are invalidated inline; eager ones are scheduled on the default queue.
//! 2. Change hooks registered with [`Store::on_change`]. A hook at `K` fires
//!    when a change lands at `K`, below `K`, or above `K`. The wildcard key
//!    fires once per pass.
//!
//! The set of hooks to call is snapshotted before anything is scheduled,
//! so hooks that write to the store (or register and remove other hooks)
//! never disturb the pass in flight.
//!
//! [`ReactiveGraph`]: crate::graph::ReactiveGraph

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{remove_hook, Store, Subscription, Target, WeakStore};
use crate::error::Result;
use crate::reactive::{HookId, TrackingContext};
use crate::scheduler::{Queue, Task, TaskKey};
use crate::tree::{path, DiffAction, DiffEntry};

/// Who performed a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteSource {
    /// Application code.
    #[default]
    User,
    /// The write-back of an access hook result.
    Get,
}

/// One diff entry together with the source of the write that produced it.
#[derive(Debug, Clone)]
pub(crate) struct Change {
    pub entry: DiffEntry,
    pub src: WriteSource,
}

type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

pub(crate) struct ChangeHookItem {
    callback: ChangeCallback,
    queue: Queue,
}

/// Payload handed to a change hook.
#[derive(Clone)]
pub struct ChangeEvent {
    /// Key the hook was registered under.
    pub key: String,
    /// Current value at `key`, read when the hook runs. The root for `*`.
    pub val: Option<Value>,
    /// Whether an access hook is still loading `key`.
    pub loading: bool,
    pub src: WriteSource,
    pub diff: DiffQuery,
}

impl fmt::Debug for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("key", &self.key)
            .field("val", &self.val)
            .field("loading", &self.loading)
            .field("src", &self.src)
            .field("diff", &self.diff.entries())
            .finish()
    }
}

/// The diff entries relevant to one change hook.
#[derive(Clone)]
pub struct DiffQuery {
    entries: Arc<[DiffEntry]>,
    store: WeakStore,
}

impl DiffQuery {
    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Visit every distinct prefix matching `pattern`.
    ///
    /// `pattern` is a dot path in which `*` matches any single segment. An
    /// entry matches if its first segments match the pattern; the visited
    /// key is that matched prefix, so `items.*` visits `items.3` once no
    /// matter how many leaves below it changed. The action is shared by
    /// all of the prefix's entries, or `Update` if they differ.
    ///
    /// If `visit` returns a future, its output (when `Some`) is written to
    /// the visited key once it resolves. Returns the number of prefixes
    /// visited.
    pub fn query<F>(&self, pattern: &str, mut visit: F) -> usize
    where
        F: FnMut(&str, Option<Value>, DiffAction) -> Option<BoxFuture<'static, Option<Value>>>,
    {
        let Some(store) = self.store.upgrade() else {
            return 0;
        };
        let wanted = path::split(pattern);

        let mut matched: IndexMap<String, DiffAction> = IndexMap::new();
        for entry in self.entries.iter() {
            let segments = path::split(&entry.path);
            if segments.len() < wanted.len() {
                continue;
            }
            let hit = wanted
                .iter()
                .zip(&segments)
                .all(|(want, have)| *want == path::WILDCARD || want == have);
            if !hit {
                continue;
            }
            let prefix = segments[..wanted.len()].join(".");
            matched
                .entry(prefix)
                .and_modify(|action| {
                    if *action != entry.action {
                        *action = DiffAction::Update;
                    }
                })
                .or_insert(entry.action);
        }

        for (key, action) in &matched {
            let val = store.peek(key);
            let Some(pending) = visit(key, val, *action) else {
                continue;
            };
            let weak = store.downgrade();
            let key = key.clone();
            store.spawn(async move {
                let Some(value) = pending.await else { return };
                if let Some(store) = weak.upgrade() {
                    if let Err(err) = store.set(&key, value) {
                        tracing::error!(key = %key, error = %err, "diff query write-back failed");
                    }
                }
            });
        }
        matched.len()
    }
}

impl fmt::Debug for DiffQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffQuery").field("entries", &self.entries).finish()
    }
}

impl Store {
    /// Call `callback` whenever `key` changes, on the default queue.
    ///
    /// `key` may be `*` to observe every write.
    pub fn on_change<F>(&self, key: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.on_change_with(key, None, callback)
    }

    /// Like [`Store::on_change`], on an explicit queue.
    pub fn on_change_with<F>(
        &self,
        key: &str,
        queue: Option<Queue>,
        callback: F,
    ) -> Result<Subscription>
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        if key != path::WILDCARD {
            path::validate(key)?;
        }
        let id = HookId::new();
        let item = ChangeHookItem {
            callback: Arc::new(callback),
            queue: queue.unwrap_or(self.inner.config.default_queue),
        };
        self.inner
            .change_hooks
            .lock()
            .entry(key.to_string())
            .or_default()
            .insert(id, item);
        debug!(key, ?id, "change hook registered");

        Ok(Subscription::new(
            self.downgrade(),
            Target::Change {
                path: key.to_string(),
                id,
            },
        ))
    }

    pub(super) fn remove_change_hook(&self, key: &str, id: HookId) {
        remove_hook(&mut self.inner.change_hooks.lock(), key, id);
        debug!(key, ?id, "change hook removed");
    }

    fn change_callback(&self, key: &str, id: HookId) -> Option<ChangeCallback> {
        self.inner
            .change_hooks
            .lock()
            .get(key)
            .and_then(|items| items.get(&id))
            .map(|item| item.callback.clone())
    }

    /// Deliver `changes` to tracker owners and change hooks.
    pub(crate) fn run_change_hooks(&self, changes: Vec<Change>) {
        if changes.is_empty() {
            return;
        }
        self.invalidate_owners(&changes);

        let changes: Arc<[Change]> = changes.into();
        let registered: IndexMap<String, Vec<(HookId, Queue)>> = self
            .inner
            .change_hooks
            .lock()
            .iter()
            .map(|(key, items)| {
                let hooks = items.iter().map(|(id, item)| (*id, item.queue)).collect();
                (key.clone(), hooks)
            })
            .collect();
        if registered.is_empty() {
            return;
        }

        // Affected key -> source of the last change that reached it
        let mut affected: IndexMap<&str, WriteSource> = IndexMap::new();
        for change in changes.iter() {
            let at = change.entry.path.as_str();
            for key in std::iter::once(at).chain(path::ancestors(at)) {
                affected.insert(key, change.src);
            }
            for key in registered.keys() {
                if path::is_descendant(key, at) {
                    affected.insert(key.as_str(), change.src);
                }
            }
            affected.insert(path::WILDCARD, change.src);
        }

        for (key, src) in affected {
            let Some(hooks) = registered.get(key) else {
                continue;
            };
            let relevant: Arc<[DiffEntry]> = changes
                .iter()
                .filter(|change| touches(key, &change.entry.path))
                .map(|change| change.entry.clone())
                .collect();
            for &(id, queue) in hooks {
                self.schedule_change_hook(key, id, queue, src, relevant.clone());
            }
        }
    }

    fn schedule_change_hook(
        &self,
        key: &str,
        id: HookId,
        queue: Queue,
        src: WriteSource,
        entries: Arc<[DiffEntry]>,
    ) {
        let weak = self.downgrade();
        let key = key.to_string();
        let task = Task::keyed(TaskKey::Hook(id), move || {
            let Some(store) = weak.upgrade() else { return };
            // Removed between scheduling and running
            let Some(callback) = store.change_callback(&key, id) else {
                return;
            };
            let read_at = if key == path::WILDCARD { path::ROOT } else { key.as_str() };
            let event = ChangeEvent {
                val: store.peek(read_at),
                loading: store.is_loading(read_at),
                src,
                diff: DiffQuery {
                    entries,
                    store: store.downgrade(),
                },
                key,
            };
            callback(&event);
        });
        self.inner.scheduler.schedule(task, queue);
    }

    fn invalidate_owners(&self, changes: &[Change]) {
        let changed: IndexSet<&str> = changes.iter().map(|c| c.entry.path.as_str()).collect();
        let changed: Vec<&str> = changed.into_iter().collect();
        let invalidations = self
            .inner
            .tracker
            .lock()
            .invalidations(&changed, TrackingContext::is_running);

        for inv in invalidations {
            if inv.lazy {
                inv.invalidate.notify();
                continue;
            }
            let invalidate = inv.invalidate;
            let task = Task::keyed(TaskKey::Owner(inv.owner), move || invalidate.notify());
            self.inner.scheduler.schedule(task, self.inner.config.default_queue);
        }
    }
}

/// Whether a change at `changed` is visible from hook key `key`.
fn touches(key: &str, changed: &str) -> bool {
    key == path::WILDCARD
        || key == changed
        || path::is_descendant(changed, key)
        || path::is_descendant(key, changed)
}
