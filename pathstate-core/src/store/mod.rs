//! Store
//!
//! The store owns one state tree and everything needed to react to it:
//!
//! - reads resolve a path, run access hooks, and record the read against
//!   the owner currently tracking (see [`Store::track_access`])
//! - writes diff the new value against the old one, mutate the tree in
//!   place, and hand the diff to the change notifier (or to the open batch)
//!
//! A `Store` is a cheap handle. Clones share the same tree.
//!
//! # Deferred work
//!
//! A store built with [`Store::new`] owns its [`QueueScheduler`]. Micro work
//! it queues (access hook write-backs, hooks on the micro queue) runs when
//! the outermost store call returns; later queues run on [`Store::flush`]
//! or [`QueueScheduler::run_frames`]. A store given an outside scheduler
//! leaves all of that to the host.
//!
//! # Locking
//!
//! Internal locks are only held for bookkeeping. No user callback (change
//! hook, access hook, tracked run, updater) is ever called with a lock
//! held, so callbacks may read and write the store freely.

mod access;
mod batch;
mod model;
mod notify;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{kind_of, HookError, Result, StoreError};
use crate::reactive::{Invalidate, OwnerId, Snapshot, StoreId, Tracker, TrackingContext};
use crate::scheduler::{QueueScheduler, Scheduler};
use crate::tree::{diff_values, path};

pub use access::{AccessCacheEntry, AccessContext, AccessResult};
pub use model::Collection;
pub use notify::{ChangeEvent, DiffQuery, WriteSource};

use access::AccessHookItem;
use batch::Batch;
use notify::{Change, ChangeHookItem};

type HookRegistry<T> = HashMap<String, IndexMap<crate::reactive::HookId, T>>;

pub(crate) struct StoreInner {
    id: StoreId,
    config: StoreConfig,
    scheduler: Arc<dyn Scheduler>,
    /// Set when the store created its own scheduler.
    local: Option<Arc<QueueScheduler>>,
    draining: AtomicBool,
    tree: Mutex<Value>,
    tracker: Mutex<Tracker>,
    change_hooks: Mutex<HookRegistry<ChangeHookItem>>,
    access_hooks: Mutex<HookRegistry<AccessHookItem>>,
    access_cache: DashMap<u64, AccessCacheEntry>,
    batch: Mutex<Batch>,
    models: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

/// Handle to a reactive path-addressed state tree.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning handle, used by callbacks the store itself keeps alive.
#[derive(Clone)]
pub struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.0.upgrade().map(|inner| Store { inner })
    }
}

/// Options for reads.
#[derive(Debug, Clone)]
pub struct GetOptions {
    /// Record the read against the active tracker.
    pub track: bool,
    /// Run access hooks.
    pub hooks: bool,
    /// Re-run an access hook even if it already ran for this query.
    pub refresh: bool,
    /// Passed to access hooks; part of their cache key.
    pub query: Option<Value>,
    /// Returned when nothing is stored at the path.
    pub default: Option<Value>,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            track: true,
            hooks: true,
            refresh: false,
            query: None,
            default: None,
        }
    }
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn untracked(mut self) -> Self {
        self.track = false;
        self
    }

    pub fn without_hooks(mut self) -> Self {
        self.hooks = false;
        self
    }

    pub fn refresh(mut self) -> Self {
        self.refresh = true;
        self
    }

    pub fn query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    pub fn or_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Options for writes.
#[derive(Debug, Clone)]
pub struct SetOptions {
    /// Concatenate arrays / shallow-assign objects onto the current value.
    pub merge: bool,
    /// Deliver change notifications.
    pub notify: bool,
    pub src: WriteSource,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            merge: false,
            notify: true,
            src: WriteSource::User,
        }
    }
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(mut self) -> Self {
        self.merge = true;
        self
    }

    pub fn silent(mut self) -> Self {
        self.notify = false;
        self
    }

    pub fn source(mut self, src: WriteSource) -> Self {
        self.src = src;
        self
    }
}

/// A read together with the status of the access hook behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Meta {
    pub data: Option<Value>,
    pub loading: bool,
    pub error: Option<HookError>,
}

impl Store {
    /// A store with the default config and its own [`QueueScheduler`].
    pub fn new() -> Self {
        let local = Arc::new(QueueScheduler::new());
        Self::build(StoreConfig::default(), local.clone(), Some(local))
    }

    /// A store with the default config and the given scheduler.
    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::build(StoreConfig::default(), scheduler, None)
    }

    pub fn with_config(config: StoreConfig, scheduler: Arc<dyn Scheduler>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, scheduler, None))
    }

    fn build(
        config: StoreConfig,
        scheduler: Arc<dyn Scheduler>,
        local: Option<Arc<QueueScheduler>>,
    ) -> Self {
        let tracker = Tracker::new(config.backend.build());
        let tree = config.initial_state.clone();
        Self {
            inner: Arc::new(StoreInner {
                id: StoreId::new(),
                config,
                scheduler,
                local,
                draining: AtomicBool::new(false),
                tree: Mutex::new(tree),
                tracker: Mutex::new(tracker),
                change_hooks: Mutex::new(HashMap::new()),
                access_hooks: Mutex::new(HashMap::new()),
                access_cache: DashMap::new(),
                batch: Mutex::new(Batch::default()),
                models: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.inner.scheduler.clone()
    }

    /// The scheduler this store created for itself, if it did.
    pub fn queue_scheduler(&self) -> Option<Arc<QueueScheduler>> {
        self.inner.local.clone()
    }

    /// Run every queued task of the store's own scheduler. Returns how
    /// many ran; always 0 for a store with an outside scheduler.
    pub fn flush(&self) -> usize {
        self.inner.local.as_ref().map_or(0, |local| local.flush())
    }

    /// Run pending micro work once no store call is in progress.
    fn settle(&self) {
        let Some(local) = &self.inner.local else {
            return;
        };
        if self.in_batch() || TrackingContext::is_active() {
            return;
        }
        if self.inner.draining.swap(true, Ordering::SeqCst) {
            return;
        }
        let _draining = Draining(&self.inner.draining);
        let ran = local.flush_micro();
        if ran > 0 {
            tracing::trace!(ran, "micro work settled");
        }
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read `path`: tracked, with access hooks.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.get_with(path, &GetOptions::default())
    }

    pub fn get_with(&self, path: &str, opts: &GetOptions) -> Option<Value> {
        if opts.track {
            self.track_path(path);
        }
        let supplied = if opts.hooks {
            self.run_access_hooks(path, opts)
        } else {
            None
        };
        let value = supplied.unwrap_or_else(|| self.peek(path));
        self.settle();
        value.or_else(|| opts.default.clone())
    }

    /// Read `path` and report the loading state of its access hook.
    pub fn get_meta(&self, path: &str, opts: &GetOptions) -> Meta {
        let data = self.get_with(path, opts);
        let (loading, error) = self.access_status(path, opts.query.as_ref());
        Meta {
            data,
            loading,
            error,
        }
    }

    /// Read `path` without tracking and without access hooks.
    pub fn peek(&self, path: &str) -> Option<Value> {
        path::get(&self.inner.tree.lock(), path).cloned()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write `value` at `path`. Returns the value now stored there.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        self.set_with(path, Some(value.into()), &SetOptions::default())
    }

    /// Write `value` at `path`; `None` removes it.
    pub fn set_with(
        &self,
        path: &str,
        value: Option<Value>,
        opts: &SetOptions,
    ) -> Result<Option<Value>> {
        self.write(path, |_| value, opts)
    }

    /// Write the result of `updater`, which receives a copy of the current
    /// value.
    pub fn update<F>(&self, path: &str, updater: F, opts: &SetOptions) -> Result<Option<Value>>
    where
        F: FnOnce(Option<Value>) -> Option<Value>,
    {
        self.write(path, updater, opts)
    }

    /// Concatenate (arrays) or shallow-assign (objects) onto `path`.
    pub fn merge(&self, path: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        self.merge_with(path, value, &SetOptions::default())
    }

    pub fn merge_with(
        &self,
        path: &str,
        value: impl Into<Value>,
        opts: &SetOptions,
    ) -> Result<Option<Value>> {
        let opts = SetOptions {
            merge: true,
            ..opts.clone()
        };
        self.set_with(path, Some(value.into()), &opts)
    }

    /// Remove whatever is stored at `path`.
    pub fn del(&self, path: &str) -> Result<Option<Value>> {
        self.del_with(path, &SetOptions::default())
    }

    pub fn del_with(&self, path: &str, opts: &SetOptions) -> Result<Option<Value>> {
        self.set_with(path, None, opts)
    }

    fn write<F>(&self, target: &str, updater: F, opts: &SetOptions) -> Result<Option<Value>>
    where
        F: FnOnce(Option<Value>) -> Option<Value>,
    {
        path::validate(target)?;
        let current = self.peek(target);
        let mut next = updater(current.clone());
        if opts.merge {
            next = merged(current.as_ref(), next);
        }
        if target.is_empty() && !matches!(next, Some(Value::Object(_))) {
            return Err(StoreError::RootNotObject {
                found: kind_of(next.as_ref()),
            });
        }

        let entries = diff_values(current.as_ref(), next.as_ref(), target);
        if entries.is_empty() {
            return Ok(current);
        }

        {
            let mut tree = self.inner.tree.lock();
            match &next {
                Some(value) => path::set(&mut tree, target, value.clone())?,
                None => {
                    path::remove(&mut tree, target);
                }
            }
        }
        debug!(path = target, changes = entries.len(), src = ?opts.src, "store write");

        if opts.notify {
            let changes = entries
                .into_iter()
                .map(|entry| Change {
                    entry,
                    src: opts.src,
                })
                .collect();
            self.dispatch(changes);
        }
        self.settle();
        Ok(next)
    }

    // ------------------------------------------------------------------
    // Dependency tracking
    // ------------------------------------------------------------------

    /// Run `run` as `owner`, recording every path it reads.
    ///
    /// `run` returns the callback to invoke when any of those paths
    /// changes. If it fails (or panics), the owner's previous dependencies
    /// and callback are restored and the error is returned.
    pub fn track_access<E, F>(&self, owner: OwnerId, run: F) -> std::result::Result<(), E>
    where
        F: FnOnce() -> std::result::Result<Invalidate, E>,
    {
        let snapshot = self.inner.tracker.lock().begin(owner);
        let mut rollback = Rollback {
            store: self,
            owner,
            snapshot: Some(snapshot),
        };

        let outcome = {
            let _ctx = TrackingContext::enter(self.inner.id, owner);
            run()
        };

        let result = match outcome {
            Ok(invalidate) => {
                rollback.snapshot = None;
                self.inner.tracker.lock().commit(owner, invalidate);
                Ok(())
            }
            Err(err) => {
                debug!(owner = owner.raw(), "tracked run failed, restoring dependencies");
                drop(rollback);
                Err(err)
            }
        };
        self.settle();
        result
    }

    /// Remove `owner` and all of its subscriptions.
    pub fn dispose(&self, owner: OwnerId) -> bool {
        self.inner.tracker.lock().dispose(owner)
    }

    /// Record a read of `path` against the active owner, if there is one.
    pub fn track_path(&self, path: &str) {
        if let Some(owner) = TrackingContext::current_owner(self.inner.id) {
            self.inner.tracker.lock().record(owner, path);
        }
    }

    /// Run `f` without recording any reads from this store.
    pub fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
        let _ctx = TrackingContext::untracked(self.inner.id);
        f()
    }

    /// Paths `owner` depended on after its last successful run.
    pub fn tracked_paths(&self, owner: OwnerId) -> Vec<String> {
        self.inner
            .tracker
            .lock()
            .item(owner)
            .map(|item| item.deps().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of paths the dependency graph keeps state for.
    pub fn tracked_path_count(&self) -> usize {
        self.inner.tracker.lock().graph().path_count()
    }

    pub(crate) fn mark_lazy(&self, owner: OwnerId) {
        self.inner.tracker.lock().set_lazy(owner);
    }

    // ------------------------------------------------------------------
    // Async plumbing
    // ------------------------------------------------------------------

    /// Spawn `task` on the ambient tokio runtime. Returns false if there is
    /// none.
    pub(crate) fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
                true
            }
            Err(_) => {
                tracing::warn!("no tokio runtime available, dropping async store work");
                false
            }
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Clears the store's draining flag, also on unwind.
struct Draining<'a>(&'a AtomicBool);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Restores an owner's tracking state unless disarmed.
struct Rollback<'a> {
    store: &'a Store,
    owner: OwnerId,
    snapshot: Option<Snapshot>,
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.store.inner.tracker.lock().rollback(self.owner, snapshot);
        }
    }
}

fn merged(current: Option<&Value>, next: Option<Value>) -> Option<Value> {
    match (current, next) {
        (Some(Value::Array(old)), Some(Value::Array(new))) => {
            Some(Value::Array(old.iter().cloned().chain(new).collect()))
        }
        (Some(Value::Object(old)), Some(Value::Object(new))) => {
            let mut out = old.clone();
            out.extend(new);
            Some(Value::Object(out))
        }
        (_, next) => next,
    }
}

/// Handle for a change or access hook registration.
///
/// Dropping the handle removes the hook. Call [`Subscription::detach`] to
/// keep it for the lifetime of the store instead.
pub struct Subscription {
    store: WeakStore,
    target: Target,
    active: bool,
}

enum Target {
    Change { path: String, id: crate::reactive::HookId },
    Access { path: String, id: crate::reactive::HookId },
}

impl Subscription {
    fn new(store: WeakStore, target: Target) -> Self {
        Self {
            store,
            target,
            active: true,
        }
    }

    pub fn id(&self) -> crate::reactive::HookId {
        match &self.target {
            Target::Change { id, .. } | Target::Access { id, .. } => *id,
        }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the hook registered after this handle is gone.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) {
        if !std::mem::take(&mut self.active) {
            return;
        }
        let Some(store) = self.store.upgrade() else {
            return;
        };
        match &self.target {
            Target::Change { path, id } => store.remove_change_hook(path, *id),
            Target::Access { path, id } => store.remove_access_hook(path, *id),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, path) = match &self.target {
            Target::Change { path, .. } => ("change", path),
            Target::Access { path, .. } => ("access", path),
        };
        f.debug_struct("Subscription")
            .field("kind", &kind)
            .field("path", path)
            .field("active", &self.active)
            .finish()
    }
}

fn remove_hook<T>(registry: &mut HookRegistry<T>, path: &str, id: crate::reactive::HookId) {
    if let Some(items) = registry.get_mut(path) {
        items.shift_remove(&id);
        if items.is_empty() {
            registry.remove(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn set_then_get_round_trips() {
        let store = Store::new();
        store.set("a.b", 5).unwrap();
        assert_eq!(store.get("a.b"), Some(json!(5)));
        assert_eq!(store.get("a"), Some(json!({"b": 5})));
    }

    #[test]
    fn returned_values_are_copies() {
        let store = Store::new();
        store.set("a.b", json!({"list": [1]})).unwrap();

        let mut copy = store.get("a.b").unwrap();
        copy["list"] = json!([9, 9]);

        assert_eq!(store.get("a.b"), Some(json!({"list": [1]})));
    }

    #[test]
    fn default_applies_to_missing_paths() {
        let store = Store::new();
        let opts = GetOptions::new().or_default(json!("fallback"));
        assert_eq!(store.get_with("missing", &opts), Some(json!("fallback")));
    }

    #[test]
    fn updater_receives_current_value() {
        let store = Store::new();
        store.set("count", 1).unwrap();

        let written = store
            .update(
                "count",
                |current| current.and_then(|v| v.as_i64()).map(|n| json!(n + 1)),
                &SetOptions::default(),
            )
            .unwrap();

        assert_eq!(written, Some(json!(2)));
        assert_eq!(store.get("count"), Some(json!(2)));
    }

    #[test]
    fn merge_concats_arrays_and_assigns_objects() {
        let store = Store::new();
        store.set("list", json!([1, 2])).unwrap();
        store.merge("list", json!([3])).unwrap();
        assert_eq!(store.get("list"), Some(json!([1, 2, 3])));

        store.set("obj", json!({"a": 1, "b": 1})).unwrap();
        store.merge("obj", json!({"b": 2, "c": 3})).unwrap();
        assert_eq!(store.get("obj"), Some(json!({"a": 1, "b": 2, "c": 3})));

        // Mismatched kinds replace
        store.merge("obj", json!([1])).unwrap();
        assert_eq!(store.get("obj"), Some(json!([1])));
    }

    #[test]
    fn del_removes_value() {
        let store = Store::new();
        store.set("a", json!({"b": 1, "c": 2})).unwrap();
        assert_eq!(store.del("a.b").unwrap(), None);
        assert_eq!(store.get("a"), Some(json!({"c": 2})));
    }

    #[test]
    fn root_writes_require_objects() {
        let store = Store::new();
        assert!(matches!(
            store.set("", 5),
            Err(StoreError::RootNotObject { found: "a number" })
        ));
        assert!(store.del("").is_err());

        store.set("", json!({"fresh": true})).unwrap();
        assert_eq!(store.get(""), Some(json!({"fresh": true})));
    }

    #[test]
    fn invalid_paths_are_rejected() {
        let store = Store::new();
        assert!(matches!(store.set("a..b", 1), Err(StoreError::InvalidPath { .. })));
    }

    #[test]
    fn unchanged_write_returns_current_value() {
        let store = Store::new();
        store.set("x", json!({"a": 1})).unwrap();
        let result = store.set("x", json!({"a": 1})).unwrap();
        assert_eq!(result, Some(json!({"a": 1})));
    }

    #[test]
    fn track_access_records_reads() {
        let store = Store::new();
        let owner = OwnerId::new();

        store
            .track_access(owner, || {
                store.get("a");
                store.get_with("b", &GetOptions::new().untracked());
                store.untracked(|| store.get("c"));
                Ok::<_, Infallible>(Invalidate::noop())
            })
            .unwrap();

        assert_eq!(store.tracked_paths(owner), vec!["a".to_string()]);
    }

    #[test]
    fn nested_tracking_attributes_reads_to_the_inner_owner() {
        let store = Store::new();
        let outer = OwnerId::new();
        let inner = OwnerId::new();

        store
            .track_access(outer, || {
                store.get("outer.before");
                store
                    .track_access(inner, || {
                        store.get("inner.only");
                        Ok::<_, Infallible>(Invalidate::noop())
                    })
                    .unwrap();
                store.get("outer.after");
                Ok::<_, Infallible>(Invalidate::noop())
            })
            .unwrap();

        assert_eq!(store.tracked_paths(outer), vec!["outer.before", "outer.after"]);
        assert_eq!(store.tracked_paths(inner), vec!["inner.only"]);
    }

    #[test]
    fn panicking_run_is_rolled_back() {
        let store = Store::new();
        let owner = OwnerId::new();
        let calls = Arc::new(AtomicI32::new(0));

        let fail = true;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = store.track_access(owner, || {
                store.get("z");
                if fail {
                    panic!("render failed");
                }
                Ok::<_, Infallible>(Invalidate::noop())
            });
        }));
        assert!(result.is_err());

        let calls_clone = calls.clone();
        store
            .track_access(owner, move || {
                Ok::<_, Infallible>(Invalidate::new(move || {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                }))
            })
            .unwrap();

        store.set("z", 1).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.tracked_path_count(), 0);
    }

    #[test]
    fn owned_scheduler_settles_micro_work() {
        use crate::scheduler::Queue;

        let store = Store::new();
        let micro = Arc::new(Mutex::new(Vec::new()));
        let deferred = Arc::new(Mutex::new(Vec::new()));
        let (micro_clone, deferred_clone) = (micro.clone(), deferred.clone());
        let _micro = store
            .on_change_with("n", Some(Queue::Micro), move |event| {
                micro_clone.lock().push(event.val.clone())
            })
            .unwrap();
        let _deferred = store
            .on_change_with("n", Some(Queue::Macro), move |event| {
                deferred_clone.lock().push(event.val.clone())
            })
            .unwrap();

        store.set("n", 1).unwrap();
        assert_eq!(*micro.lock(), vec![Some(json!(1))]);
        assert!(deferred.lock().is_empty());

        store
            .batch(|| {
                store.set("n", 2)?;
                store.set("n", 3)
            })
            .unwrap();
        assert_eq!(*micro.lock(), vec![Some(json!(1)), Some(json!(3))]);

        // Macro work waits for an explicit flush
        assert_eq!(store.flush(), 1);
        assert_eq!(*deferred.lock(), vec![Some(json!(3))]);
    }

    #[test]
    fn outside_scheduler_is_left_to_the_host() {
        let scheduler = Arc::new(QueueScheduler::new());
        let store = Store::with_scheduler(scheduler.clone());
        assert!(store.queue_scheduler().is_none());
        assert_eq!(store.flush(), 0);
        assert!(Store::new().queue_scheduler().is_some());
    }

    #[test]
    fn dispose_removes_every_subscription() {
        let store = Store::new();
        let owner = OwnerId::new();

        store
            .track_access(owner, || {
                store.get("a.b");
                store.get("c");
                Ok::<_, Infallible>(Invalidate::noop())
            })
            .unwrap();
        assert_eq!(store.tracked_path_count(), 2);

        assert!(store.dispose(owner));
        assert_eq!(store.tracked_path_count(), 0);
    }
}
