//! Access Hook Runner
//!
//! An access hook populates a path the first time it is read. When `get`
//! reads a key, the runner looks for hooks registered at the key itself
//! and then at each of its ancestors, and calls the first one whose cache
//! entry has not run yet (or every time, on refresh).
//!
//! # Cache
//!
//! Entries are keyed by a hash of the hook path and the read's query, and
//! record whether the hook ran, whether it is still loading, and the error
//! it failed with. Errors never propagate to the reader; they are logged
//! and reported through [`Store::get_meta`].
//!
//! # Results
//!
//! - `Value`: returned to the current read directly, and written back to
//!   the tree on the configured write-back queue
//! - `Pending`: spawned on the tokio runtime; the resolved value is written
//!   with `set`
//! - `Paged`: spawned; the first page is written with `set`, later pages
//!   with `merge`
//!
//! Every write-back uses [`WriteSource::Get`].

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::SystemTime;

use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, error};

use super::{remove_hook, GetOptions, SetOptions, Store, Subscription, Target, WriteSource};
use crate::error::{HookError, Result};
use crate::reactive::HookId;
use crate::scheduler::Task;
use crate::tree::path;

/// What an access hook produced.
pub enum AccessResult {
    /// Nothing to supply; the read falls back to the tree.
    Skip,
    /// A value available right away.
    Value(Value),
    /// A value that will be available later.
    Pending(BoxFuture<'static, std::result::Result<Value, HookError>>),
    /// A sequence of pages.
    Paged(BoxStream<'static, std::result::Result<Value, HookError>>),
}

impl AccessResult {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = std::result::Result<Value, HookError>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    pub fn paged<S>(pages: S) -> Self
    where
        S: Stream<Item = std::result::Result<Value, HookError>> + Send + 'static,
    {
        Self::Paged(Box::pin(pages))
    }
}

impl fmt::Debug for AccessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => f.write_str("Skip"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
            Self::Paged(_) => f.write_str("Paged(..)"),
        }
    }
}

/// Arguments passed to an access hook.
#[derive(Debug, Clone)]
pub struct AccessContext {
    /// The key being read.
    pub key: String,
    /// The path the hook is registered at; `key` is at or below it.
    pub path: String,
    /// Current value at `path`.
    pub val: Option<Value>,
    pub query: Option<Value>,
    pub refresh: bool,
    /// When this hook last ran for the same query.
    pub last_refresh: Option<SystemTime>,
    /// Handle for hooks that want to write more than their own result.
    pub store: Store,
}

type AccessCallback = Arc<dyn Fn(&AccessContext) -> AccessResult + Send + Sync>;

pub(crate) struct AccessHookItem {
    callback: AccessCallback,
}

/// Run state of one hook for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessCacheEntry {
    pub path: String,
    pub run: bool,
    pub loading: bool,
    pub error: Option<HookError>,
    pub last_refresh: Option<SystemTime>,
}

impl AccessCacheEntry {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            run: false,
            loading: false,
            error: None,
            last_refresh: None,
        }
    }
}

fn cache_key(path: &str, query: Option<&Value>) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    query.map(Value::to_string).hash(&mut hasher);
    hasher.finish()
}

impl Store {
    /// Populate `key` (and everything below it) on read.
    ///
    /// Only the most recently registered hook at a path is active.
    pub fn on_access<F>(&self, key: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(&AccessContext) -> AccessResult + Send + Sync + 'static,
    {
        path::validate(key)?;
        let id = HookId::new();
        self.inner
            .access_hooks
            .lock()
            .entry(key.to_string())
            .or_default()
            .insert(
                id,
                AccessHookItem {
                    callback: Arc::new(callback),
                },
            );
        debug!(key, ?id, "access hook registered");

        Ok(Subscription::new(
            self.downgrade(),
            Target::Access {
                path: key.to_string(),
                id,
            },
        ))
    }

    pub(super) fn remove_access_hook(&self, key: &str, id: HookId) {
        let orphaned = {
            let mut hooks = self.inner.access_hooks.lock();
            remove_hook(&mut hooks, key, id);
            !hooks.contains_key(key)
        };
        if orphaned {
            self.inner.access_cache.retain(|_, entry| entry.path != key);
        }
        debug!(key, ?id, orphaned, "access hook removed");
    }

    /// Run the hook responsible for `key`, if any is due.
    ///
    /// Returns `Some` when a hook supplied the value for this read
    /// synchronously.
    pub(super) fn run_access_hooks(&self, key: &str, opts: &GetOptions) -> Option<Option<Value>> {
        let candidates: Vec<(String, AccessCallback)> = {
            let hooks = self.inner.access_hooks.lock();
            if hooks.is_empty() {
                return None;
            }
            std::iter::once(key)
                .chain(path::ancestors(key))
                .filter_map(|at| {
                    let (_, item) = hooks.get(at)?.last()?;
                    Some((at.to_string(), item.callback.clone()))
                })
                .collect()
        };

        for (hook_path, callback) in candidates {
            let entry_key = cache_key(&hook_path, opts.query.as_ref());
            let last_refresh = {
                let mut entry = self
                    .inner
                    .access_cache
                    .entry(entry_key)
                    .or_insert_with(|| AccessCacheEntry::new(&hook_path));
                if entry.run && !opts.refresh {
                    continue;
                }
                entry.run = true;
                entry.last_refresh.replace(SystemTime::now())
            };

            let ctx = AccessContext {
                key: key.to_string(),
                path: hook_path.clone(),
                val: self.peek(&hook_path),
                query: opts.query.clone(),
                refresh: opts.refresh,
                last_refresh,
                store: self.clone(),
            };
            let result = self.untracked(|| callback(&ctx));
            debug!(key, hook = %hook_path, ?result, "access hook ran");

            return match result {
                AccessResult::Skip => None,
                AccessResult::Value(value) => {
                    let scoped = path::relative(key, &hook_path)
                        .and_then(|rel| path::get(&value, rel))
                        .cloned();
                    self.write_back(hook_path, value);
                    Some(scoped)
                }
                AccessResult::Pending(future) => {
                    self.load(entry_key, hook_path, stream::once(future).boxed(), true);
                    None
                }
                AccessResult::Paged(pages) => {
                    self.load(entry_key, hook_path, pages, false);
                    None
                }
            };
        }
        None
    }

    /// Whether any hook at or above `key` is loading.
    pub fn is_loading(&self, key: &str) -> bool {
        self.inner.access_cache.iter().any(|entry| {
            entry.loading && (entry.path == key || path::is_descendant(key, &entry.path))
        })
    }

    /// Loading state and last error of the most specific hook at or above
    /// `key` that ran for `query`.
    pub fn access_status(&self, key: &str, query: Option<&Value>) -> (bool, Option<HookError>) {
        std::iter::once(key)
            .chain(path::ancestors(key))
            .find_map(|at| {
                let entry = self.inner.access_cache.get(&cache_key(at, query))?;
                Some((entry.loading, entry.error.clone()))
            })
            .unwrap_or((false, None))
    }

    /// Cache entry of the hook at `path` for `query`.
    pub fn access_entry(&self, path: &str, query: Option<&Value>) -> Option<AccessCacheEntry> {
        self.inner
            .access_cache
            .get(&cache_key(path, query))
            .map(|entry| entry.clone())
    }

    fn write_back(&self, target: String, value: Value) {
        let weak = self.downgrade();
        let task = Task::new(move || {
            let Some(store) = weak.upgrade() else { return };
            let opts = SetOptions::new().source(WriteSource::Get);
            if let Err(err) = store.set_with(&target, Some(value), &opts) {
                error!(path = %target, error = %err, "access hook write-back failed");
            }
        });
        self.inner
            .scheduler
            .schedule(task, self.inner.config.hook_write_queue);
    }

    fn load(
        &self,
        entry_key: u64,
        target: String,
        mut pages: BoxStream<'static, std::result::Result<Value, HookError>>,
        single: bool,
    ) {
        if let Some(mut entry) = self.inner.access_cache.get_mut(&entry_key) {
            entry.loading = true;
            entry.error = None;
        }

        let weak = self.downgrade();
        let task_target = target.clone();
        let spawned = self.spawn(async move {
            let target = task_target;
            let mut first = true;
            while let Some(page) = pages.next().await {
                let Some(store) = weak.upgrade() else { return };
                let value = match page {
                    Ok(value) => value,
                    Err(err) => {
                        store.fail_load(entry_key, &target, err);
                        return;
                    }
                };
                if single {
                    store.finish_load(entry_key);
                }
                let opts = SetOptions::new().source(WriteSource::Get);
                let written = if first {
                    store.set_with(&target, Some(value), &opts)
                } else {
                    store.merge_with(&target, value, &opts)
                };
                first = false;
                if let Err(err) = written {
                    store.fail_load(entry_key, &target, HookError(err.to_string()));
                    return;
                }
            }
            if let Some(store) = weak.upgrade() {
                store.finish_load(entry_key);
            }
        });

        if !spawned {
            self.fail_load(
                entry_key,
                &target,
                HookError::from("no async runtime to resolve the access hook"),
            );
        }
    }

    fn finish_load(&self, entry_key: u64) {
        if let Some(mut entry) = self.inner.access_cache.get_mut(&entry_key) {
            entry.loading = false;
        }
    }

    fn fail_load(&self, entry_key: u64, target: &str, err: HookError) {
        error!(path = target, error = %err, "access hook failed");
        if let Some(mut entry) = self.inner.access_cache.get_mut(&entry_key) {
            entry.loading = false;
            entry.error = Some(err);
        }
    }
}
