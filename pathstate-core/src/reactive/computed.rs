//! Computed Values
//!
//! A computed value derives something from the store and caches it.
//!
//! # How Computed Values Work
//!
//! 1. The first read runs the computation inside `track_access`, so every
//!    path it reads becomes a dependency.
//!
//! 2. Later reads return the cached value while it is clean.
//!
//! 3. A write to any dependency marks it dirty. This happens inline, before
//!    eager owners are scheduled, so nothing can observe a stale value.
//!
//! 4. The next read recomputes.
//!
//! A computed value read inside another tracked run forwards its own
//! dependencies to that run, so an effect reading a computed value re-runs
//! when the computed value's inputs change.

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::{Invalidate, OwnerId};
use crate::error::{Result, StoreError};
use crate::store::Store;

/// Dirty state of a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up to date.
    Clean,
    /// A dependency changed, or the value was never computed.
    Dirty,
}

/// A cached value derived from the store.
#[derive(Clone)]
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    owner: OwnerId,
    store: Store,
    compute: Arc<dyn Fn(&Store) -> T + Send + Sync>,
    value: Arc<Mutex<Option<T>>>,
    state: Arc<Mutex<ComputedState>>,
    computing: Arc<AtomicBool>,
    aborted: Arc<AtomicBool>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a computed value. Nothing runs until the first read.
    pub fn new<F>(store: &Store, compute: F) -> Self
    where
        F: Fn(&Store) -> T + Send + Sync + 'static,
    {
        let owner = OwnerId::new();
        store.mark_lazy(owner);
        Self {
            owner,
            store: store.clone(),
            compute: Arc::new(compute),
            value: Arc::new(Mutex::new(None)),
            state: Arc::new(Mutex::new(ComputedState::Dirty)),
            computing: Arc::new(AtomicBool::new(false)),
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn state(&self) -> ComputedState {
        *self.state.lock()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// The current value, recomputing if dirty.
    ///
    /// Reading a computed value from inside its own computation returns the
    /// previous value, or [`StoreError::CyclicComputed`] if there is none.
    pub fn value(&self) -> Result<T> {
        if self.computing.load(Ordering::SeqCst) {
            warn!(owner = self.owner.raw(), "computed value read itself, returning stale value");
            return self.value.lock().clone().ok_or(StoreError::CyclicComputed);
        }

        // Aborted values no longer cache; reads go to the outer owner directly
        if self.is_aborted() {
            return Ok((self.compute)(&self.store));
        }

        if self.state() == ComputedState::Dirty {
            self.recompute();
        }

        for path in self.store.tracked_paths(self.owner) {
            self.store.track_path(&path);
        }

        self.value.lock().clone().ok_or(StoreError::CyclicComputed)
    }

    fn recompute(&self) {
        let _computing = Computing {
            flag: &self.computing,
            state: &self.state,
        };
        self.computing.store(true, Ordering::SeqCst);
        *self.state.lock() = ComputedState::Clean;

        let mut fresh = None;
        let state = self.state.clone();
        let outcome = self.store.track_access(self.owner, || {
            fresh = Some((self.compute)(&self.store));
            Ok::<_, Infallible>(Invalidate::new(move || {
                *state.lock() = ComputedState::Dirty;
            }))
        });
        match outcome {
            Ok(()) => {}
            Err(never) => match never {},
        }

        if let Some(fresh) = fresh {
            *self.value.lock() = Some(fresh);
        }
    }

    /// Stop tracking. The value is computed on every read from now on.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.store.dispose(self.owner);
        *self.value.lock() = None;
    }
}

impl<T> fmt::Debug for Computed<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("owner", &self.owner)
            .field("state", &self.state())
            .field("value", &*self.value.lock())
            .finish()
    }
}

/// Clears the computing flag; leaves the value dirty if the computation
/// panicked.
struct Computing<'a> {
    flag: &'a AtomicBool,
    state: &'a Mutex<ComputedState>,
}

impl Drop for Computing<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        if std::thread::panicking() {
            *self.state.lock() = ComputedState::Dirty;
        }
    }
}

impl Store {
    /// Shorthand for [`Computed::new`].
    pub fn computed<T, F>(&self, compute: F) -> Computed<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Store) -> T + Send + Sync + 'static,
    {
        Computed::new(self, compute)
    }
}
