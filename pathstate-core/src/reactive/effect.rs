//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the store schedules the effect to re-run
//!    on its default queue. Several changes in the same tick collapse into
//!    one run.
//!
//! 3. Each run tracks its reads afresh, so dependencies that are no longer
//!    read are dropped.
//!
//! An effect is not re-triggered by writes it performs itself while
//! running.
//!
//! # Lifetime
//!
//! The store keeps an effect alive until it is disposed; dropping the
//! handle does not stop it.

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{Invalidate, OwnerId};
use crate::store::{Store, WeakStore};

struct EffectInner {
    owner: OwnerId,
    store: WeakStore,
    run: Box<dyn Fn(&Store) + Send + Sync>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectInner {
    fn execute(self: &Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let Some(store) = self.store.upgrade() else {
            return;
        };

        let this = self.clone();
        let outcome = store.track_access(self.owner, || {
            (self.run)(&store);
            Ok::<_, Infallible>(Invalidate::new(move || this.execute()))
        });
        match outcome {
            Ok(()) => {}
            Err(never) => match never {},
        }
        self.run_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let store = Store::new();
///
/// let effect = store.effect(|s| {
///     println!("Count is: {:?}", s.get("count"));
/// });
///
/// store.set("count", 5)?;  // Prints: "Count is: Some(Number(5))"
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create an effect and run it once.
    pub fn new<F>(store: &Store, run: F) -> Self
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(store, run);
        effect.execute();
        effect
    }

    /// Create an effect without running it. It has no dependencies until
    /// [`Effect::execute`] is called.
    pub fn new_lazy<F>(store: &Store, run: F) -> Self
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EffectInner {
                owner: OwnerId::new(),
                store: store.downgrade(),
                run: Box::new(run),
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.inner.owner
    }

    /// Run the effect now.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Stop the effect and remove all of its subscriptions.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(store) = self.inner.store.upgrade() {
            store.dispose(self.inner.owner);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of paths read by the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .store
            .upgrade()
            .map_or(0, |store| store.tracked_paths(self.inner.owner).len())
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("owner", &self.inner.owner)
            .field("run_count", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Store {
    /// Shorthand for [`Effect::new`].
    pub fn effect<F>(&self, run: F) -> Effect
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        Effect::new(self, run)
    }
}
