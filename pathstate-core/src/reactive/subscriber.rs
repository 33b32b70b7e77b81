//! Owner and hook identifiers, and the invalidation callback.
//!
//! An owner is the registration unit for dependency tracking: a computed
//! value, an effect, a render pass, or anything else that calls
//! [`Store::track_access`](crate::Store::track_access) with its own token.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a tracking owner.
///
/// Each owner gets its own ID. Calling `track_access` again with the same
/// ID reuses the owner's tracker item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Generate a new unique owner ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier handed out for every change or access hook registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl HookId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for HookId {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback produced by a tracked run, invoked when one of the paths read
/// during that run changes.
///
/// Cloning shares the same callback.
#[derive(Clone)]
pub struct Invalidate {
    notify: Arc<dyn Fn() + Send + Sync>,
}

impl Invalidate {
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            notify: Arc::new(notify),
        }
    }

    /// A callback that does nothing. Useful for owners that only need the
    /// dependency bookkeeping.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Notify the owner that one of its dependencies changed.
    pub fn notify(&self) {
        (self.notify)();
    }

    /// Whether two handles share the same callback.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.notify, &other.notify)
    }
}

impl fmt::Debug for Invalidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_ids_are_unique() {
        let id1 = OwnerId::new();
        let id2 = OwnerId::new();
        let id3 = OwnerId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn invalidate_calls_callback() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let invalidate = Invalidate::new(move || {
            called_clone.store(true, Ordering::SeqCst);
        });

        assert!(!called.load(Ordering::SeqCst));
        invalidate.clone().notify();
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn clones_share_identity() {
        let a = Invalidate::noop();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Invalidate::noop()));
    }
}
