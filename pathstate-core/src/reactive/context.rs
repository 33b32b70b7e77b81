//! Tracking Context
//!
//! The tracking context records which owner is currently running a tracked
//! function, so that reads performed anywhere below it can be attributed to
//! that owner.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. `track_access` pushes a frame for
//! its owner before calling the run function and removes it afterwards.
//! Only the frame on top of the stack receives reads, so a nested
//! `track_access` for another owner shadows the outer one until it returns.
//!
//! Frames are tagged with the store they belong to; a read from a store
//! that does not own the top frame is not tracked.
//!
//! Frames are removed by identity rather than by popping, which keeps the
//! stack consistent even if an inner frame is released out of order.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use super::OwnerId;

/// Identifies one store instance inside the tracking stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(u64);

impl StoreId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for StoreId {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An entry in the tracking stack.
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Unique per `enter` call, used to find this frame again.
    id: u64,
    store: StoreId,
    /// `None` for untracked sections.
    owner: Option<OwnerId>,
}

/// Guard that removes its frame when dropped.
///
/// Dropping during a panic also removes the frame, so a failing run never
/// leaves its owner on the stack.
pub struct TrackingContext {
    frame: u64,
}

impl TrackingContext {
    /// Enter a tracked section for `owner`.
    pub fn enter(store: StoreId, owner: OwnerId) -> Self {
        Self::push(store, Some(owner))
    }

    /// Enter a section in which reads from `store` are not tracked.
    pub fn untracked(store: StoreId) -> Self {
        Self::push(store, None)
    }

    fn push(store: StoreId, owner: Option<OwnerId>) -> Self {
        let id = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame { id, store, owner });
        });
        Self { frame: id }
    }

    /// The owner that should receive reads from `store`, if any.
    pub fn current_owner(store: StoreId) -> Option<OwnerId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .filter(|frame| frame.store == store)
                .and_then(|frame| frame.owner)
        })
    }

    /// Whether `owner` is running anywhere on the stack.
    pub fn is_running(owner: OwnerId) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().iter().any(|f| f.owner == Some(owner)))
    }

    /// Check if there is any active frame.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    #[cfg(test)]
    fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for TrackingContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.iter().rposition(|f| f.id == self.frame) {
                Some(pos) if pos + 1 == stack.len() => {
                    stack.pop();
                }
                Some(pos) => {
                    tracing::debug!(
                        frame = self.frame,
                        depth = stack.len(),
                        "tracking frame released out of order"
                    );
                    stack.remove(pos);
                }
                None => {}
            }
        });
    }
}
