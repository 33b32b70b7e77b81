//! Reactive Primitives
//!
//! Dependency tracking for the store, and the two derived primitives built
//! on it.
//!
//! # Concepts
//!
//! ## Owners
//!
//! An owner is anything that wants to re-run when the paths it read
//! change: a computed value, an effect, or a host render pass. Owners are
//! identified by an [`OwnerId`] and registered through
//! [`Store::track_access`](crate::Store::track_access).
//!
//! ## Computed values
//!
//! A [`Computed`] caches a value derived from the store. It is lazy: a
//! change only marks it dirty, and it recomputes on the next read.
//!
//! ## Effects
//!
//! An [`Effect`] runs a side effect and re-runs it, through the scheduler,
//! every time one of its dependencies changes.
//!
//! # Implementation Notes
//!
//! Reads are attributed through a thread-local stack of tracking frames
//! (see [`TrackingContext`]). Only the top frame receives reads, so nested
//! owners never leak dependencies into each other.

mod computed;
mod context;
mod effect;
mod subscriber;
mod tracker;

pub use computed::{Computed, ComputedState};
pub use context::{StoreId, TrackingContext};
pub use effect::Effect;
pub use subscriber::{HookId, Invalidate, OwnerId};
pub use tracker::{Invalidation, Snapshot, Tracker, TrackerItem};
