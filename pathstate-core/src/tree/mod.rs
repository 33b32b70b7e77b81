//! State Tree
//!
//! The store keeps all of its data in one `serde_json::Value` tree. This
//! module holds the pure functions that operate on it:
//!
//! - `path`: dot-path resolution, writes that create intermediate
//!   containers, and ancestry helpers
//! - `diff`: structural comparison producing leaf-level change entries
//!
//! Nothing here knows about subscribers; the store layers notification on
//! top of these.

pub mod path;
mod diff;

pub use diff::{diff_values, DiffAction, DiffEntry};
