//! Graph Nodes
//!
//! One node per path in the signal graph.

use indexmap::IndexSet;

use crate::reactive::OwnerId;

/// Dirty state of a node during a propagation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// Nothing under propagation touched this node.
    Clean,

    /// The node, an ancestor, or a descendant changed in the current pass.
    Dirty,
}

/// A path in the signal graph.
#[derive(Debug)]
pub struct PathNode {
    path: String,

    /// The parent path. Only the root has none.
    parent: Option<String>,

    /// Child paths that currently have nodes.
    children: IndexSet<String>,

    /// Owners that read this exact path.
    subscribers: IndexSet<OwnerId>,

    /// Bumped every time the node is marked dirty.
    version: u64,

    dirty: DirtyState,
}

impl PathNode {
    pub fn new(path: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            path: path.into(),
            parent,
            children: IndexSet::new(),
            subscribers: IndexSet::new(),
            version: 0,
            dirty: DirtyState::Clean,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn children(&self) -> &IndexSet<String> {
        &self.children
    }

    pub fn add_child(&mut self, path: String) {
        self.children.insert(path);
    }

    pub fn remove_child(&mut self, path: &str) {
        self.children.shift_remove(path);
    }

    pub fn subscribers(&self) -> &IndexSet<OwnerId> {
        &self.subscribers
    }

    pub fn add_subscriber(&mut self, owner: OwnerId) {
        self.subscribers.insert(owner);
    }

    pub fn remove_subscriber(&mut self, owner: OwnerId) -> bool {
        self.subscribers.shift_remove(&owner)
    }

    /// A node with no subscribers and no children carries no information.
    pub fn is_unused(&self) -> bool {
        self.subscribers.is_empty() && self.children.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    /// Mark dirty and bump the version. Returns false if already dirty.
    pub fn mark_dirty(&mut self) -> bool {
        if self.dirty == DirtyState::Dirty {
            return false;
        }
        self.dirty = DirtyState::Dirty;
        self.version += 1;
        true
    }

    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_clean_and_unused() {
        let node = PathNode::new("a.b", Some("a".to_string()));
        assert!(node.is_clean());
        assert!(node.is_unused());
        assert_eq!(node.parent(), Some("a"));
        assert_eq!(node.version(), 0);
    }

    #[test]
    fn dirty_state_transitions() {
        let mut node = PathNode::new("a", Some(String::new()));

        assert!(node.mark_dirty());
        assert_eq!(node.dirty_state(), DirtyState::Dirty);
        assert_eq!(node.version(), 1);

        // Marking twice in one pass does not bump again
        assert!(!node.mark_dirty());
        assert_eq!(node.version(), 1);

        node.mark_clean();
        assert!(node.mark_dirty());
        assert_eq!(node.version(), 2);
    }

    #[test]
    fn subscriber_management() {
        let mut node = PathNode::new("a", None);
        let owner = OwnerId::new();

        node.add_subscriber(owner);
        node.add_child("a.b".to_string());
        assert!(!node.is_unused());

        assert!(node.remove_subscriber(owner));
        assert!(!node.remove_subscriber(owner));
        node.remove_child("a.b");
        assert!(node.is_unused());
    }
}
