//! Signal Graph
//!
//! One node per path, linked to its parent.
//!
//! # Algorithm
//!
//! When a path changes:
//!
//! 1. Find its node, or the closest ancestor that has one
//! 2. Mark it and every ancestor dirty, walking parent links explicitly
//! 3. Breadth-first, mark every descendant dirty
//! 4. Collect the subscribers of all dirty nodes
//! 5. Mark everything clean again for the next pass
//!
//! Each dirty mark bumps the node's version, so the version of an ancestor
//! moves even though its value was mutated in place.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexSet;

use super::node::PathNode;
use super::ReactiveGraph;
use crate::reactive::OwnerId;
use crate::tree::path;

#[derive(Debug, Default)]
pub struct SignalGraph {
    nodes: HashMap<String, PathNode>,
}

impl SignalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, path: &str) -> Option<&PathNode> {
        self.nodes.get(path)
    }

    /// Current version of the node at `path`.
    pub fn version(&self, path: &str) -> Option<u64> {
        self.nodes.get(path).map(PathNode::version)
    }

    /// Create the node for `target` and any missing ancestors.
    fn ensure(&mut self, target: &str) {
        let mut missing = Vec::new();
        let mut current = Some(target);
        while let Some(at) = current {
            if self.nodes.contains_key(at) {
                break;
            }
            missing.push(at);
            current = path::parent(at);
        }

        // Top-down, so every parent exists before its child links to it
        for at in missing.into_iter().rev() {
            let parent = path::parent(at).map(str::to_string);
            if let Some(node) = parent.as_deref().and_then(|p| self.nodes.get_mut(p)) {
                node.add_child(at.to_string());
            }
            self.nodes.insert(at.to_string(), PathNode::new(at, parent));
        }
    }

    /// Remove unused nodes from `start` upwards.
    fn prune(&mut self, start: &str) {
        let mut current = Some(start.to_string());
        while let Some(at) = current {
            let Some(node) = self.nodes.get(&at) else { break };
            if !node.is_unused() {
                break;
            }
            let parent = node.parent().map(str::to_string);
            self.nodes.remove(&at);
            if let Some(parent) = &parent {
                if let Some(node) = self.nodes.get_mut(parent) {
                    node.remove_child(&at);
                }
            }
            current = parent;
        }
    }

    /// Mark the change at `changed` and collect the nodes it touched.
    fn mark_changed(&mut self, changed: &str, touched: &mut Vec<String>) {
        // Closest existing node at or above the changed path
        let start = std::iter::once(changed)
            .chain(path::ancestors(changed))
            .find(|p| self.nodes.contains_key(*p))
            .map(str::to_string);
        let Some(start) = start else { return };

        // Ancestors, explicitly
        let mut up = self.nodes.get(&start).and_then(|n| n.parent().map(str::to_string));
        while let Some(at) = up {
            let Some(node) = self.nodes.get_mut(&at) else { break };
            if node.mark_dirty() {
                touched.push(at.clone());
            }
            up = node.parent().map(str::to_string);
        }

        // The node itself and, if it is the changed path, its subtree
        let mut queue = VecDeque::from([start.clone()]);
        let descend = start == changed;
        while let Some(at) = queue.pop_front() {
            let Some(node) = self.nodes.get_mut(&at) else { continue };
            if node.mark_dirty() {
                touched.push(at.clone());
            }
            if descend {
                queue.extend(node.children().iter().cloned());
            }
        }
    }
}

impl ReactiveGraph for SignalGraph {
    fn subscribe(&mut self, path: &str, owner: OwnerId) {
        self.ensure(path);
        if let Some(node) = self.nodes.get_mut(path) {
            node.add_subscriber(owner);
        }
    }

    fn unsubscribe(&mut self, path: &str, owner: OwnerId) {
        if let Some(node) = self.nodes.get_mut(path) {
            node.remove_subscriber(owner);
            self.prune(path);
        }
    }

    fn remove_owner(&mut self, owner: OwnerId) {
        let paths: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.subscribers().contains(&owner))
            .map(|(path, _)| path.clone())
            .collect();
        for path in paths {
            self.unsubscribe(&path, owner);
        }
    }

    fn affected(&mut self, changed: &[&str]) -> IndexSet<OwnerId> {
        let mut touched = Vec::new();
        for &changed in changed {
            self.mark_changed(changed, &mut touched);
        }

        let mut out = IndexSet::new();
        for at in &touched {
            if let Some(node) = self.nodes.get_mut(at) {
                out.extend(node.subscribers().iter().copied());
                node.mark_clean();
            }
        }
        out
    }

    fn subscriber_count(&self, path: &str) -> usize {
        self.nodes.get(path).map_or(0, |n| n.subscribers().len())
    }

    fn path_count(&self) -> usize {
        self.nodes.len()
    }
}
