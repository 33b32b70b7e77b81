//! Flat path index: `path -> owners`.

use indexmap::{IndexMap, IndexSet};

use super::ReactiveGraph;
use crate::reactive::OwnerId;
use crate::tree::path;

#[derive(Debug, Default)]
pub struct PathIndex {
    paths: IndexMap<String, IndexSet<OwnerId>>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReactiveGraph for PathIndex {
    fn subscribe(&mut self, path: &str, owner: OwnerId) {
        self.paths.entry(path.to_string()).or_default().insert(owner);
    }

    fn unsubscribe(&mut self, path: &str, owner: OwnerId) {
        if let Some(owners) = self.paths.get_mut(path) {
            owners.shift_remove(&owner);
            if owners.is_empty() {
                self.paths.shift_remove(path);
            }
        }
    }

    fn remove_owner(&mut self, owner: OwnerId) {
        self.paths.retain(|_, owners| {
            owners.shift_remove(&owner);
            !owners.is_empty()
        });
    }

    fn affected(&mut self, changed: &[&str]) -> IndexSet<OwnerId> {
        let mut out = IndexSet::new();
        for &changed in changed {
            let exact_and_up = std::iter::once(changed).chain(path::ancestors(changed));
            for key in exact_and_up {
                if let Some(owners) = self.paths.get(key) {
                    out.extend(owners.iter().copied());
                }
            }
            for (key, owners) in &self.paths {
                if path::is_descendant(key, changed) {
                    out.extend(owners.iter().copied());
                }
            }
        }
        out
    }

    fn subscriber_count(&self, path: &str) -> usize {
        self.paths.get(path).map_or(0, IndexSet::len)
    }

    fn path_count(&self) -> usize {
        self.paths.len()
    }
}
