//! Path Resolution
//!
//! Reads and writes values inside a `serde_json::Value` tree addressed by
//! dot-separated paths. The empty path is the root. Numeric segments index
//! into arrays; everywhere else a segment is an object key.

use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::error::{kind_of, Result, StoreError};

/// The root path.
pub const ROOT: &str = "";

/// Subscription key that matches every change.
pub const WILDCARD: &str = "*";

/// Most `null` slots a single write may pad an array with.
pub const MAX_ARRAY_GAP: usize = 1 << 16;

/// Path segments. Most paths are shallow, so they stay on the stack.
pub type Segments<'a> = SmallVec<[&'a str; 8]>;

/// Split a path into its segments. The root has none.
pub fn split(path: &str) -> Segments<'_> {
    if path.is_empty() {
        SmallVec::new()
    } else {
        path.split('.').collect()
    }
}

/// Append a segment to a base path.
pub fn join(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}.{segment}")
    }
}

/// The parent of a path. The root has no parent.
pub fn parent(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rfind('.').map_or(ROOT, |idx| &path[..idx]))
}

/// Iterate the ancestors of a path, closest first, ending with the root.
pub fn ancestors(path: &str) -> Ancestors<'_> {
    Ancestors { next: parent(path) }
}

pub struct Ancestors<'a> {
    next: Option<&'a str>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = parent(current);
        Some(current)
    }
}

/// Whether `path` lies strictly beneath `base`.
pub fn is_descendant(path: &str, base: &str) -> bool {
    if base.is_empty() {
        return !path.is_empty();
    }
    path.len() > base.len() && path.starts_with(base) && path.as_bytes()[base.len()] == b'.'
}

/// The part of `path` beneath `base`, or `None` if `path` is not under it.
pub fn relative<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    if path == base {
        Some(ROOT)
    } else if base.is_empty() {
        Some(path)
    } else if is_descendant(path, base) {
        Some(&path[base.len() + 1..])
    } else {
        None
    }
}

/// Check that a path is well formed: no empty segments.
pub fn validate(path: &str) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }
    if path.split('.').any(str::is_empty) {
        return Err(StoreError::InvalidPath {
            path: path.to_string(),
            reason: "paths cannot contain empty segments",
        });
    }
    Ok(())
}

/// Look up the value at `path`.
pub fn get<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    split(path).into_iter().try_fold(tree, child)
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |idx| items.get_mut(idx)),
        _ => None,
    }
}

/// Write `value` at `path`, creating intermediate objects on the way.
///
/// Scalars found where a container is needed are replaced by an object.
/// Writing the root requires an object.
pub fn set(tree: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = split(path);
    let Some((last, parents)) = segments.split_last() else {
        if !value.is_object() {
            return Err(StoreError::RootNotObject {
                found: kind_of(Some(&value)),
            });
        }
        *tree = value;
        return Ok(());
    };

    let mut node = tree;
    for (depth, segment) in parents.iter().enumerate() {
        node = slot(node, segment, || segments[..depth].join("."))?;
    }
    *slot(node, last, || parents.join("."))? = value;
    Ok(())
}

/// The child slot for `segment`, creating it (and the container) if missing.
fn slot<'a>(
    node: &'a mut Value,
    segment: &str,
    at: impl Fn() -> String,
) -> Result<&'a mut Value> {
    if !(node.is_object() || node.is_array()) {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Array(items) => {
            let idx = segment
                .parse::<usize>()
                .map_err(|_| StoreError::InvalidIndex {
                    path: at(),
                    segment: segment.to_string(),
                })?;
            if idx >= items.len() {
                if idx - items.len() > MAX_ARRAY_GAP {
                    return Err(StoreError::InvalidIndex {
                        path: at(),
                        segment: segment.to_string(),
                    });
                }
                items.resize(idx + 1, Value::Null);
            }
            Ok(&mut items[idx])
        }
        Value::Object(map) => Ok(map.entry(segment.to_string()).or_insert(Value::Null)),
        _ => Err(StoreError::InvalidPath {
            path: at(),
            reason: "expected a container",
        }),
    }
}

/// Remove the value at `path`, returning it.
///
/// Object keys are removed outright. Array elements are replaced by `null`
/// so the indices of their siblings do not move. Removing the root resets
/// it to an empty object.
pub fn remove(tree: &mut Value, path: &str) -> Option<Value> {
    let segments = split(path);
    let Some((last, parents)) = segments.split_last() else {
        return Some(std::mem::replace(tree, Value::Object(Map::new())));
    };
    let node = parents.iter().try_fold(tree, |node, segment| child_mut(node, segment))?;
    match node {
        Value::Object(map) => map.remove(*last),
        Value::Array(items) => {
            let idx = last.parse::<usize>().ok()?;
            items.get_mut(idx).map(|item| std::mem::replace(item, Value::Null))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_walks_objects_and_arrays() {
        let tree = json!({"user": {"tags": ["a", "b"], "name": "Ada"}});

        assert_eq!(get(&tree, "user.name"), Some(&json!("Ada")));
        assert_eq!(get(&tree, "user.tags.1"), Some(&json!("b")));
        assert_eq!(get(&tree, ""), Some(&tree));
        assert_eq!(get(&tree, "user.missing.deeper"), None);
        assert_eq!(get(&tree, "user.name.length"), None);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut tree = json!({});
        set(&mut tree, "a.b.c", json!(5)).unwrap();
        assert_eq!(tree, json!({"a": {"b": {"c": 5}}}));

        // A scalar in the way is replaced by a container
        set(&mut tree, "a.b.c.d", json!(true)).unwrap();
        assert_eq!(tree, json!({"a": {"b": {"c": {"d": true}}}}));
    }

    #[test]
    fn set_pads_arrays() {
        let mut tree = json!({"list": [1]});
        set(&mut tree, "list.3", json!(4)).unwrap();
        assert_eq!(tree, json!({"list": [1, null, null, 4]}));

        let err = set(&mut tree, "list.first", json!(0)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidIndex { .. }));
    }

    #[test]
    fn set_rejects_indices_far_past_the_end() {
        let mut tree = json!({"list": [1]});

        let err = set(&mut tree, "list.18446744073709551615", json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidIndex { .. }));
        let err = set(&mut tree, "list.4000000000", json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidIndex { .. }));
        assert_eq!(tree, json!({"list": [1]}));

        let edge = format!("list.{}", 1 + MAX_ARRAY_GAP);
        set(&mut tree, &edge, json!(2)).unwrap();
        assert_eq!(tree["list"].as_array().map(Vec::len), Some(MAX_ARRAY_GAP + 2));
    }

    #[test]
    fn root_write_requires_object() {
        let mut tree = json!({"a": 1});
        let err = set(&mut tree, ROOT, json!([1, 2])).unwrap_err();
        assert!(matches!(err, StoreError::RootNotObject { found: "an array" }));
        assert_eq!(tree, json!({"a": 1}));

        set(&mut tree, ROOT, json!({"b": 2})).unwrap();
        assert_eq!(tree, json!({"b": 2}));
    }

    #[test]
    fn remove_keys_and_elements() {
        let mut tree = json!({"a": {"b": 1, "c": 2}, "list": [1, 2, 3]});

        assert_eq!(remove(&mut tree, "a.b"), Some(json!(1)));
        assert_eq!(remove(&mut tree, "list.1"), Some(json!(2)));
        assert_eq!(remove(&mut tree, "nothing.here"), None);
        assert_eq!(tree, json!({"a": {"c": 2}, "list": [1, null, 3]}));
    }

    #[test]
    fn ancestry_helpers() {
        let chain: Vec<_> = ancestors("a.b.c").collect();
        assert_eq!(chain, vec!["a.b", "a", ""]);
        assert_eq!(ancestors("").count(), 0);

        assert!(is_descendant("a.b", "a"));
        assert!(!is_descendant("ab", "a"));
        assert!(is_descendant("a", ""));
        assert_eq!(relative("a.b.c", "a"), Some("b.c"));
        assert_eq!(relative("a", "a"), Some(""));
        assert_eq!(relative("b", "a"), None);
    }

    #[test]
    fn validate_rejects_empty_segments() {
        assert!(validate("a.b").is_ok());
        assert!(validate("").is_ok());
        assert!(validate("a..b").is_err());
        assert!(validate(".a").is_err());
    }
}
