//! JSON tree helpers shared by the store backends.
//!
//! Semantics follow a realtime-database tree: writing below a missing or
//! scalar node materialises intermediate objects, and writing `null` is the
//! same as deleting.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::StorageError;
use crate::path::StorePath;
use crate::storage_traits::StorageResult;

/// Resolve `segments` below `node`.
pub(crate) fn lookup<'a>(node: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = node;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Write (`Some`) or delete (`None`) the value at `segments` below `node`.
pub(crate) fn write(node: &mut Value, segments: &[String], value: Option<Value>) {
    let value = value.filter(|v| !v.is_null());
    let Some((last, parents)) = segments.split_last() else {
        *node = value.unwrap_or_else(|| Value::Object(Map::new()));
        return;
    };

    let mut current = node;
    for segment in parents {
        if value.is_none() && lookup(current, std::slice::from_ref(segment)).is_none() {
            return;
        }
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }

    match value {
        Some(value) => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            if let Value::Object(map) = current {
                map.insert(last.clone(), value);
            }
        }
        None => {
            if let Value::Object(map) = current {
                map.remove(last);
            }
        }
    }
}

/// Children of `node` ordered by key. Absent and `null` nodes have none.
pub(crate) fn children(
    node: Option<&Value>,
    path: &StorePath,
) -> StorageResult<BTreeMap<String, Value>> {
    match node {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()),
        Some(_) => Err(StorageError::NotAnObject {
            path: path.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segs(raw: &str) -> Vec<String> {
        raw.split('/').map(str::to_string).collect()
    }

    #[test]
    fn write_creates_intermediate_objects() {
        let mut root = json!({});
        write(&mut root, &segs("contests/c1/entries/e1"), Some(json!({"id": "e1"})));
        assert_eq!(
            lookup(&root, &segs("contests/c1/entries/e1/id")),
            Some(&json!("e1"))
        );
    }

    #[test]
    fn write_null_deletes() {
        let mut root = json!({"contests": {"c1": {"name": "x"}}});
        write(&mut root, &segs("contests/c1"), Some(Value::Null));
        assert!(lookup(&root, &segs("contests/c1")).is_none());
        assert_eq!(root, json!({"contests": {}}));
    }

    #[test]
    fn deleting_missing_path_leaves_tree_untouched() {
        let mut root = json!({"contests": {}});
        write(&mut root, &segs("contests/c9/entries/e1"), None);
        assert_eq!(root, json!({"contests": {}}));
    }

    #[test]
    fn children_of_scalar_is_error() {
        let path = StorePath::parse("a").unwrap();
        assert!(children(Some(&json!(3)), &path).is_err());
        assert!(children(None, &path).unwrap().is_empty());
    }
}
