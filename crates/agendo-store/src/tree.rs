//! Path addressing over a `serde_json::Value` document tree.
//!
//! Nulls are never stored: writing null deletes, and a node left with no
//! children is pruned from its parent.

use serde_json::{Map, Value};

use crate::error::StoreError;

const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// Split a slash-delimited path into segments.
pub(crate) fn segments(path: &str) -> Result<Vec<String>, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    trimmed
        .split('/')
        .map(|seg| {
            if seg.is_empty() || seg.contains(FORBIDDEN) {
                Err(StoreError::InvalidPath(path.to_string()))
            } else {
                Ok(seg.to_string())
            }
        })
        .collect()
}

/// One path is an ancestor of, equal to, or a descendant of the other.
pub(crate) fn related(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

pub(crate) fn get<'a>(root: &'a Value, segs: &[String]) -> Option<&'a Value> {
    segs.iter().try_fold(root, |node, seg| node.get(seg.as_str()))
}

pub(crate) fn set(root: &mut Value, segs: &[String], value: Value) {
    match normalize(value) {
        Some(v) => insert(root, segs, v),
        None => {
            remove(root, segs);
        }
    }
}

fn insert(node: &mut Value, segs: &[String], value: Value) {
    let Some((first, rest)) = segs.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(first.clone()).or_insert(Value::Null);
        insert(child, rest, value);
    }
}

/// Returns true when `node` is left empty and should be pruned.
fn remove(node: &mut Value, segs: &[String]) -> bool {
    let Some((first, rest)) = segs.split_first() else {
        return true;
    };
    let Value::Object(map) = node else {
        return false;
    };
    let prune = match map.get_mut(first.as_str()) {
        Some(child) => remove(child, rest),
        None => false,
    };
    if prune {
        map.remove(first.as_str());
    }
    map.is_empty()
}

/// Drop null members and empty objects; `None` if nothing remains.
fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize(v).map(|v| (k, v)))
                .collect();
            (!cleaned.is_empty()).then_some(Value::Object(cleaned))
        }
        other => Some(other),
    }
}
