//! Safe navigation through untrusted nested JSON.
//!
//! A path is a sequence of object keys. Traversal fails (returns `None`) as
//! soon as a step hits a missing key or a non-object, so callers can probe
//! several known shapes without manual null checks.

use std::collections::HashSet;

use serde_json::Value;

/// Follow `path` from `root`. An empty path resolves to `root` itself.
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(*key))
}

/// The first path that fully resolves to a non-empty array.
pub fn first_list<'a>(root: &'a Value, paths: &[&[&str]]) -> Option<&'a [Value]> {
    paths
        .iter()
        .filter_map(|path| lookup(root, path)?.as_array())
        .find(|items| !items.is_empty())
        .map(Vec::as_slice)
}

/// Elements of every path that fully resolves to an array, in path order.
pub fn lists_at<'a>(root: &'a Value, paths: &'a [&'a [&'a str]]) -> impl Iterator<Item = &'a Value> {
    paths
        .iter()
        .filter_map(move |path| lookup(root, path)?.as_array())
        .flatten()
}

/// The first key whose value is a non-empty string.
pub fn first_str<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| root.get(*key)?.as_str())
        .find(|s| !s.is_empty())
}

/// The first key whose value is truthy (see [`is_truthy`]).
pub fn first_truthy<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| root.get(*key))
        .find(|value| is_truthy(value))
}

/// Loose truthiness: `null`, `false`, zero, and empty strings/arrays/objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Drop empty and repeated entries, keeping the first occurrence of each.
pub fn dedup_preserving_order<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let item = item.into();
        if !item.is_empty() && seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}
