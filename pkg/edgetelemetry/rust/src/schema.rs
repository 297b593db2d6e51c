// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Schema discovery over decoded documents.
//!
//! A parameter path joins mapping keys with `.` and marks "first element of a
//! sequence" with a trailing `[]`. Only element 0 of a sequence is walked, so
//! fields that appear only in later elements are never discovered.

use serde_json::{Map, Value};

pub const ARRAY_SUFFIX: &str = "[]";

/// Enumerates every parameter path of `document`, parents before children.
///
/// Paths nested deeper than `max_depth` levels are not produced. Duplicates
/// are possible when a key contains a `.` that collides with a nested path.
pub fn walk(document: &Map<String, Value>, max_depth: usize) -> Vec<String> {
    let mut paths = Vec::new();
    walk_object(document, "", 1, max_depth, &mut paths);
    paths
}

fn walk_object(
    map: &Map<String, Value>,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    paths: &mut Vec<String>,
) {
    if depth > max_depth {
        return;
    }
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        paths.push(path.clone());
        walk_value(value, &path, depth + 1, max_depth, paths);
    }
}

fn walk_value(value: &Value, prefix: &str, depth: usize, max_depth: usize, paths: &mut Vec<String>) {
    match value {
        Value::Object(map) => walk_object(map, prefix, depth, max_depth, paths),
        Value::Array(items) => {
            if depth > max_depth {
                return;
            }
            let Some(first) = items.first() else {
                return;
            };
            let path = format!("{prefix}{ARRAY_SUFFIX}");
            paths.push(path.clone());
            walk_value(first, &path, depth + 1, max_depth, paths);
        }
        // Scalars end the walk; the key holding them already produced a path.
        _ => {}
    }
}

/// Follows `path` back into `document`.
///
/// Returns `None` on a missing key, a non-object where a key is expected, or
/// an empty (or non-array) value where `[]` is expected.
///
/// The path encoding is lossy: a key that itself contains a `.` (such as
/// `ext.gpid`) is split into two segments, so its path is discovered by
/// [`walk`] but never resolves here.
pub fn value_at<'a>(document: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut current: Option<&'a Value> = None;
    for segment in path.split('.') {
        let (key, array_levels) = split_segment(segment);
        let map = match current {
            None => document,
            Some(Value::Object(map)) => map,
            Some(_) => return None,
        };
        let mut value = map.get(key)?;
        for _ in 0..array_levels {
            value = value.as_array()?.first()?;
        }
        current = Some(value);
    }
    current
}

/// Splits `imp[][]` into `("imp", 2)`.
fn split_segment(segment: &str) -> (&str, usize) {
    let mut key = segment;
    let mut levels = 0;
    while let Some(stripped) = key.strip_suffix(ARRAY_SUFFIX) {
        key = stripped;
        levels += 1;
    }
    (key, levels)
}
