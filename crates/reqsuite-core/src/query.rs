//! Dotted-path queries over JSON response bodies
//!
//! `user.id` walks object keys, a numeric segment indexes arrays
//! (`items.0.name`), `#` yields the length of an array and `\.` escapes a
//! literal dot inside a key (`headers.content\.type`).

use serde_json::Value;

/// Parse `body` as JSON and evaluate `query` against it.
///
/// Returns `None` when the body is not JSON or the path does not exist.
#[must_use]
pub fn query_bytes(body: &[u8], query: &str) -> Option<Value> {
    let root: Value = serde_json::from_slice(body).ok()?;
    query_value(&root, query)
}

/// Evaluate `query` against an already parsed document.
#[must_use]
pub fn query_value(root: &Value, query: &str) -> Option<Value> {
    if query.is_empty() {
        return None;
    }

    let mut current = root;
    let segments = split_path(query);
    let last = segments.len() - 1;

    for (i, segment) in segments.iter().enumerate() {
        match current {
            Value::Object(map) => {
                current = map.get(segment.as_str())?;
            }
            Value::Array(items) => {
                if segment == "#" {
                    // Length is terminal; nothing can follow it.
                    return (i == last).then(|| Value::from(items.len()));
                }
                let idx: usize = segment.parse().ok()?;
                current = items.get(idx)?;
            }
            _ => return None,
        }
    }

    Some(current.clone())
}

fn split_path(query: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut chars = query.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    buf.push(next);
                }
            }
            '.' => segments.push(std::mem::take(&mut buf)),
            other => buf.push(other),
        }
    }
    segments.push(buf);
    segments
}
