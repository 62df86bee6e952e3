//! Loose structural comparison of a snapshot against a re-encoded live entity.
//!
//! Only the snapshot side is walked: keys the live document carries and the
//! snapshot does not are ignored. Object key order never matters, scalars
//! compare after type coercion (`"1" == 1`, `true == "1"`), and `_links`
//! objects are skipped at any depth because their hrefs embed local ids.

use serde_json::{Map, Value};

use courier_core::payload::LINKS_KEY;

/// One snapshot value without a loosely equal counterpart in the live entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    /// Slash-separated location, e.g. `title/0/value`.
    pub path: String,
    pub snapshot: Value,
    /// `None` when the live entity has nothing at `path`.
    pub live: Option<Value>,
}

/// Differences between `snapshot` and `live`. Empty means unchanged.
pub fn loose_diff(snapshot: &Map<String, Value>, live: &Map<String, Value>) -> Vec<Difference> {
    let mut out = Vec::new();
    diff_objects("", snapshot, live, &mut out);
    out
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}/{key}")
    }
}

fn diff_objects(
    prefix: &str,
    snapshot: &Map<String, Value>,
    live: &Map<String, Value>,
    out: &mut Vec<Difference>,
) {
    for (key, value) in snapshot {
        if key == LINKS_KEY {
            continue;
        }
        diff_values(&join(prefix, key), value, live.get(key), out);
    }
}

fn diff_values(path: &str, snapshot: &Value, live: Option<&Value>, out: &mut Vec<Difference>) {
    match (snapshot, live) {
        (Value::Object(a), Some(Value::Object(b))) => diff_objects(path, a, b, out),
        (Value::Array(a), Some(Value::Array(b))) => {
            for (index, item) in a.iter().enumerate() {
                diff_values(&join(path, &index.to_string()), item, b.get(index), out);
            }
        }
        (a, Some(b)) if loose_eq(a, b) => {}
        (a, b) => out.push(Difference {
            path: path.to_string(),
            snapshot: a.clone(),
            live: b.cloned(),
        }),
    }
}

/// Scalar equality with type coercion.
///
/// Containers are never loosely equal to scalars.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
        (Value::Bool(flag), other) | (other, Value::Bool(flag)) => truthy(other) == *flag,
        (Value::Null, other) | (other, Value::Null) => !truthy(other),
        (Value::Number(_) | Value::String(_), Value::Number(_) | Value::String(_)) => {
            match (as_number(a), as_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => scalar_text(a) == scalar_text(b),
            }
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
