//! Total order over documents, used to break ties deterministically in
//! conflictless rebase.
//!
//! - `Missing` sorts first.
//! - Values of different types order by type name.
//! - Numbers compare numerically, strings lexicographically.
//! - Arrays compare by length, then element-wise.
//! - Everything else compares by its canonical (sorted-key) JSON text.

use std::cmp::Ordering;

use serde_json::Value;

use crate::types::{type_name, Doc};

pub fn cmp_docs(a: &Doc, b: &Doc) -> Ordering {
    match (a, b) {
        (Doc::Missing, Doc::Missing) => Ordering::Equal,
        (Doc::Missing, _) => Ordering::Less,
        (_, Doc::Missing) => Ordering::Greater,
        (Doc::Present(a), Doc::Present(b)) => cmp_values(a, b),
    }
}

pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (ta, tb) = (type_name(a), type_name(b));
    if ta != tb {
        return ta.cmp(tb);
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .len()
            .cmp(&y.len())
            .then_with(|| {
                x.iter()
                    .zip(y)
                    .map(|(a, b)| cmp_values(a, b))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            }),
        _ => canonical_json(a).cmp(&canonical_json(b)),
    }
}

/// Serialize `value` to JSON text with object keys sorted, so that equal
/// values always produce identical text regardless of insertion order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&obj[key.as_str()], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
