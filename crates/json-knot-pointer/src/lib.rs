//! JSON Pointer (RFC 6901) utilities.
//!
//! This crate implements the pointer plumbing used by path-addressed
//! operations: parsing and formatting pointer strings, reading a value at a
//! path, and replacing (or inserting) a value at a path.
//!
//! # Example
//!
//! ```
//! use json_knot_pointer::{parse_json_pointer, format_json_pointer, get, replace};
//!
//! let path = parse_json_pointer("/foo/bar");
//! assert_eq!(path, vec!["foo".to_string(), "bar".to_string()]);
//! assert_eq!(format_json_pointer(&path), "/foo/bar");
//!
//! let mut doc = serde_json::json!({"foo": {"bar": 42}});
//! assert_eq!(get(&doc, &path), Some(&serde_json::json!(42)));
//!
//! replace(&mut doc, &path, serde_json::json!(7)).unwrap();
//! assert_eq!(doc, serde_json::json!({"foo": {"bar": 7}}));
//! ```

use serde_json::Value;
use thiserror::Error;

pub mod validate;
pub use validate::{validate_json_pointer, validate_path, ValidationError};

/// A parsed JSON Pointer: one unescaped string per reference token.
pub type Path = Vec<String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JsonPointerError {
    #[error("NOT_FOUND")]
    NotFound,
    #[error("INVALID_INDEX")]
    InvalidIndex,
    #[error("INVALID_TARGET")]
    InvalidTarget,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Unescapes a JSON Pointer path component.
///
/// Per RFC 6901, `~1` is replaced with `/` and `~0` is replaced with `~`.
///
/// ```
/// use json_knot_pointer::unescape_component;
///
/// assert_eq!(unescape_component("a~0b"), "a~b");
/// assert_eq!(unescape_component("c~1d"), "c/d");
/// assert_eq!(unescape_component("~01"), "~1");
/// ```
pub fn unescape_component(component: &str) -> String {
    if !component.contains('~') {
        return component.to_string();
    }
    // unescape ~1 before ~0; the other order turns "~01" into "/"
    component.replace("~1", "/").replace("~0", "~")
}

/// Escapes a JSON Pointer path component.
///
/// ```
/// use json_knot_pointer::escape_component;
///
/// assert_eq!(escape_component("a~b"), "a~0b");
/// assert_eq!(escape_component("c/d"), "c~1d");
/// ```
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    component.replace('~', "~0").replace('/', "~1")
}

/// Parse a JSON Pointer string into path components.
///
/// The empty string is the root (an empty path). The pointer is not
/// validated; call [`validate_json_pointer`] first for untrusted input.
///
/// ```
/// use json_knot_pointer::parse_json_pointer;
///
/// assert_eq!(parse_json_pointer(""), Vec::<String>::new());
/// assert_eq!(parse_json_pointer("/"), vec![""]);
/// assert_eq!(parse_json_pointer("/a~0b/c~1d"), vec!["a~b", "c/d"]);
/// ```
pub fn parse_json_pointer(pointer: &str) -> Path {
    match pointer.strip_prefix('/') {
        None => Vec::new(),
        Some(rest) => rest.split('/').map(unescape_component).collect(),
    }
}

/// Validate then parse a JSON Pointer string.
pub fn try_parse_json_pointer(pointer: &str) -> Result<Path, JsonPointerError> {
    validate_json_pointer(pointer)?;
    let path = parse_json_pointer(pointer);
    validate_path(&path)?;
    Ok(path)
}

/// Format path components into a JSON Pointer string.
///
/// ```
/// use json_knot_pointer::format_json_pointer;
///
/// assert_eq!(format_json_pointer(&[]), "");
/// assert_eq!(format_json_pointer(&["a/b".to_string(), "0".to_string()]), "/a~1b/0");
/// ```
pub fn format_json_pointer(path: &[String]) -> String {
    let mut out = String::new();
    for component in path {
        out.push('/');
        out.push_str(&escape_component(component));
    }
    out
}

/// Check if a string represents a valid non-negative integer array index
/// (no sign, no leading zeros).
pub fn is_valid_index(index: &str) -> bool {
    let bytes = index.as_bytes();
    match bytes {
        [] => false,
        [b'0'] => true,
        [b'0', ..] => false,
        _ => bytes.iter().all(|b| b.is_ascii_digit()),
    }
}

fn parse_index(step: &str) -> Result<usize, JsonPointerError> {
    if !is_valid_index(step) {
        return Err(JsonPointerError::InvalidIndex);
    }
    step.parse().map_err(|_| JsonPointerError::InvalidIndex)
}

/// Get a value from a JSON document by path.
pub fn get<'a>(val: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = val;
    for step in path {
        current = match current {
            Value::Array(arr) => arr.get(parse_index(step).ok()?)?,
            Value::Object(map) => map.get(step)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Get a mutable reference to a value in a JSON document by path.
pub fn get_mut<'a>(val: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    let mut current = val;
    for step in path {
        current = match current {
            Value::Array(arr) => arr.get_mut(parse_index(step).ok()?)?,
            Value::Object(map) => map.get_mut(step)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at `path`, returning the value previously stored there.
///
/// Object members are inserted or overwritten. Array elements must already
/// exist and are overwritten in place. The root path replaces the whole
/// document.
pub fn replace(doc: &mut Value, path: &[String], value: Value) -> Result<Option<Value>, JsonPointerError> {
    let Some((last, init)) = path.split_last() else {
        return Ok(Some(std::mem::replace(doc, value)));
    };
    let container = get_mut(doc, init).ok_or(JsonPointerError::NotFound)?;
    match container {
        Value::Object(map) => Ok(map.insert(last.clone(), value)),
        Value::Array(arr) => {
            let idx = parse_index(last)?;
            let slot = arr.get_mut(idx).ok_or(JsonPointerError::NotFound)?;
            Ok(Some(std::mem::replace(slot, value)))
        }
        _ => Err(JsonPointerError::InvalidTarget),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> Path {
        parse_json_pointer(s)
    }

    #[test]
    fn parse_and_format_are_inverse() {
        for ptr in ["", "/", "/foo", "/foo/bar", "/a~0b/c~1d", "/foo///"] {
            assert_eq!(format_json_pointer(&parse_json_pointer(ptr)), ptr);
        }
    }

    #[test]
    fn test_is_valid_index() {
        assert!(is_valid_index("0"));
        assert!(is_valid_index("123"));
        assert!(!is_valid_index("-1"));
        assert!(!is_valid_index("1.5"));
        assert!(!is_valid_index(""));
        assert!(!is_valid_index("01"));
    }

    #[test]
    fn get_walks_objects_and_arrays() {
        let doc = json!({"a": {"b": [1, 2, 3]}});
        assert_eq!(get(&doc, &p("/a/b/1")), Some(&json!(2)));
        assert_eq!(get(&doc, &p("/a/b/3")), None);
        assert_eq!(get(&doc, &p("/a/b/-")), None);
        assert_eq!(get(&doc, &p("/a/x")), None);
        assert_eq!(get(&doc, &[]), Some(&doc));
    }

    #[test]
    fn replace_inserts_object_member() {
        let mut doc = json!({"a": 1});
        let old = replace(&mut doc, &p("/b"), json!(2)).unwrap();
        assert_eq!(old, None);
        assert_eq!(doc, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn replace_overwrites_array_element() {
        let mut doc = json!({"a": [1, 2, 3]});
        let old = replace(&mut doc, &p("/a/1"), json!("x")).unwrap();
        assert_eq!(old, Some(json!(2)));
        assert_eq!(doc, json!({"a": [1, "x", 3]}));
    }

    #[test]
    fn replace_rejects_out_of_bounds_and_scalars() {
        let mut doc = json!({"a": [1], "s": "str"});
        assert_eq!(replace(&mut doc, &p("/a/5"), json!(0)), Err(JsonPointerError::NotFound));
        assert_eq!(replace(&mut doc, &p("/a/x"), json!(0)), Err(JsonPointerError::InvalidIndex));
        assert_eq!(replace(&mut doc, &p("/s/0"), json!(0)), Err(JsonPointerError::InvalidTarget));
        assert_eq!(replace(&mut doc, &p("/q/r"), json!(0)), Err(JsonPointerError::NotFound));
    }

    #[test]
    fn replace_root() {
        let mut doc = json!([1]);
        let old = replace(&mut doc, &[], json!({"x": 1})).unwrap();
        assert_eq!(old, Some(json!([1])));
        assert_eq!(doc, json!({"x": 1}));
    }

    #[test]
    fn try_parse_rejects_relative_pointer() {
        assert!(try_parse_json_pointer("foo").is_err());
        assert_eq!(try_parse_json_pointer("/foo").unwrap(), vec!["foo"]);
    }
}
