//! COPY: duplicate values from one location of the document to another.
//!
//! Locations are JSON Pointers. Each pair copies the value at `from` to
//! `to`, in order, so later pairs see the effect of earlier ones.

use std::fmt;

use serde_json::Value;

use json_knot_pointer::{format_json_pointer, get, replace, try_parse_json_pointer, Path};

use crate::operation::Operation;
use crate::types::{Doc, OpError, OpResult, Selector};

#[derive(Debug, Clone, PartialEq)]
pub struct PathPair {
    pub from: Path,
    pub to: Path,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Copy {
    pairs: Vec<PathPair>,
}

impl Copy {
    /// Parse and validate `(from, to)` pointer pairs. A pair may not copy a
    /// location onto itself.
    pub fn new<S: AsRef<str>>(pathpairs: impl IntoIterator<Item = (S, S)>) -> OpResult<Self> {
        let mut pairs = Vec::new();
        for (from, to) in pathpairs {
            let (from, to) = (try_parse_json_pointer(from.as_ref())?, try_parse_json_pointer(to.as_ref())?);
            if from == to {
                return Err(OpError::InvalidArgument(format!(
                    "COPY source and destination are both {:?}",
                    format_json_pointer(&from)
                )));
            }
            pairs.push(PathPair { from, to });
        }
        Ok(Copy { pairs })
    }

    pub fn pairs(&self) -> &[PathPair] {
        &self.pairs
    }

    pub(crate) fn apply(&self, doc: &Doc) -> OpResult<Doc> {
        let Doc::Present(value) = doc else {
            return Err(OpError::TypeMismatch("COPY needs a document".into()));
        };
        let mut out = value.clone();
        for pair in &self.pairs {
            let source = get(&out, &pair.from)
                .cloned()
                .ok_or_else(|| OpError::OutOfRange(format!("nothing to copy at {:?}", format_json_pointer(&pair.from))))?;
            replace(&mut out, &pair.to, source)?;
        }
        Ok(Doc::Present(out))
    }

    /// Restores every destination to what it held before.
    pub(crate) fn inverse(&self, doc: &Doc) -> OpResult<Operation> {
        let Doc::Present(value) = doc else {
            return Err(OpError::TypeMismatch("COPY needs a document".into()));
        };
        let restores = self
            .pairs
            .iter()
            .map(|pair| {
                let old: Doc = get(value, &pair.to).cloned().into();
                wrap_at_path(&pair.to, Some(value), Operation::Set(old))
            })
            .collect::<OpResult<Vec<_>>>()?;
        Ok(Operation::List(restores))
    }

    pub(crate) fn compose(&self, other: &Copy) -> Copy {
        Copy {
            pairs: self.pairs.iter().chain(&other.pairs).cloned().collect(),
        }
    }

    /// Rebase `op` onto this COPY: whatever `op` does at a copy's source is
    /// done again at its destination.
    pub(crate) fn clone_operation(&self, op: &Operation, doc: &Doc) -> OpResult<Operation> {
        let root = doc.as_value();
        let mut ops = vec![op.clone()];
        for pair in &self.pairs {
            let at_source = drilldown_path(op, &pair.from, root)?;
            if at_source.is_no_op() {
                continue;
            }
            ops.push(wrap_at_path(&pair.to, root, at_source)?);
        }
        Ok(Operation::List(ops).simplify())
    }
}

/// Project `op` onto `path`. Array steps select an index, judged by the
/// document's shape where it is known.
fn drilldown_path(op: &Operation, path: &[String], doc: Option<&Value>) -> OpResult<Operation> {
    let mut op = op.clone();
    let mut current = doc;
    for step in path {
        if op.is_no_op() {
            break;
        }
        let as_index = match current {
            Some(value) => value.is_array(),
            None => op.type_tag().0 == "sequences",
        };
        let selector = match step.parse::<usize>() {
            Ok(index) if as_index && json_knot_pointer::is_valid_index(step) => Selector::Index(index),
            _ => Selector::Key(step.clone()),
        };
        current = current.and_then(|value| get(value, std::slice::from_ref(step)));
        op = op.drilldown(&selector)?;
    }
    Ok(op)
}

/// Nest `op` so it applies at `path`. Each step becomes an APPLY for an
/// object or an ATINDEX for an array, judged by the document's shape.
fn wrap_at_path(path: &[String], doc: Option<&Value>, op: Operation) -> OpResult<Operation> {
    let mut steps = Vec::with_capacity(path.len());
    let mut current = doc;
    for step in path {
        match current {
            Some(Value::Array(items)) => {
                let index: usize = step
                    .parse()
                    .map_err(|_| OpError::OutOfRange(format!("{step:?} is not an array index")))?;
                steps.push(Selector::Index(index));
                current = items.get(index);
            }
            Some(Value::Object(map)) => {
                steps.push(Selector::Key(step.clone()));
                current = map.get(step);
            }
            _ => {
                steps.push(Selector::Key(step.clone()));
                current = None;
            }
        }
    }
    Ok(steps.into_iter().rev().fold(op, |op, step| match step {
        Selector::Key(key) => Operation::apply_key(key, op),
        Selector::Index(index) => Operation::at_index(index, op),
    }))
}

impl fmt::Display for Copy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<COPY")?;
        for (i, pair) in self.pairs.iter().enumerate() {
            let sep = if i > 0 { ", " } else { " " };
            write!(f, "{sep}{} => {}", format_json_pointer(&pair.from), format_json_pointer(&pair.to))?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RebaseOptions;
    use serde_json::json;

    fn copy(pairs: &[(&str, &str)]) -> Operation {
        Operation::copy(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn rejects_bad_pointers_and_self_copies() {
        assert!(Operation::copy([("a", "/b")]).is_err());
        assert!(Operation::copy([("/a", "/a")]).is_err());
        assert!(Operation::copy([("/a~2", "/b")]).is_err());
    }

    #[test]
    fn copies_in_order() {
        let op = copy(&[("/a", "/b"), ("/b", "/c")]);
        assert_eq!(op.apply(&json!({"a": 1})).unwrap(), json!({"a": 1, "b": 1, "c": 1}));
    }

    #[test]
    fn copies_into_arrays() {
        let op = copy(&[("/x", "/list/1")]);
        assert_eq!(op.apply(&json!({"x": "v", "list": [0, 0]})).unwrap(), json!({"x": "v", "list": [0, "v"]}));
        assert!(copy(&[("/x", "/list/5")]).apply(&json!({"x": 1, "list": []})).is_err());
    }

    #[test]
    fn missing_source_is_an_error() {
        assert!(copy(&[("/nope", "/b")]).apply(&json!({})).is_err());
    }

    #[test]
    fn inverse_restores_destinations() {
        let doc = json!({"a": 1, "b": 2, "list": [5]});
        let op = copy(&[("/a", "/b"), ("/a", "/c"), ("/b", "/list/0")]);
        let after = op.apply(&doc).unwrap();
        assert_eq!(after, json!({"a": 1, "b": 1, "c": 1, "list": [1]}));
        assert_eq!(op.inverse(&doc).unwrap().apply(&after).unwrap(), doc);
    }

    #[test]
    fn compose_concatenates_pairs() {
        let ab = copy(&[("/a", "/b")]).compose(&copy(&[("/b", "/c")]));
        assert_eq!(ab, copy(&[("/a", "/b"), ("/b", "/c")]));
    }

    #[test]
    fn drilldown_is_an_error() {
        assert!(copy(&[("/a", "/b")]).drilldown(&Selector::Key("a".into())).is_err());
    }

    #[test]
    fn concurrent_edit_follows_the_copy() {
        let doc = Doc::present(json!({"src": {"n": 1}, "dst": null}));
        let copy_op = copy(&[("/src", "/dst")]);
        let edit = Operation::apply_key("src", Operation::apply_key("n", Operation::math("add", json!(5)).unwrap()));
        let opts = RebaseOptions::conflictless(Some(&doc));
        let edit2 = edit.rebase(&copy_op, opts).unwrap().unwrap();
        let start = json!({"src": {"n": 1}, "dst": null});
        let after = edit2.apply(&copy_op.apply(&start).unwrap()).unwrap();
        assert_eq!(after, json!({"src": {"n": 6}, "dst": {"n": 6}}));
    }

    #[test]
    fn display() {
        assert_eq!(copy(&[("/a", "/b/c")]).to_string(), "<COPY /a => /b/c>");
    }
}
