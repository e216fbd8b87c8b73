//! Operations on whole values: NO_OP, SET, and MATH.
//!
//! NO_OP and SET are plain [`Operation`] variants; this module holds the
//! SET-specific pieces of compose, rebase, and drilldown. MATH lives in
//! [`math`].

pub mod math;

pub use math::{Bits, Math};

use serde_json::Value;

use crate::cmp::cmp_docs;
use crate::operation::Operation;
use crate::types::{Doc, RebaseOptions, Selector};

/// `SET(value)` followed by `other`: a SET of `other` applied to `value`.
/// `None` when `other` cannot apply to `value`.
pub(crate) fn set_compose(value: &Doc, other: &Operation) -> Option<Operation> {
    match other.apply_doc(value) {
        Ok(doc) => Some(Operation::Set(doc).simplify()),
        Err(err) => {
            tracing::debug!(op = %other, error = %err, "SET composition not possible");
            None
        }
    }
}

/// The SET that a child of the document receives when the whole document
/// is replaced: the new value's child, or `Missing`.
pub(crate) fn set_drilldown(value: &Doc, selector: &Selector) -> Operation {
    let child = match (value.as_value(), selector) {
        (Some(Value::Array(items)), Selector::Index(i)) => items.get(*i),
        (Some(Value::Object(map)), Selector::Key(k)) => map.get(k),
        _ => None,
    };
    Operation::Set(child.cloned().into())
}

/// SET against SET. Equal values cancel; in conflictless mode the higher
/// value wins.
pub(crate) fn rebase_sets(a: &Doc, b: &Doc, opts: RebaseOptions<'_>) -> Option<(Operation, Operation)> {
    if a == b {
        return Some((Operation::NoOp, Operation::NoOp));
    }
    if opts.conflictless && cmp_docs(a, b).is_lt() {
        return Some((Operation::NoOp, Operation::Set(b.clone())));
    }
    None
}
