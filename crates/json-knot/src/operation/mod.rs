//! The `Operation` sum type and its generic entry points.
//!
//! Every change to a document is an `Operation`. Operations are immutable
//! values: compose, rebase, inverse, and simplify always build new ones.
//! Variant-specific behaviour lives in the layer modules
//! ([`crate::values`], [`crate::objects`], [`crate::sequences`],
//! [`crate::lists`], [`crate::copies`]); this module routes to them.

mod rebase;

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use crate::copies::Copy;
use crate::lists;
use crate::objects::Apply;
use crate::sequences::{self, Hunk, Patch};
use crate::types::{Doc, OpError, OpResult, Selector};
use crate::values::{self, Math};

/// A change to a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Leaves the document unchanged.
    NoOp,
    /// Replaces the whole document (or removes it, with `Doc::Missing`).
    Set(Doc),
    /// Arithmetic or bitwise transform of a number or boolean.
    Math(Math),
    /// Per-property operations on an object.
    Apply(Apply),
    /// Ranged edits of a string or array.
    Patch(Patch),
    /// Applies the inner operation to every element of its hunk's span.
    Map(Box<Operation>),
    /// Operations applied in order, used when no atomic composition exists.
    List(Vec<Operation>),
    /// Copies values between locations in the document.
    Copy(Copy),
}

impl Operation {
    // ── Constructors ──────────────────────────────────────────────────────

    pub fn set(value: impl Into<Value>) -> Self {
        Operation::Set(Doc::Present(value.into()))
    }

    pub fn set_missing() -> Self {
        Operation::Set(Doc::Missing)
    }

    /// `MATH(operator, operand)`; the operand is validated against the
    /// operator.
    pub fn math(operator: &str, operand: Value) -> OpResult<Self> {
        Math::new(operator, operand).map(Operation::Math)
    }

    pub fn apply_ops(ops: IndexMap<String, Operation>) -> Self {
        Operation::Apply(Apply::new(ops))
    }

    /// `APPLY(key, op)`.
    pub fn apply_key(key: impl Into<String>, op: Operation) -> Self {
        let mut ops = IndexMap::new();
        ops.insert(key.into(), op);
        Operation::Apply(Apply::new(ops))
    }

    /// `PUT(key, value)`: create or overwrite a property.
    pub fn put(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::apply_key(key, Self::set(value))
    }

    /// `REM(key)`: remove a property.
    pub fn rem(key: impl Into<String>) -> Self {
        Self::apply_key(key, Self::set_missing())
    }

    pub fn patch(hunks: Vec<Hunk>) -> OpResult<Self> {
        Patch::new(hunks).map(Operation::Patch)
    }

    /// `SPLICE(pos, length, value)`: replace `length` elements at `pos` with
    /// the elements of `value` (a string or array).
    pub fn splice(pos: usize, length: usize, value: impl Into<Value>) -> OpResult<Self> {
        Self::patch(vec![Hunk::new(pos, length, Self::set(value))])
    }

    pub fn insert(pos: usize, value: impl Into<Value>) -> OpResult<Self> {
        Self::splice(pos, 0, value)
    }

    /// Delete `length` elements of a string at `pos`.
    pub fn delete_str(pos: usize, length: usize) -> OpResult<Self> {
        Self::splice(pos, length, "")
    }

    /// Delete `length` elements of an array at `pos`.
    pub fn delete_items(pos: usize, length: usize) -> OpResult<Self> {
        Self::splice(pos, length, Value::Array(Vec::new()))
    }

    /// `ATINDEX(index, op)`: apply `op` to a single element.
    pub fn at_index(index: usize, op: Operation) -> Self {
        Self::at_indices([(index, op)])
    }

    /// `ATINDEX({index: op, ...})`: apply operations to several elements.
    /// Duplicate indices keep the last operation given.
    pub fn at_indices(ops: impl IntoIterator<Item = (usize, Operation)>) -> Self {
        let sorted: std::collections::BTreeMap<usize, Operation> = ops.into_iter().collect();
        let mut hunks = Vec::with_capacity(sorted.len());
        let mut next = 0;
        for (index, op) in sorted {
            hunks.push(Hunk::new(index - next, 1, Self::map(op)));
            next = index + 1;
        }
        Operation::Patch(Patch::from_hunks(hunks))
    }

    pub fn map(op: Operation) -> Self {
        Operation::Map(Box::new(op))
    }

    pub fn list(ops: Vec<Operation>) -> Self {
        Operation::List(ops)
    }

    /// `COPY([[from, to], ...])` with JSON Pointer paths.
    pub fn copy<S: AsRef<str>>(pathpairs: impl IntoIterator<Item = (S, S)>) -> OpResult<Self> {
        Copy::new(pathpairs).map(Operation::Copy)
    }

    // ── Introspection ─────────────────────────────────────────────────────

    pub fn is_no_op(&self) -> bool {
        matches!(self, Operation::NoOp)
    }

    /// The `(module, name)` pair identifying this variant on the wire.
    pub fn type_tag(&self) -> (&'static str, &'static str) {
        match self {
            Operation::NoOp => ("values", "NO_OP"),
            Operation::Set(_) => ("values", "SET"),
            Operation::Math(_) => ("values", "MATH"),
            Operation::Apply(_) => ("objects", "APPLY"),
            Operation::Patch(_) => ("sequences", "PATCH"),
            Operation::Map(_) => ("sequences", "MAP"),
            Operation::List(_) => ("lists", "LIST"),
            Operation::Copy(_) => ("copies", "COPY"),
        }
    }

    /// Whether this operation can sit inside a PATCH hunk, i.e. supports
    /// [`length_change`](Self::length_change) and
    /// [`decompose`](Self::decompose).
    pub fn is_sequence_op(&self) -> bool {
        match self {
            Operation::NoOp | Operation::Map(_) | Operation::Patch(_) => true,
            Operation::Set(Doc::Present(v)) => sequences::is_sequence(v),
            _ => false,
        }
    }

    // ── Apply ─────────────────────────────────────────────────────────────

    /// Apply to a present document. Fails if the result is absent.
    pub fn apply(&self, doc: &Value) -> OpResult<Value> {
        self.apply_doc(&Doc::Present(doc.clone()))?
            .into_value()
            .ok_or_else(|| OpError::TypeMismatch(format!("{self} removed the document")))
    }

    pub fn apply_doc(&self, doc: &Doc) -> OpResult<Doc> {
        match self {
            Operation::NoOp => Ok(doc.clone()),
            Operation::Set(value) => Ok(value.clone()),
            Operation::Math(math) => math.apply(doc).map(Doc::Present),
            Operation::Apply(apply) => apply.apply(doc),
            Operation::Patch(patch) => patch.apply(doc),
            Operation::Map(op) => sequences::map_apply(op, doc),
            Operation::List(ops) => lists::apply(ops, doc),
            Operation::Copy(copy) => copy.apply(doc),
        }
    }

    // ── Simplify ──────────────────────────────────────────────────────────

    /// A value-equal operation with minimal structure. Idempotent.
    pub fn simplify(&self) -> Operation {
        match self {
            Operation::NoOp | Operation::Set(_) | Operation::Copy(_) => self.clone(),
            Operation::Math(math) => math.simplify(),
            Operation::Apply(apply) => apply.simplify(),
            Operation::Patch(patch) => patch.simplify(),
            Operation::Map(op) => sequences::map_simplify(op),
            Operation::List(ops) => lists::simplify(ops),
        }
    }

    // ── Inverse ───────────────────────────────────────────────────────────

    /// The operation that undoes this one, given the document it applied to.
    pub fn inverse(&self, doc: &Value) -> OpResult<Operation> {
        self.inverse_doc(&Doc::Present(doc.clone()))
    }

    pub fn inverse_doc(&self, doc: &Doc) -> OpResult<Operation> {
        match self {
            Operation::NoOp => Ok(Operation::NoOp),
            Operation::Set(_) => Ok(Operation::Set(doc.clone())),
            Operation::Math(math) => math.inverse(doc),
            Operation::Apply(apply) => apply.inverse(doc),
            Operation::Patch(patch) => patch.inverse(doc),
            Operation::Map(op) => sequences::map_inverse(op, doc),
            Operation::List(ops) => lists::inverse(ops, doc),
            Operation::Copy(copy) => copy.inverse(doc),
        }
    }

    // ── Compose ───────────────────────────────────────────────────────────

    /// One operation equivalent to applying `self` then `other`. Falls back
    /// to a LIST when no atomic composition exists.
    pub fn compose(&self, other: &Operation) -> Operation {
        match self.compose_atomic_or_trivial(other) {
            Some(op) => op,
            None => {
                tracing::debug!(a = %self, b = %other, "no atomic composition, falling back to LIST");
                lists::simplify(&[self.clone(), other.clone()])
            }
        }
    }

    /// Like [`compose`](Self::compose) but returns `None` instead of
    /// building a LIST.
    pub fn compose_atomic_or_trivial(&self, other: &Operation) -> Option<Operation> {
        match (self, other) {
            (Operation::NoOp, _) => Some(other.clone()),
            (_, Operation::NoOp) => Some(self.clone()),
            // A SET erases whatever came before it.
            (_, Operation::Set(_)) => Some(other.clone()),
            _ => self.atomic_compose(other),
        }
    }

    /// The variant-specific composition, or `None` if it is not possible.
    pub fn atomic_compose(&self, other: &Operation) -> Option<Operation> {
        match self {
            Operation::NoOp => Some(other.clone()),
            Operation::Set(value) => values::set_compose(value, other),
            Operation::Math(math) => math.atomic_compose(other),
            Operation::Apply(apply) => match other {
                Operation::Apply(other) => Some(apply.compose(other)),
                _ => None,
            },
            Operation::Patch(patch) => match other {
                Operation::Patch(other) => sequences::compose_patches(patch, other),
                _ => None,
            },
            Operation::Map(op) => match other {
                Operation::Map(other) => op.atomic_compose(other).map(Operation::map),
                _ => None,
            },
            Operation::List(ops) => Some(lists::compose(ops, other)),
            Operation::Copy(copy) => match other {
                Operation::Copy(other) => Some(Operation::Copy(copy.compose(other))),
                _ => None,
            },
        }
    }

    // ── Drilldown ─────────────────────────────────────────────────────────

    /// Project this operation onto the element or property at `selector`.
    pub fn drilldown(&self, selector: &Selector) -> OpResult<Operation> {
        match self {
            Operation::NoOp | Operation::Math(_) => Ok(Operation::NoOp),
            Operation::Set(value) => Ok(values::set_drilldown(value, selector)),
            Operation::Apply(apply) => Ok(apply.drilldown(selector)),
            Operation::Patch(patch) => patch.drilldown(selector),
            Operation::Map(op) => Ok(match selector {
                Selector::Index(_) => (**op).clone(),
                Selector::Key(_) => Operation::NoOp,
            }),
            Operation::List(ops) => lists::drilldown(ops, selector),
            Operation::Copy(_) => Err(OpError::InvalidArgument(format!(
                "{self} cannot be projected onto a single location"
            ))),
        }
    }

    // ── Sequence support ──────────────────────────────────────────────────

    /// How much a span of `old_length` elements grows (or shrinks) when this
    /// operation applies to it.
    pub fn length_change(&self, old_length: usize) -> OpResult<isize> {
        match self {
            Operation::NoOp | Operation::Map(_) => Ok(0),
            Operation::Set(Doc::Present(v)) => match sequences::seq_len(v) {
                Some(len) => Ok(len as isize - old_length as isize),
                None => Err(not_a_sequence_op(self)),
            },
            Operation::Patch(patch) => patch.length_change(),
            _ => Err(not_a_sequence_op(self)),
        }
    }

    /// Split into a left and right operation on adjacent subranges. The left
    /// part's input (`in_out == false`) or output (`in_out == true`) span has
    /// exactly `at_index` elements.
    pub fn decompose(&self, in_out: bool, at_index: usize) -> OpResult<(Operation, Operation)> {
        match self {
            Operation::NoOp | Operation::Map(_) => Ok((self.clone(), self.clone())),
            Operation::Set(Doc::Present(v)) if sequences::is_sequence(v) => {
                let len = sequences::seq_len(v).unwrap_or(0);
                if !in_out {
                    // delete the left part, replace the right with the whole value
                    Ok((Operation::set(sequences::seq_slice(v, 0, 0)), self.clone()))
                } else if at_index <= len {
                    Ok((
                        Operation::set(sequences::seq_slice(v, 0, at_index)),
                        Operation::set(sequences::seq_slice(v, at_index, len)),
                    ))
                } else {
                    Err(OpError::OutOfRange(format!("cannot split {self} at {at_index}")))
                }
            }
            Operation::Patch(patch) => patch.decompose(in_out, at_index),
            _ => Err(not_a_sequence_op(self)),
        }
    }

    // ── Visitor ───────────────────────────────────────────────────────────

    /// Rebuild this operation bottom-up, replacing every node for which
    /// `visitor` returns `Some`.
    ///
    /// Rebuilt PATCHes are validated: a visitor that turns a hunk operation
    /// into something that cannot act on a subsequence is `InvalidArgument`.
    pub fn visit(&self, visitor: &mut dyn FnMut(&Operation) -> Option<Operation>) -> OpResult<Operation> {
        let rebuilt = match self {
            Operation::Apply(apply) => Operation::Apply(Apply::new(
                apply
                    .ops()
                    .iter()
                    .map(|(k, op)| -> OpResult<(String, Operation)> { Ok((k.clone(), op.visit(visitor)?)) })
                    .collect::<OpResult<_>>()?,
            )),
            Operation::Patch(patch) => Operation::Patch(Patch::new(
                patch
                    .hunks()
                    .iter()
                    .map(|h| -> OpResult<Hunk> { Ok(Hunk::new(h.offset, h.length, h.op.visit(visitor)?)) })
                    .collect::<OpResult<_>>()?,
            )?),
            Operation::Map(op) => Operation::map(op.visit(visitor)?),
            Operation::List(ops) => {
                Operation::List(ops.iter().map(|op| op.visit(visitor)).collect::<OpResult<_>>()?)
            }
            other => other.clone(),
        };
        Ok(visitor(&rebuilt).unwrap_or(rebuilt))
    }
}

fn not_a_sequence_op(op: &Operation) -> OpError {
    OpError::TypeMismatch(format!("{op} cannot be used inside a sequence hunk"))
}

impl Default for Operation {
    fn default() -> Self {
        Operation::NoOp
    }
}

// ── Display ───────────────────────────────────────────────────────────────

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::NoOp => write!(f, "<NO_OP>"),
            Operation::Set(Doc::Missing) => write!(f, "<SET ~>"),
            Operation::Set(Doc::Present(v)) => write!(f, "<SET {v}>"),
            Operation::Math(math) => write!(f, "{math}"),
            Operation::Apply(apply) => {
                write!(f, "<APPLY ")?;
                for (i, (key, op)) in apply.ops().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}:{op}", Value::String(key.clone()))?;
                }
                write!(f, ">")
            }
            Operation::Patch(patch) => {
                write!(f, "<PATCH")?;
                for (i, h) in patch.hunks().iter().enumerate() {
                    let sep = if i > 0 { ", " } else { " " };
                    write!(f, "{sep}+{}x{} {}", h.offset, h.length, h.op)?;
                }
                write!(f, ">")
            }
            Operation::Map(op) => write!(f, "<MAP {op}>"),
            Operation::List(ops) => {
                write!(f, "<LIST [")?;
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{op}")?;
                }
                write!(f, "]>")
            }
            Operation::Copy(copy) => write!(f, "{copy}"),
        }
    }
}
