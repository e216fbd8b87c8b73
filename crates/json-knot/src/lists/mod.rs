//! LIST: operations applied in sequence.
//!
//! A LIST is what composition falls back to when two operations have no
//! atomic composition. Simplification flattens nested lists and folds
//! adjacent operations together wherever they do compose.

use std::slice;

use tracing::trace;

use crate::operation::Operation;
use crate::types::{Doc, OpResult, RebaseOptions, Selector};

pub(crate) fn apply(ops: &[Operation], doc: &Doc) -> OpResult<Doc> {
    ops.iter().try_fold(doc.clone(), |doc, op| op.apply_doc(&doc))
}

pub(crate) fn simplify(ops: &[Operation]) -> Operation {
    let mut out: Vec<Operation> = Vec::with_capacity(ops.len());
    for op in flatten(ops) {
        match op.simplify() {
            Operation::List(items) => items.into_iter().for_each(|op| push_reduced(&mut out, op)),
            op => push_reduced(&mut out, op),
        }
    }
    match out.len() {
        0 => Operation::NoOp,
        1 => out.pop().unwrap_or_default(),
        _ => Operation::List(out),
    }
}

/// Push `op`, first folding it into the tail of `out` for as long as the
/// two compose.
fn push_reduced(out: &mut Vec<Operation>, op: Operation) {
    let mut op = op;
    while !op.is_no_op() {
        let Some(prev) = out.last() else { break };
        let Some(composed) = prev.compose_atomic_or_trivial(&op) else { break };
        out.pop();
        op = composed.simplify();
    }
    if !op.is_no_op() {
        out.push(op);
    }
}

fn flatten(ops: &[Operation]) -> Vec<Operation> {
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            Operation::List(items) => out.extend(flatten(items)),
            op => out.push(op.clone()),
        }
    }
    out
}

/// Undo each operation in reverse order, each against the document it
/// originally applied to.
pub(crate) fn inverse(ops: &[Operation], doc: &Doc) -> OpResult<Operation> {
    let mut inverses = Vec::with_capacity(ops.len());
    let mut current = doc.clone();
    for op in ops {
        inverses.push(op.inverse_doc(&current)?);
        current = op.apply_doc(&current)?;
    }
    inverses.reverse();
    Ok(Operation::List(inverses))
}

pub(crate) fn compose(ops: &[Operation], other: &Operation) -> Operation {
    let mut all = ops.to_vec();
    match other {
        Operation::List(items) => all.extend(items.iter().cloned()),
        other => all.push(other.clone()),
    }
    simplify(&all)
}

pub(crate) fn drilldown(ops: &[Operation], selector: &Selector) -> OpResult<Operation> {
    let projected = ops
        .iter()
        .map(|op| op.drilldown(selector))
        .collect::<OpResult<Vec<_>>>()?;
    Ok(simplify(&projected))
}

/// Rebase where at least one side is a LIST.
pub(crate) fn rebase(this: &Operation, other: &Operation, opts: RebaseOptions<'_>) -> OpResult<Option<Operation>> {
    let ops = flatten(slice::from_ref(this));
    let base = flatten(slice::from_ref(other));
    trace!(ops = ops.len(), base = base.len(), "rebasing LIST");
    Ok(rebase_array(&base, &ops, opts)?.map(|ops| simplify(&ops)))
}

/// Rebase the sequence `ops` onto the sequence `base`.
///
/// A single operation against a sequence is rebased against each base
/// operation in turn. A sequence against a single base operation rebases
/// its head, then its tail against the base rebased onto the head. The
/// prior document is advanced alongside.
fn rebase_array(base: &[Operation], ops: &[Operation], opts: RebaseOptions<'_>) -> OpResult<Option<Vec<Operation>>> {
    if base.is_empty() || ops.is_empty() {
        return Ok(Some(ops.to_vec()));
    }

    if let ([b], [op]) = (base, ops) {
        return Ok(op.rebase(b, opts)?.map(|op| match op {
            Operation::NoOp => Vec::new(),
            Operation::List(items) => items,
            op => vec![op],
        }));
    }

    if base.len() == 1 {
        let (head, tail) = ops.split_at(1);
        let Some(mut rebased) = rebase_array(base, head, opts)? else {
            return Ok(None);
        };
        let Some(base_after_head) = rebase_array(head, base, opts)? else {
            return Ok(None);
        };
        let after_head = advance(opts.prior(), &head[0]);
        let Some(rest) = rebase_array(&base_after_head, tail, opts.with_document(after_head.as_ref()))? else {
            return Ok(None);
        };
        rebased.extend(rest);
        return Ok(Some(rebased));
    }

    let mut ops = ops.to_vec();
    let mut document = opts.prior().cloned();
    for b in base {
        let Some(next) = rebase_array(slice::from_ref(b), &ops, opts.with_document(document.as_ref()))? else {
            return Ok(None);
        };
        ops = next;
        document = advance(document.as_ref(), b);
    }
    Ok(Some(ops))
}

/// The document after `op`, when it is known and `op` applies to it.
fn advance(doc: Option<&Doc>, op: &Operation) -> Option<Doc> {
    doc.and_then(|doc| op.apply_doc(doc).ok())
}
