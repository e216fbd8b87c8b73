//! Rebase of PATCH against PATCH, and of MAP against MAP or PATCH.
//!
//! Both hunk lists are walked in the coordinates of the shared base
//! document. A hunk that does not overlap the other side is emitted
//! shifted by the length changes the other side made before it. Hunks with
//! identical spans rebase their operations against each other. Other
//! overlaps are a conflict in strict mode and are split until the spans
//! line up in conflictless mode.

use std::cmp::Ordering;
use std::collections::VecDeque;

use tracing::debug;

use super::{grow, Elements, Hunk, Patch};
use crate::cmp::cmp_values;
use crate::codec::json::to_json;
use crate::operation::Operation;
use crate::types::{Doc, OpError, OpResult, RebaseOptions};

struct Pending {
    offset: usize,
    length: usize,
    /// Length change the other side makes inside this hunk's span.
    dlength: isize,
    op: Operation,
}

/// One side of the walk.
struct Side {
    /// Where, in the base document, the last consumed hunk ended.
    old_index: usize,
    hunks: VecDeque<Pending>,
    /// Length change of the other side's hunks emitted since this side last
    /// emitted one.
    dx_index: isize,
    rebased: Vec<Hunk>,
}

impl Side {
    fn new(patch: &Patch) -> Self {
        Side {
            old_index: 0,
            hunks: patch
                .hunks()
                .iter()
                .map(|h| Pending {
                    offset: h.offset,
                    length: h.length,
                    dlength: 0,
                    op: h.op.clone(),
                })
                .collect(),
            dx_index: 0,
            rebased: Vec::new(),
        }
    }

    fn span(&self) -> Option<(usize, usize)> {
        self.hunks.front().map(|h| {
            let start = self.old_index + h.offset;
            (start, start + h.length)
        })
    }

    /// Emit the front hunk, returning the length change the other side must
    /// account for.
    fn take(&mut self) -> OpResult<isize> {
        let Some(h) = self.hunks.pop_front() else {
            return Ok(0);
        };
        let change = h.op.length_change(h.length)?;
        let offset = h
            .offset
            .checked_add_signed(self.dx_index)
            .ok_or_else(|| OpError::OutOfRange(format!("hunk offset {} shifted by {}", h.offset, self.dx_index)))?;
        self.rebased.push(Hunk::new(offset, grow(h.length, h.dlength)?, h.op));
        self.dx_index = 0;
        self.old_index += h.offset + h.length;
        Ok(change)
    }

    /// Split the front hunk so its first part spans `at` base elements.
    fn split(&mut self, at: usize) -> bool {
        let Some(h) = self.hunks.pop_front() else {
            return false;
        };
        match h.op.decompose(false, at) {
            Ok((left, right)) => {
                self.hunks.push_front(Pending {
                    offset: 0,
                    length: h.length - at,
                    dlength: 0,
                    op: right,
                });
                self.hunks.push_front(Pending {
                    offset: h.offset,
                    length: at,
                    dlength: 0,
                    op: left,
                });
                true
            }
            Err(err) => {
                debug!(op = %h.op, at, error = %err, "hunk cannot be split");
                self.hunks.push_front(h);
                false
            }
        }
    }
}

pub(crate) fn rebase_patches(a: &Patch, b: &Patch, opts: RebaseOptions<'_>) -> OpResult<Option<(Operation, Operation)>> {
    let base = opts.prior().and_then(Doc::as_value).and_then(Elements::of);
    let mut a = Side::new(a);
    let mut b = Side::new(b);

    loop {
        let ((a_start, a_end), (b_start, b_end)) = match (a.span(), b.span()) {
            (Some(sa), Some(sb)) => (sa, sb),
            (Some(_), None) => {
                b.dx_index += a.take()?;
                continue;
            }
            (None, Some(_)) => {
                a.dx_index += b.take()?;
                continue;
            }
            (None, None) => break,
        };

        // Two insertions at the same point.
        if a_start == b_start && a_start == a_end && b_start == b_end {
            if !opts.conflictless {
                debug!(at = a_start, "simultaneous insertions");
                return Ok(None);
            }
            match cmp_hunk_ops(&a, &b) {
                Ordering::Equal => {
                    // Identical insertions: keep a single copy.
                    let a_change = front_op(&a).length_change(0)?;
                    let b_change = front_op(&b).length_change(0)?;
                    replace_front(&mut a, Operation::NoOp, b_change);
                    replace_front(&mut b, Operation::NoOp, a_change);
                    a.take()?;
                    b.take()?;
                }
                Ordering::Less => b.dx_index += a.take()?,
                Ordering::Greater => a.dx_index += b.take()?,
            }
            continue;
        }

        if a_end <= b_start {
            b.dx_index += a.take()?;
            continue;
        }
        if b_end <= a_start {
            a.dx_index += b.take()?;
            continue;
        }

        if a_start == b_start && a_end == b_end {
            let length = a_end - a_start;
            let slice = base
                .as_ref()
                .filter(|els| a_end <= els.len())
                .map(|els| Doc::Present(els.slice(a_start, a_end)));
            let sub = opts.with_document(slice.as_ref());
            let (a_op, b_op) = (front_op(&a).clone(), front_op(&b).clone());
            let (Some(a_rebased), Some(b_rebased)) = (a_op.rebase(&b_op, sub)?, b_op.rebase(&a_op, sub)?) else {
                debug!(a = %a_op, b = %b_op, "hunk conflict");
                return Ok(None);
            };
            if !a_rebased.is_sequence_op() || !b_rebased.is_sequence_op() {
                return Ok(None);
            }
            replace_front(&mut a, a_rebased, b_op.length_change(length)?);
            replace_front(&mut b, b_rebased, a_op.length_change(length)?);
            a.take()?;
            b.take()?;
            continue;
        }

        if !opts.conflictless {
            debug!(a_start, a_end, b_start, b_end, "overlapping hunks");
            return Ok(None);
        }
        let split = match a_start.cmp(&b_start) {
            Ordering::Less => a.split(b_start - a_start),
            Ordering::Greater => b.split(a_start - b_start),
            Ordering::Equal if a_end < b_end => b.split(a_end - a_start),
            Ordering::Equal => a.split(b_end - b_start),
        };
        if !split {
            return Ok(None);
        }
    }

    Ok(Some((
        Patch::from_hunks(a.rebased).simplify(),
        Patch::from_hunks(b.rebased).simplify(),
    )))
}

fn front_op(side: &Side) -> &Operation {
    side.hunks.front().map_or(&Operation::NoOp, |h| &h.op)
}

fn replace_front(side: &mut Side, op: Operation, dlength: isize) {
    if let Some(front) = side.hunks.front_mut() {
        front.op = op;
        front.dlength = dlength;
    }
}

/// Deterministic order between two hunk operations.
fn cmp_hunk_ops(a: &Side, b: &Side) -> Ordering {
    cmp_values(&to_json(front_op(a)), &to_json(front_op(b)))
}

fn wrap_map(op: Operation) -> Operation {
    match op {
        Operation::NoOp => Operation::NoOp,
        op => Operation::map(op),
    }
}

/// MAP against MAP. With a prior document the inner operations are rebased
/// per element; if elements disagree, each element becomes its own hunk.
pub(crate) fn rebase_maps(a: &Operation, b: &Operation, opts: RebaseOptions<'_>) -> OpResult<Option<(Operation, Operation)>> {
    let Some(base) = opts.prior().and_then(Doc::as_value).and_then(Elements::of) else {
        let sub = opts.with_document(None);
        return Ok(match (a.rebase(b, sub)?, b.rebase(a, sub)?) {
            (Some(x), Some(y)) => Some((wrap_map(x), wrap_map(y))),
            _ => None,
        });
    };

    let mut uniform: Option<(Operation, Operation)> = None;
    for i in 0..base.len() {
        let element = Doc::Present(base.get(i));
        let sub = opts.with_document(Some(&element));
        let (Some(x), Some(y)) = (a.rebase(b, sub)?, b.rebase(a, sub)?) else {
            return Ok(None);
        };
        match &uniform {
            None => uniform = Some((x, y)),
            Some((ux, uy)) if *ux == x && *uy == y => {}
            Some(_) => {
                let per_element = |op: &Operation| {
                    Patch::from_hunks((0..base.len()).map(|_| Hunk::new(0, 1, Operation::map(op.clone()))).collect())
                };
                return rebase_patches(&per_element(a), &per_element(b), opts);
            }
        }
    }
    // An empty sequence has no elements to transform.
    Ok(Some(match uniform {
        Some((x, y)) => (wrap_map(x), wrap_map(y)),
        None => (Operation::NoOp, Operation::NoOp),
    }))
}

/// MAP against PATCH. With a prior document the MAP becomes a PATCH over
/// the whole sequence. Without one, every hunk must itself be a MAP whose
/// rebase leaves the outer MAP unchanged.
pub(crate) fn rebase_map_patch(
    map: &Operation,
    patch: &Patch,
    opts: RebaseOptions<'_>,
) -> OpResult<Option<(Operation, Operation)>> {
    if let Some(base) = opts.prior().and_then(Doc::as_value).and_then(Elements::of) {
        let whole = Patch::from_hunks(vec![Hunk::new(0, base.len(), Operation::map(map.clone()))]);
        return rebase_patches(&whole, patch, opts);
    }

    let mut hunks = Vec::with_capacity(patch.hunks().len());
    for hunk in patch.hunks() {
        let Operation::Map(inner) = &hunk.op else {
            return Ok(None);
        };
        let (Some(x), Some(y)) = (map.rebase(inner, opts)?, inner.rebase(map, opts)?) else {
            return Ok(None);
        };
        if x != *map {
            return Ok(None);
        }
        hunks.push(Hunk::new(hunk.offset, hunk.length, wrap_map(y)));
    }
    Ok(Some((Operation::map(map.clone()), Patch::from_hunks(hunks).simplify())))
}
