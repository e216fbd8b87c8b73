//! Composition of two PATCHes.
//!
//! Both hunk lists are walked together in the coordinates of the
//! intermediate document (the output of the first patch, which is the
//! input of the second). Hunks that do not overlap are copied out in
//! order. Where a hunk of the second patch falls inside a hunk of the
//! first, the two hunk operations are composed. Partial overlaps are split
//! until one of those two cases applies.

use std::collections::VecDeque;

use tracing::debug;

use super::{grow, split_input_length, Hunk, Patch};
use crate::operation::Operation;
use crate::types::{Doc, OpError, OpResult};

/// One side of the walk.
struct Cursor {
    /// Where the last consumed hunk ended.
    index: isize,
    hunks: VecDeque<Hunk>,
    /// Spans of the first patch are measured after it applies.
    first: bool,
}

impl Cursor {
    fn new(patch: &Patch, first: bool) -> Self {
        Cursor {
            index: 0,
            hunks: patch.hunks().iter().cloned().collect(),
            first,
        }
    }

    fn span(&self, hunk: &Hunk) -> OpResult<(isize, isize)> {
        let start = self.index + hunk.offset as isize;
        let mut end = start + hunk.length as isize;
        if self.first {
            end += hunk.op.length_change(hunk.length)?;
        }
        Ok((start, end))
    }

    /// Move the front hunk to the output.
    fn take(&mut self, out: &mut Vec<Hunk>, out_index: &mut isize) -> OpResult<()> {
        let Some(hunk) = self.hunks.pop_front() else {
            return Ok(());
        };
        let (start, end) = self.span(&hunk)?;
        out.push(Hunk::new(gap(*out_index, start)?, hunk.length, hunk.op));
        self.index = end;
        *out_index = end;
        Ok(())
    }

    /// Drop the front hunk without emitting it.
    fn skip(&mut self) -> OpResult<()> {
        if let Some(hunk) = self.hunks.pop_front() {
            self.index = self.span(&hunk)?.1;
        }
        Ok(())
    }
}

fn gap(from: isize, to: isize) -> OpResult<usize> {
    usize::try_from(to - from).map_err(|_| OpError::OutOfRange(format!("hunks out of order at {to}")))
}

/// `a` then `b` as one PATCH, or `None` when some pair of overlapping hunks
/// cannot be merged.
pub(crate) fn compose_patches(a: &Patch, b: &Patch) -> Option<Operation> {
    match walk(a, b) {
        Ok(Some(hunks)) => Some(Patch::from_hunks(hunks).simplify()),
        Ok(None) => None,
        Err(err) => {
            debug!(error = %err, "PATCH composition not possible");
            None
        }
    }
}

fn walk(a: &Patch, b: &Patch) -> OpResult<Option<Vec<Hunk>>> {
    let mut a = Cursor::new(a, true);
    let mut b = Cursor::new(b, false);
    let mut out = Vec::new();
    let mut out_index: isize = 0;

    loop {
        let (ah, bh) = match (a.hunks.front(), b.hunks.front()) {
            (None, None) => break,
            (Some(_), None) => {
                a.take(&mut out, &mut out_index)?;
                continue;
            }
            (None, Some(_)) => {
                b.take(&mut out, &mut out_index)?;
                continue;
            }
            (Some(ah), Some(bh)) => (ah.clone(), bh.clone()),
        };
        let (a_start, a_end) = a.span(&ah)?;
        let (b_start, b_end) = b.span(&bh)?;

        if a_end <= b_start {
            a.take(&mut out, &mut out_index)?;
            continue;
        }
        if b_end <= a_start {
            b.take(&mut out, &mut out_index)?;
            continue;
        }

        let dx_start = b_start - a_start;
        let dx_end = b_end - a_end;

        // b lies within a's output: try to fold it into a's hunk.
        if dx_start >= 0 && dx_end <= 0 {
            let exact = dx_start == 0 && dx_end == 0;
            let b_op = if exact {
                bh.op.clone()
            } else {
                Operation::Patch(Patch::from_hunks(vec![Hunk::new(dx_start as usize, bh.length, bh.op.clone())]))
            };
            let mut composed = ah.op.compose_atomic_or_trivial(&b_op);
            if composed.is_none() && exact && ah.op.length_change(ah.length)? == 0 && is_map_of_set(&b_op) {
                composed = Some(b_op);
            }
            if let Some(op) = composed.filter(Operation::is_sequence_op) {
                if let Some(front) = a.hunks.front_mut() {
                    front.op = op;
                }
                b.index += bh.op.length_change(bh.length)?;
                b.skip()?;
                continue;
            }
        }

        if dx_start > 0 {
            // a starts first. Its part before b's start is untouched by b.
            let split = dx_start as usize;
            let change = ah.op.length_change(ah.length)?;
            let (left, right) = ah.op.decompose(true, split)?;
            let left_length = split_input_length(&ah.op, ah.length, change, true, split)?;
            out.push(Hunk::new(gap(out_index, a_start)?, left_length, left));
            a.hunks[0] = Hunk::new(0, ah.length - left_length, right);
            a.index = b_start;
            out_index = b_start;
        } else if dx_start < 0 {
            // b starts first. Its part before a's start is untouched by a.
            let split = (-dx_start) as usize;
            let (left, right) = bh.op.decompose(false, split)?;
            out.push(Hunk::new(gap(out_index, b_start)?, split, left));
            b.hunks[0] = Hunk::new(0, bh.length - split, right);
            b.index = a_start;
            out_index = a_start;
        } else if dx_end > 0 {
            if matches!(bh.op, Operation::Set(_)) {
                // b overwrites all of a's output and more: a is irrelevant,
                // and b's span becomes a's input span plus the remainder.
                let change = ah.op.length_change(ah.length)?;
                b.hunks[0].length = grow(bh.length, -change)?;
                a.hunks.pop_front();
                a.index = a_end - change;
            } else {
                // Split b where a's output ends so the spans match next round.
                let split = (a_end - a_start) as usize;
                let (left, right) = bh.op.decompose(false, split)?;
                b.hunks[0] = Hunk::new(bh.offset, split, left);
                b.hunks.insert(1, Hunk::new(0, bh.length - split, right));
            }
        } else if dx_end < 0 {
            // Same start, b ends first and did not fold: split a where b ends.
            let split = (b_end - a_start) as usize;
            let change = ah.op.length_change(ah.length)?;
            let (left, right) = ah.op.decompose(true, split)?;
            let left_length = split_input_length(&ah.op, ah.length, change, true, split)?;
            a.hunks[0] = Hunk::new(ah.offset, left_length, left);
            a.hunks.insert(1, Hunk::new(0, ah.length - left_length, right));
        } else {
            return Ok(None);
        }
    }
    Ok(Some(out))
}

fn is_map_of_set(op: &Operation) -> bool {
    matches!(op, Operation::Map(inner) if matches!(**inner, Operation::Set(Doc::Present(_))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn splice(pos: usize, len: usize, value: Value) -> Operation {
        Operation::splice(pos, len, value).unwrap()
    }

    fn check(a: &Operation, b: &Operation, doc: Value) -> Operation {
        let ab = a.compose(b);
        let expected = b.apply(&a.apply(&doc).unwrap()).unwrap();
        assert_eq!(ab.apply(&doc).unwrap(), expected, "{a} then {b} composed to {ab}");
        ab
    }

    #[test]
    fn disjoint_hunks_interleave() {
        let ab = check(&splice(0, 1, json!("X")), &splice(3, 1, json!("Y")), json!("abcd"));
        assert!(matches!(ab, Operation::Patch(_)));
    }

    #[test]
    fn edit_inside_insertion_folds() {
        let ab = check(&splice(1, 1, json!("XYZ")), &splice(2, 1, json!("Q")), json!("abc"));
        assert_eq!(ab, splice(1, 1, json!("XQZ")));
    }

    #[test]
    fn partial_overlap_splits() {
        let ab = check(&splice(1, 1, json!("XY")), &splice(2, 2, json!("Q")), json!("abc"));
        assert_eq!(ab, splice(1, 2, json!("XQ")));
        check(&Operation::insert(0, "AB").unwrap(), &Operation::delete_str(1, 3).unwrap(), json!("xyz"));
    }

    #[test]
    fn insert_before_and_after_a_hunk() {
        check(&splice(1, 2, json!("XY")), &Operation::insert(1, "!").unwrap(), json!("abcd"));
        check(&splice(1, 2, json!("XY")), &Operation::insert(3, "!").unwrap(), json!("abcd"));
    }

    #[test]
    fn set_over_map_hunks() {
        let a = Operation::at_index(1, Operation::set("x"));
        let b = splice(0, 3, json!("Q"));
        assert_eq!(check(&a, &b, json!("abcd")), splice(0, 3, json!("Q")));
    }

    #[test]
    fn map_over_map_composes_elementwise() {
        let a = Operation::at_index(2, Operation::math("add", json!(1)).unwrap());
        let b = Operation::at_index(2, Operation::math("add", json!(2)).unwrap());
        let ab = check(&a, &b, json!([0, 0, 0]));
        assert_eq!(ab, Operation::at_index(2, Operation::math("add", json!(3)).unwrap()));
    }

    #[test]
    fn map_then_insertion_inside_falls_back() {
        // a MAP hunk cannot absorb a length change, so the walk splits it.
        let a = Operation::patch(vec![Hunk::new(
            0,
            3,
            Operation::map(Operation::math("add", json!(1)).unwrap()),
        )])
        .unwrap();
        let b = Operation::insert(1, json!([9])).unwrap();
        check(&a, &b, json!([1, 2, 3]));
    }

    #[test]
    fn length_changing_nested_patch_splits_in_place() {
        let nested = Operation::insert(1, "XY").unwrap();
        let a = Operation::patch(vec![Hunk::new(1, 3, nested)]).unwrap();
        let b = splice(3, 4, json!("Z"));
        let ab = check(&a, &b, json!("abcdefg"));
        assert_eq!(ab.apply(&json!("abcdefg")).unwrap(), json!("abXZfg"));
        assert!(matches!(ab, Operation::Patch(_)), "composed to {ab}");
    }
}
