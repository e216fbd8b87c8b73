//! Operations on strings and arrays: PATCH and MAP.
//!
//! A PATCH is a list of hunks. Each hunk skips `offset` elements past the
//! end of the previous hunk, then replaces the next `length` elements with
//! the result of applying its operation to them. Strings are addressed by
//! `char`, arrays by element.
//!
//! SPLICE, INSERT, DELETE, and ATINDEX are PATCH constructors on
//! [`Operation`].

mod compose;
mod rebase;

pub(crate) use compose::compose_patches;
pub(crate) use rebase::{rebase_map_patch, rebase_maps, rebase_patches};

use serde_json::Value;

use crate::operation::Operation;
use crate::types::{Doc, OpError, OpResult, Selector};

// ── Hunk / Patch ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Hunk {
    /// Elements skipped since the end of the previous hunk.
    pub offset: usize,
    /// Elements replaced by this hunk.
    pub length: usize,
    pub op: Operation,
}

impl Hunk {
    pub fn new(offset: usize, length: usize, op: Operation) -> Self {
        Hunk { offset, length, op }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Patch {
    hunks: Vec<Hunk>,
}

impl Patch {
    /// Checks that every hunk operation can act on a subsequence.
    pub fn new(hunks: Vec<Hunk>) -> OpResult<Self> {
        if let Some(bad) = hunks.iter().find(|h| !h.op.is_sequence_op()) {
            return Err(OpError::InvalidArgument(format!(
                "{} cannot be used as a PATCH hunk operation",
                bad.op
            )));
        }
        Ok(Patch { hunks })
    }

    pub(crate) fn from_hunks(hunks: Vec<Hunk>) -> Self {
        Patch { hunks }
    }

    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    pub(crate) fn apply(&self, doc: &Doc) -> OpResult<Doc> {
        let src = elements_of(doc, "PATCH")?;
        let mut out = src.empty();
        let mut index = 0;
        for hunk in &self.hunks {
            let start = index + hunk.offset;
            let end = start + hunk.length;
            if end > src.len() {
                return Err(OpError::OutOfRange(format!(
                    "hunk +{}x{} ends at {end}, past the sequence length {}",
                    hunk.offset,
                    hunk.length,
                    src.len()
                )));
            }
            out.extend_from(&src, index, start);
            let slice = Doc::Present(src.slice(start, end));
            match hunk.op.apply_doc(&slice)? {
                Doc::Present(value) => out.append(value)?,
                Doc::Missing => {
                    return Err(OpError::TypeMismatch(format!("{} removed a subsequence", hunk.op)));
                }
            }
            index = end;
        }
        out.extend_from(&src, index, src.len());
        Ok(Doc::Present(out.into_value()))
    }

    /// Simplify hunk operations, drop hunks with no effect, and merge
    /// adjacent replacements into one.
    pub(crate) fn simplify(&self) -> Operation {
        let mut kept: Vec<Hunk> = Vec::with_capacity(self.hunks.len());
        let mut carry = 0;
        for hunk in &self.hunks {
            let op = hunk.op.simplify();
            if op.is_no_op() {
                carry += hunk.offset + hunk.length;
                continue;
            }
            if hunk.length == 0 && matches!(op.length_change(0), Ok(0)) {
                carry += hunk.offset;
                continue;
            }
            kept.push(Hunk::new(hunk.offset + carry, hunk.length, op));
            carry = 0;
        }

        // Merging needs to know whether the sequence holds chars or items.
        let kind = kept.iter().find_map(|h| match &h.op {
            Operation::Set(Doc::Present(v)) => SeqKind::of(v),
            _ => None,
        });
        let mut hunks: Vec<Hunk> = Vec::with_capacity(kept.len());
        for hunk in kept {
            if let (Some(kind), Some(prev), 0) = (kind, hunks.last_mut(), hunk.offset) {
                if let (Some(a), Some(b)) = (replacement(prev, kind), replacement(&hunk, kind)) {
                    prev.length += hunk.length;
                    prev.op = Operation::set(concat(a, b));
                    continue;
                }
            }
            hunks.push(hunk);
        }

        if hunks.is_empty() {
            Operation::NoOp
        } else {
            Operation::Patch(Patch { hunks })
        }
    }

    pub(crate) fn inverse(&self, doc: &Doc) -> OpResult<Operation> {
        let src = elements_of(doc, "PATCH")?;
        let mut hunks = Vec::with_capacity(self.hunks.len());
        let mut index = 0;
        for hunk in &self.hunks {
            let start = index + hunk.offset;
            let end = start + hunk.length;
            if end > src.len() {
                return Err(OpError::OutOfRange(format!("hunk ends at {end}, past {}", src.len())));
            }
            let new_length = grow(hunk.length, hunk.op.length_change(hunk.length)?)?;
            let slice = Doc::Present(src.slice(start, end));
            hunks.push(Hunk::new(hunk.offset, new_length, hunk.op.inverse_doc(&slice)?));
            index = end;
        }
        Ok(Operation::Patch(Patch { hunks }))
    }

    pub(crate) fn drilldown(&self, selector: &Selector) -> OpResult<Operation> {
        let Selector::Index(target) = *selector else {
            return Ok(Operation::NoOp);
        };
        let mut index = 0;
        for hunk in &self.hunks {
            let start = index + hunk.offset;
            if target < start {
                break;
            }
            if target < start + hunk.length {
                return hunk.op.drilldown(&Selector::Index(target - start));
            }
            index = start + hunk.length;
        }
        Ok(Operation::NoOp)
    }

    pub(crate) fn length_change(&self) -> OpResult<isize> {
        self.hunks
            .iter()
            .try_fold(0, |sum: isize, h| -> OpResult<isize> { Ok(sum + h.op.length_change(h.length)?) })
    }

    /// Split at `at_index`, measured before (`in_out == false`) or after
    /// (`in_out == true`) this patch applies. A hunk straddling the split
    /// point is decomposed itself.
    pub(crate) fn decompose(&self, in_out: bool, at_index: usize) -> OpResult<(Operation, Operation)> {
        let mut left = Vec::new();
        let mut right = Vec::new();
        let (mut index_in, mut index_out) = (0, 0);
        let mut rest = self.hunks.iter();
        while let Some(hunk) = rest.next() {
            let change = hunk.op.length_change(hunk.length)?;
            let (start_in, start_out) = (index_in + hunk.offset, index_out + hunk.offset);
            let end_in = start_in + hunk.length;
            let end_out = grow(start_out + hunk.length, change)?;
            let (start, end) = if in_out { (start_out, end_out) } else { (start_in, end_in) };

            if end <= at_index {
                left.push(hunk.clone());
                index_in = end_in;
                index_out = end_out;
                continue;
            }
            if start >= at_index {
                right.push(Hunk::new(start - at_index, hunk.length, hunk.op.clone()));
            } else {
                let split = at_index - start;
                let (l, r) = hunk.op.decompose(in_out, split)?;
                let left_length = split_input_length(&hunk.op, hunk.length, change, in_out, split)?;
                left.push(Hunk::new(hunk.offset, left_length, l));
                right.push(Hunk::new(0, hunk.length - left_length, r));
            }
            right.extend(rest.by_ref().cloned());
            break;
        }
        Ok((Operation::Patch(Patch { hunks: left }), Operation::Patch(Patch { hunks: right })))
    }

    /// The input position that `decompose(true, at_index)` splits at.
    fn input_position(&self, at_index: usize) -> OpResult<usize> {
        let (mut index_in, mut index_out) = (0, 0);
        for hunk in &self.hunks {
            let change = hunk.op.length_change(hunk.length)?;
            let (start_in, start_out) = (index_in + hunk.offset, index_out + hunk.offset);
            let end_out = grow(start_out + hunk.length, change)?;
            if end_out <= at_index {
                index_in = start_in + hunk.length;
                index_out = end_out;
                continue;
            }
            if start_out >= at_index {
                break;
            }
            let split = at_index - start_out;
            return Ok(start_in + split_input_length(&hunk.op, hunk.length, change, true, split)?);
        }
        Ok(index_in + (at_index - index_out))
    }
}

/// Input length of the left part when a hunk is split at `split`.
///
/// Splitting by output position pins down the input length when the hunk
/// keeps its length, when it is a SET (whose left part takes as much of the
/// old span as it can), or when it is a PATCH (mapped back through its
/// hunks).
pub(crate) fn split_input_length(
    op: &Operation,
    length: usize,
    change: isize,
    in_out: bool,
    split: usize,
) -> OpResult<usize> {
    if !in_out || change == 0 {
        Ok(split.min(length))
    } else if matches!(op, Operation::Set(_)) {
        Ok(split.min(length))
    } else if let Operation::Patch(patch) = op {
        Ok(patch.input_position(split)?.min(length))
    } else {
        Err(OpError::TypeMismatch(format!(
            "{op} cannot be split at output position {split}"
        )))
    }
}

/// `length + change`, which must stay non-negative.
pub(crate) fn grow(length: usize, change: isize) -> OpResult<usize> {
    length
        .checked_add_signed(change)
        .ok_or_else(|| OpError::OutOfRange(format!("length {length} cannot change by {change}")))
}

/// The value a hunk replaces its span with, when that is known without
/// looking at the document.
fn replacement(hunk: &Hunk, kind: SeqKind) -> Option<Value> {
    match &hunk.op {
        Operation::Set(Doc::Present(v)) if SeqKind::of(v) == Some(kind) => Some(v.clone()),
        Operation::Map(inner) => match (&**inner, kind) {
            (Operation::Set(Doc::Present(Value::String(s))), SeqKind::Chars) if s.chars().count() == 1 => {
                Some(Value::String(s.repeat(hunk.length)))
            }
            (Operation::Set(Doc::Present(v)), SeqKind::Items) => Some(Value::Array(vec![v.clone(); hunk.length])),
            _ => None,
        },
        _ => None,
    }
}

fn concat(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::String(mut a), Value::String(b)) => {
            a.push_str(&b);
            Value::String(a)
        }
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Value::Array(a)
        }
        (a, _) => a,
    }
}

// ── MAP ───────────────────────────────────────────────────────────────────

pub(crate) fn map_apply(op: &Operation, doc: &Doc) -> OpResult<Doc> {
    match doc.as_value() {
        Some(Value::String(s)) => {
            let mut out = String::with_capacity(s.len());
            for c in s.chars() {
                match op.apply_doc(&Doc::Present(Value::String(c.to_string())))? {
                    Doc::Present(Value::String(r)) if r.chars().count() == 1 => out.push_str(&r),
                    other => {
                        return Err(OpError::TypeMismatch(format!(
                            "MAP over a string must yield single characters, got {}",
                            other.type_name()
                        )));
                    }
                }
            }
            Ok(Doc::Present(Value::String(out)))
        }
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match op.apply_doc(&Doc::Present(item.clone()))? {
                    Doc::Present(v) => out.push(v),
                    Doc::Missing => {
                        return Err(OpError::TypeMismatch(format!("{op} removed an array element")));
                    }
                }
            }
            Ok(Doc::Present(Value::Array(out)))
        }
        _ => Err(OpError::TypeMismatch(format!(
            "MAP needs a string or array, got {}",
            doc.type_name()
        ))),
    }
}

pub(crate) fn map_simplify(op: &Operation) -> Operation {
    match op.simplify() {
        Operation::NoOp => Operation::NoOp,
        inner => Operation::map(inner),
    }
}

/// The inverse of a MAP depends on each element, so in general it is a
/// PATCH of per-element MAPs. When every element inverts the same way it
/// collapses back to a single MAP.
pub(crate) fn map_inverse(op: &Operation, doc: &Doc) -> OpResult<Operation> {
    let src = elements_of(doc, "MAP")?;
    let inverses = (0..src.len())
        .map(|i| op.inverse_doc(&Doc::Present(src.get(i))))
        .collect::<OpResult<Vec<_>>>()?;
    match inverses.split_first() {
        None => Ok(Operation::NoOp),
        Some((first, others)) if others.iter().all(|inv| inv == first) => Ok(Operation::map(first.clone())),
        Some(_) => Ok(Operation::Patch(Patch {
            hunks: inverses
                .into_iter()
                .map(|inv| Hunk::new(0, 1, Operation::map(inv)))
                .collect(),
        })),
    }
}

// ── Element views ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeqKind {
    Chars,
    Items,
}

impl SeqKind {
    fn of(value: &Value) -> Option<SeqKind> {
        match value {
            Value::String(_) => Some(SeqKind::Chars),
            Value::Array(_) => Some(SeqKind::Items),
            _ => None,
        }
    }
}

pub(crate) fn is_sequence(value: &Value) -> bool {
    SeqKind::of(value).is_some()
}

/// Length in chars (strings) or elements (arrays).
pub(crate) fn seq_len(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Elements `start..end` of a string or array, clamped to its length.
pub(crate) fn seq_slice(value: &Value, start: usize, end: usize) -> Value {
    match value {
        Value::String(s) => Value::String(s.chars().skip(start).take(end.saturating_sub(start)).collect()),
        Value::Array(items) => {
            let end = end.min(items.len());
            Value::Array(items.get(start.min(end)..end).unwrap_or_default().to_vec())
        }
        other => other.clone(),
    }
}

/// A string or array unpacked for positional access.
#[derive(Debug, Clone)]
pub(crate) enum Elements {
    Chars(Vec<char>),
    Items(Vec<Value>),
}

impl Elements {
    pub(crate) fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Elements::Chars(s.chars().collect())),
            Value::Array(items) => Some(Elements::Items(items.clone())),
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Elements::Chars(c) => c.len(),
            Elements::Items(i) => i.len(),
        }
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> Value {
        match self {
            Elements::Chars(c) => Value::String(c[start..end].iter().collect()),
            Elements::Items(i) => Value::Array(i[start..end].to_vec()),
        }
    }

    /// Element `i`: a one-char string, or an array item.
    pub(crate) fn get(&self, i: usize) -> Value {
        match self {
            Elements::Chars(c) => Value::String(c[i].to_string()),
            Elements::Items(items) => items[i].clone(),
        }
    }

    fn empty(&self) -> Elements {
        match self {
            Elements::Chars(_) => Elements::Chars(Vec::new()),
            Elements::Items(_) => Elements::Items(Vec::new()),
        }
    }

    fn extend_from(&mut self, src: &Elements, start: usize, end: usize) {
        match (self, src) {
            (Elements::Chars(out), Elements::Chars(c)) => out.extend_from_slice(&c[start..end]),
            (Elements::Items(out), Elements::Items(i)) => out.extend_from_slice(&i[start..end]),
            _ => {}
        }
    }

    fn append(&mut self, value: Value) -> OpResult<()> {
        match (self, value) {
            (Elements::Chars(out), Value::String(s)) => out.extend(s.chars()),
            (Elements::Items(out), Value::Array(items)) => out.extend(items),
            (_, other) => {
                return Err(OpError::TypeMismatch(format!(
                    "hunk produced {}, which does not match the sequence",
                    crate::types::type_name(&other)
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn into_value(self) -> Value {
        match self {
            Elements::Chars(c) => Value::String(c.into_iter().collect()),
            Elements::Items(i) => Value::Array(i),
        }
    }
}

pub(crate) fn elements_of(doc: &Doc, what: &str) -> OpResult<Elements> {
    doc.as_value().and_then(Elements::of).ok_or_else(|| {
        OpError::TypeMismatch(format!("{what} needs a string or array, got {}", doc.type_name()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn splice(pos: usize, len: usize, value: Value) -> Operation {
        Operation::splice(pos, len, value).unwrap()
    }

    #[test]
    fn splice_strings_and_arrays() {
        assert_eq!(splice(1, 2, json!("XYZ")).apply(&json!("abcd")).unwrap(), json!("aXYZd"));
        assert_eq!(splice(0, 1, json!([9, 9])).apply(&json!([1, 2])).unwrap(), json!([9, 9, 2]));
        assert_eq!(Operation::insert(4, "!").unwrap().apply(&json!("abcd")).unwrap(), json!("abcd!"));
        assert_eq!(Operation::delete_str(0, 2).unwrap().apply(&json!("abcd")).unwrap(), json!("cd"));
    }

    #[test]
    fn output_positions_map_back_through_nested_patches() {
        let grow = Patch::new(vec![Hunk::new(1, 0, Operation::set("XY"))]).unwrap();
        let positions: Vec<usize> = (0..=4).map(|at| grow.input_position(at).unwrap()).collect();
        assert_eq!(positions, vec![0, 1, 1, 1, 2]);

        let shrink = Patch::new(vec![Hunk::new(1, 2, Operation::set(""))]).unwrap();
        assert_eq!(shrink.input_position(1).unwrap(), 3);
        let op = Operation::Patch(grow);
        assert_eq!(split_input_length(&op, 3, 2, true, 2).unwrap(), 1);
    }

    #[test]
    fn strings_are_indexed_by_char() {
        assert_eq!(splice(1, 1, json!("é")).apply(&json!("añb")).unwrap(), json!("aéb"));
    }

    #[test]
    fn hunk_past_end_is_rejected() {
        let err = splice(3, 2, json!("x")).apply(&json!("abcd")).unwrap_err();
        assert!(matches!(err, OpError::OutOfRange(_)));
    }

    #[test]
    fn hunk_result_must_match_sequence_type() {
        assert!(splice(0, 1, json!([1])).apply(&json!("abc")).is_err());
    }

    #[test]
    fn patch_rejects_non_sequence_hunk_ops() {
        assert!(Operation::patch(vec![Hunk::new(0, 1, Operation::put("a", 1))]).is_err());
        assert!(Operation::patch(vec![Hunk::new(0, 1, Operation::set(1))]).is_err());
        assert!(Operation::patch(vec![Hunk::new(0, 1, Operation::map(Operation::set(1)))]).is_ok());
    }

    #[test]
    fn map_over_strings_and_arrays() {
        let inc = Operation::map(Operation::math("add", json!(1)).unwrap());
        assert_eq!(inc.apply(&json!([1, 2, 3])).unwrap(), json!([2, 3, 4]));
        let star = Operation::map(Operation::set("*"));
        assert_eq!(star.apply(&json!("abc")).unwrap(), json!("***"));
        assert!(Operation::map(Operation::set("**")).apply(&json!("ab")).is_err());
    }

    #[test]
    fn at_index_on_nested_values() {
        let op = Operation::at_index(1, Operation::put("k", true));
        assert_eq!(op.apply(&json!([{}, {}])).unwrap(), json!([{}, {"k": true}]));
    }

    #[test]
    fn simplify_drops_no_op_hunks_and_merges_sets() {
        let op = Operation::patch(vec![
            Hunk::new(1, 2, Operation::NoOp),
            Hunk::new(1, 1, Operation::set("x")),
            Hunk::new(0, 2, Operation::set("yz")),
            Hunk::new(0, 1, Operation::map(Operation::set("q"))),
        ])
        .unwrap();
        let simple = op.simplify();
        assert_eq!(simple, Operation::patch(vec![Hunk::new(4, 4, Operation::set("xyzq"))]).unwrap());
        assert_eq!(simple.apply(&json!("abcdefghij")).unwrap(), op.apply(&json!("abcdefghij")).unwrap());
        assert_eq!(simple.simplify(), simple);
    }

    #[test]
    fn simplify_empty_patch_is_no_op() {
        let op = Operation::patch(vec![Hunk::new(2, 0, Operation::set(""))]).unwrap();
        assert_eq!(op.simplify(), Operation::NoOp);
    }

    #[test]
    fn inverse_restores_sequence() {
        let doc = json!("hello world");
        let op = Operation::patch(vec![
            Hunk::new(0, 1, Operation::set("J")),
            Hunk::new(4, 1, Operation::set("")),
            Hunk::new(0, 0, Operation::set("!!")),
        ])
        .unwrap();
        let after = op.apply(&doc).unwrap();
        assert_eq!(after, json!("Jello!!world"));
        assert_eq!(op.inverse(&doc).unwrap().apply(&after).unwrap(), doc);
    }

    #[test]
    fn map_inverse_collapses_when_uniform() {
        let inc = Operation::map(Operation::math("add", json!(1)).unwrap());
        let inv = inc.inverse(&json!([1, 2])).unwrap();
        assert_eq!(inv, Operation::map(Operation::math("add", json!(-1)).unwrap()));
        let set = Operation::map(Operation::set(0));
        let inv = set.inverse(&json!([1, 2])).unwrap();
        assert_eq!(inv.apply(&json!([0, 0])).unwrap(), json!([1, 2]));
    }

    #[test]
    fn drilldown_finds_hunk() {
        let op = Operation::at_indices([(2, Operation::set("x")), (5, Operation::set("y"))]);
        assert_eq!(op.drilldown(&Selector::Index(5)).unwrap(), Operation::set("y"));
        assert_eq!(op.drilldown(&Selector::Index(3)).unwrap(), Operation::NoOp);
        assert_eq!(op.drilldown(&Selector::Key("a".into())).unwrap(), Operation::NoOp);
    }

    #[test]
    fn length_change_sums_hunks() {
        let op = Operation::patch(vec![
            Hunk::new(0, 2, Operation::set("abcd")),
            Hunk::new(1, 3, Operation::set("")),
        ])
        .unwrap();
        assert_eq!(op.length_change(10).unwrap(), -1);
    }

    #[test]
    fn decompose_by_input_position() {
        let op = Operation::patch(vec![
            Hunk::new(1, 1, Operation::set("X")),
            Hunk::new(2, 2, Operation::set("YY")),
        ])
        .unwrap();
        let doc = json!("abcdefg");
        let (left, right) = op.decompose(false, 5).unwrap();
        // left covers "abcde", right covers "fg"
        let l = left.apply(&json!("abcde")).unwrap();
        let r = right.apply(&json!("fg")).unwrap();
        let joined = format!("{}{}", l.as_str().unwrap(), r.as_str().unwrap());
        assert_eq!(json!(joined), op.apply(&doc).unwrap());
    }

    #[test]
    fn decompose_by_output_position_splits_set() {
        let op = Operation::patch(vec![Hunk::new(1, 2, Operation::set("WXYZ"))]).unwrap();
        let (left, right) = op.decompose(true, 3).unwrap();
        assert_eq!(left, Operation::patch(vec![Hunk::new(1, 2, Operation::set("WX"))]).unwrap());
        assert_eq!(right, Operation::patch(vec![Hunk::new(0, 0, Operation::set("YZ"))]).unwrap());
    }
}
