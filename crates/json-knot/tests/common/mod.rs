#![allow(dead_code)]

use json_knot::{Operation, RebaseOptions};
use proptest::prelude::*;
use serde_json::{json, Value};

pub fn splice(pos: usize, len: usize, value: impl Into<Value>) -> Operation {
    Operation::splice(pos, len, value).expect("valid splice")
}

pub fn math(operator: &str, operand: Value) -> Operation {
    Operation::math(operator, operand).expect("valid MATH")
}

/// Apply `a` and `b` concurrently to `doc` through both rebase orders.
/// Returns `None` if either direction conflicts.
pub fn diamond(a: &Operation, b: &Operation, doc: &Value, opts: RebaseOptions<'_>) -> Option<(Value, Value)> {
    let a2 = a.rebase(b, opts).expect("rebase a onto b")?;
    let b2 = b.rebase(a, opts).expect("rebase b onto a")?;
    let left = a2.apply(&b.apply(doc).expect("apply b")).expect("apply rebased a");
    let right = b2.apply(&a.apply(doc).expect("apply a")).expect("apply rebased b");
    Some((left, right))
}

// ── Generators ────────────────────────────────────────────────────────────

pub fn small_string() -> impl Strategy<Value = String> {
    "[a-e]{0,8}"
}

/// A splice that fits a string of `len` characters.
pub fn splice_for(len: usize) -> impl Strategy<Value = Operation> {
    (0..=len)
        .prop_flat_map(move |pos| (Just(pos), 0..=len - pos, "[v-z]{0,3}"))
        .prop_map(|(pos, del, text)| splice(pos, del, text))
}

/// A splice, or a single-character replacement via ATINDEX.
pub fn string_edit_for(len: usize) -> BoxedStrategy<Operation> {
    if len == 0 {
        return splice_for(len).boxed();
    }
    prop_oneof![
        3 => splice_for(len),
        1 => (0..len, "[v-z]").prop_map(|(i, c)| Operation::at_index(i, Operation::set(c))),
        1 => "[a-z]{0,4}".prop_map(|s: String| Operation::set(s)),
    ]
    .boxed()
}

/// A string document with two edits made concurrently against it.
pub fn concurrent_string_edits() -> impl Strategy<Value = (String, Operation, Operation)> {
    small_string().prop_flat_map(|doc| {
        let len = doc.chars().count();
        (Just(doc), string_edit_for(len), string_edit_for(len))
    })
}

/// A string document with two splices made concurrently against it.
pub fn concurrent_splices() -> impl Strategy<Value = (String, Operation, Operation)> {
    small_string().prop_flat_map(|doc| {
        let len = doc.chars().count();
        (Just(doc), splice_for(len), splice_for(len))
    })
}

/// A string document with a splice and a second splice that applies to
/// the first one's output.
pub fn sequential_splices() -> impl Strategy<Value = (String, Operation, Operation)> {
    small_string()
        .prop_flat_map(|doc| {
            let len = doc.chars().count();
            (Just(doc), splice_for(len))
        })
        .prop_flat_map(|(doc, a)| {
            let after = a.apply(&json!(doc)).expect("generated splice applies");
            let len = after.as_str().map_or(0, |s| s.chars().count());
            (Just(doc), Just(a), splice_for(len))
        })
}

pub fn int_math() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (-50i64..50).prop_map(|n| math("add", json!(n))),
        prop_oneof![Just(-2i64), Just(2), Just(4)].prop_map(|n| math("mult", json!(n))),
        (-3i64..4).prop_map(|n| math("rot", json!([n, 4]))),
        (0i64..16).prop_map(|n| math("and", json!(n))),
        (0i64..16).prop_map(|n| math("or", json!(n))),
        (0i64..16).prop_map(|n| math("xor", json!(n))),
        Just(math("not", Value::Null)),
    ]
}

// ── Array generators ──────────────────────────────────────────────────────

pub fn small_int_array() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..10, 1..6)
}

/// A splice that fits an array of `len` items.
pub fn array_splice_for(len: usize) -> impl Strategy<Value = Operation> {
    (0..=len)
        .prop_flat_map(move |pos| (Just(pos), 0..=len - pos, prop::collection::vec(10i64..20, 0..3)))
        .prop_map(|(pos, del, items)| splice(pos, del, json!(items)))
}

/// A splice, an element edit via ATINDEX, or a MAP over every element.
pub fn array_edit_for(len: usize) -> BoxedStrategy<Operation> {
    if len == 0 {
        return array_splice_for(len).boxed();
    }
    prop_oneof![
        3 => array_splice_for(len),
        2 => (0..len, -3i64..4).prop_map(|(i, n)| Operation::at_index(i, math("add", json!(n)))),
        1 => (0..len, 20i64..30).prop_map(|(i, v)| Operation::at_index(i, Operation::set(v))),
        1 => (-3i64..4).prop_map(|n| Operation::map(math("add", json!(n)))),
    ]
    .boxed()
}

/// An array document with two edits made concurrently against it.
pub fn concurrent_array_edits() -> impl Strategy<Value = (Vec<i64>, Operation, Operation)> {
    small_int_array().prop_flat_map(|doc| {
        let len = doc.len();
        (Just(doc), array_edit_for(len), array_edit_for(len))
    })
}

/// An array document with two splices made concurrently against it.
pub fn concurrent_array_splices() -> impl Strategy<Value = (Vec<i64>, Operation, Operation)> {
    small_int_array().prop_flat_map(|doc| {
        let len = doc.len();
        (Just(doc), array_splice_for(len), array_splice_for(len))
    })
}

/// An array document with an edit and a second edit that applies to the
/// first one's output.
pub fn sequential_array_edits() -> impl Strategy<Value = (Vec<i64>, Operation, Operation)> {
    small_int_array()
        .prop_flat_map(|doc| {
            let len = doc.len();
            (Just(doc), array_edit_for(len))
        })
        .prop_flat_map(|(doc, a)| {
            let after = a.apply(&json!(doc)).expect("generated edit applies");
            let len = after.as_array().map_or(0, Vec::len);
            (Just(doc), Just(a), array_edit_for(len))
        })
}

// ── Object generators ─────────────────────────────────────────────────────

/// `{"a": _, "b": _}` with small integer members.
pub fn small_object() -> impl Strategy<Value = Value> {
    (0i64..5, 0i64..5).prop_map(|(a, b)| json!({"a": a, "b": b}))
}

fn existing_key() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("a"), Just("b")]
}

fn any_key() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("a"), Just("b"), Just("c")]
}

fn put_edit() -> impl Strategy<Value = Operation> {
    (any_key(), 0i64..5).prop_map(|(k, v)| Operation::put(k, v))
}

fn add_edit() -> impl Strategy<Value = Operation> {
    (existing_key(), -3i64..4).prop_map(|(k, n)| Operation::apply_key(k, math("add", json!(n))))
}

fn copy_edit() -> impl Strategy<Value = Operation> {
    prop_oneof![Just(("/a", "/b")), Just(("/b", "/a")), Just(("/a", "/c"))]
        .prop_map(|pair| Operation::copy([pair]).expect("valid COPY"))
}

/// A PUT, REM or MATH edit against a [`small_object`].
pub fn object_edit() -> impl Strategy<Value = Operation> {
    prop_oneof![put_edit(), existing_key().prop_map(Operation::rem), add_edit()]
}

/// Up to three PUT, MATH or COPY edits in sequence. Every member stays an
/// integer, so each step applies to the output of the last.
pub fn object_sequence() -> impl Strategy<Value = Operation> {
    prop::collection::vec(prop_oneof![put_edit(), add_edit(), copy_edit()], 1..4).prop_map(Operation::list)
}
