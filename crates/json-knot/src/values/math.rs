//! MATH: arithmetic and bitwise transforms of numbers and booleans.
//!
//! Integer arithmetic stays in `i64` while it fits and falls back to `f64`
//! otherwise. Float results with no fractional part are stored as integers,
//! so `2.5 * 2` is `5`, not `5.0`.

use std::fmt;

use serde_json::{json, Number, Value};

use crate::cmp::cmp_values;
use crate::operation::Operation;
use crate::types::{Doc, OpError, OpResult, RebaseOptions};

/// Largest integer an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Operand of the bitwise operators. Integers combine with integer
/// documents, booleans with boolean documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bits {
    Int(i64),
    Bool(bool),
}

impl Bits {
    fn to_value(self) -> Value {
        match self {
            Bits::Int(n) => json!(n),
            Bits::Bool(b) => json!(b),
        }
    }

    fn is_zero(self) -> bool {
        matches!(self, Bits::Int(0) | Bits::Bool(false))
    }

    fn complement(self) -> Bits {
        match self {
            Bits::Int(n) => Bits::Int(!n),
            Bits::Bool(b) => Bits::Bool(!b),
        }
    }

    fn and(self, other: Bits) -> Option<Bits> {
        match (self, other) {
            (Bits::Int(a), Bits::Int(b)) => Some(Bits::Int(a & b)),
            (Bits::Bool(a), Bits::Bool(b)) => Some(Bits::Bool(a && b)),
            _ => None,
        }
    }

    fn or(self, other: Bits) -> Option<Bits> {
        match (self, other) {
            (Bits::Int(a), Bits::Int(b)) => Some(Bits::Int(a | b)),
            (Bits::Bool(a), Bits::Bool(b)) => Some(Bits::Bool(a || b)),
            _ => None,
        }
    }

    fn xor(self, other: Bits) -> Option<Bits> {
        match (self, other) {
            (Bits::Int(a), Bits::Int(b)) => Some(Bits::Int(a ^ b)),
            (Bits::Bool(a), Bits::Bool(b)) => Some(Bits::Bool(a ^ b)),
            _ => None,
        }
    }

    /// Read `value` as the same kind of bits as `self`.
    fn same_kind_of(self, value: &Value) -> Option<Bits> {
        match (self, value) {
            (Bits::Int(_), Value::Number(n)) => as_integer(n).map(Bits::Int),
            (Bits::Bool(_), Value::Bool(b)) => Some(Bits::Bool(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bits::Int(n) if *n < 0 => write!(f, "-0x{:x}", n.unsigned_abs()),
            Bits::Int(n) => write!(f, "0x{n:x}"),
            Bits::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Add(Number),
    Mult(Number),
    Rot { increment: i64, modulus: i64 },
    And(Bits),
    Or(Bits),
    Xor(Bits),
    Not,
}

/// A validated MATH operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Math {
    kind: Kind,
}

impl Math {
    /// Build from an operator name and its JSON operand.
    ///
    /// - `add`, `mult`: a number
    /// - `rot`: `[increment, modulus]`, integers with `modulus > 1` and
    ///   `|increment| < modulus`
    /// - `and`, `or`, `xor`: an integer or a boolean
    /// - `not`: `null`
    pub fn new(operator: &str, operand: Value) -> OpResult<Self> {
        let kind = match (operator, &operand) {
            ("add", Value::Number(n)) => Kind::Add(n.clone()),
            ("mult", Value::Number(n)) => Kind::Mult(n.clone()),
            ("rot", Value::Array(pair)) => match pair.as_slice() {
                [Value::Number(i), Value::Number(m)] => match (as_integer(i), as_integer(m)) {
                    (Some(increment), Some(modulus)) => rot_kind(increment, modulus)?,
                    _ => return Err(bad_operand(operator, &operand)),
                },
                _ => return Err(bad_operand(operator, &operand)),
            },
            ("and" | "or" | "xor", _) => {
                let bits = match &operand {
                    Value::Bool(b) => Bits::Bool(*b),
                    Value::Number(n) => as_integer(n).map(Bits::Int).ok_or_else(|| bad_operand(operator, &operand))?,
                    _ => return Err(bad_operand(operator, &operand)),
                };
                match operator {
                    "and" => Kind::And(bits),
                    "or" => Kind::Or(bits),
                    _ => Kind::Xor(bits),
                }
            }
            ("not", Value::Null) => Kind::Not,
            ("add" | "mult" | "rot" | "not", _) => return Err(bad_operand(operator, &operand)),
            _ => return Err(OpError::InvalidArgument(format!("unknown MATH operator {operator:?}"))),
        };
        Ok(Math { kind })
    }

    pub fn rot(increment: i64, modulus: i64) -> OpResult<Self> {
        rot_kind(increment, modulus).map(|kind| Math { kind })
    }

    pub fn operator(&self) -> &'static str {
        match self.kind {
            Kind::Add(_) => "add",
            Kind::Mult(_) => "mult",
            Kind::Rot { .. } => "rot",
            Kind::And(_) => "and",
            Kind::Or(_) => "or",
            Kind::Xor(_) => "xor",
            Kind::Not => "not",
        }
    }

    pub fn operand(&self) -> Value {
        match &self.kind {
            Kind::Add(n) | Kind::Mult(n) => Value::Number(n.clone()),
            Kind::Rot { increment, modulus } => json!([increment, modulus]),
            Kind::And(b) | Kind::Or(b) | Kind::Xor(b) => b.to_value(),
            Kind::Not => Value::Null,
        }
    }

    pub(crate) fn apply(&self, doc: &Doc) -> OpResult<Value> {
        let mismatch = || OpError::TypeMismatch(format!("{self} cannot apply to {}", doc.type_name()));
        let value = doc.as_value().ok_or_else(mismatch)?;
        match (&self.kind, value) {
            (Kind::Add(k), Value::Number(x)) => add_numbers(x, k).map(Value::Number),
            (Kind::Mult(k), Value::Number(x)) => mul_numbers(x, k).map(Value::Number),
            (Kind::Rot { increment, modulus }, Value::Number(x)) => {
                let x = as_integer(x)
                    .filter(|x| (0..*modulus).contains(x))
                    .ok_or_else(|| OpError::OutOfRange(format!("{self} requires 0 <= {value} < {modulus}")))?;
                Ok(json!(rotate(x, *increment, *modulus)))
            }
            (Kind::And(k), _) => k.same_kind_of(value).and_then(|x| x.and(*k)).map(Bits::to_value).ok_or_else(mismatch),
            (Kind::Or(k), _) => k.same_kind_of(value).and_then(|x| x.or(*k)).map(Bits::to_value).ok_or_else(mismatch),
            (Kind::Xor(k), _) => k.same_kind_of(value).and_then(|x| x.xor(*k)).map(Bits::to_value).ok_or_else(mismatch),
            (Kind::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (Kind::Not, Value::Number(x)) => as_integer(x).map(|x| json!(!x)).ok_or_else(mismatch),
            _ => Err(mismatch()),
        }
    }

    /// Degenerate operands collapse to NO_OP or SET.
    pub(crate) fn simplify(&self) -> Operation {
        match &self.kind {
            Kind::Add(k) if to_f64(k) == 0.0 => Operation::NoOp,
            Kind::Mult(k) if to_f64(k) == 1.0 => Operation::NoOp,
            Kind::Rot { increment: 0, .. } => Operation::NoOp,
            Kind::And(k) if k.is_zero() => Operation::set(k.to_value()),
            Kind::Or(k) | Kind::Xor(k) if k.is_zero() => Operation::NoOp,
            _ => Operation::Math(self.clone()),
        }
    }

    pub(crate) fn inverse(&self, doc: &Doc) -> OpResult<Operation> {
        let kind = match &self.kind {
            Kind::Add(k) => Kind::Add(negate(k)?),
            Kind::Mult(k) => Kind::Mult(
                float_number(1.0 / to_f64(k))
                    .map_err(|_| OpError::InvalidArgument(format!("{self} has no inverse")))?,
            ),
            Kind::Rot { increment, modulus } => Kind::Rot {
                increment: -increment,
                modulus: *modulus,
            },
            // x & k loses the bits of x outside k; put them back.
            Kind::And(k) => Kind::Or(self.doc_bits(doc, *k)?.and(k.complement()).ok_or_else(|| self.doc_mismatch(doc))?),
            // x | k sets the bits of k that x lacked; clear those.
            Kind::Or(k) => Kind::Xor(self.doc_bits(doc, *k)?.complement().and(*k).ok_or_else(|| self.doc_mismatch(doc))?),
            Kind::Xor(_) | Kind::Not => self.kind.clone(),
        };
        Ok(Operation::Math(Math { kind }))
    }

    pub(crate) fn atomic_compose(&self, other: &Operation) -> Option<Operation> {
        let Operation::Math(other) = other else {
            return None;
        };
        let kind = match (&self.kind, &other.kind) {
            (Kind::Add(a), Kind::Add(b)) => Kind::Add(add_numbers(a, b).ok()?),
            (Kind::Mult(a), Kind::Mult(b)) => Kind::Mult(mul_numbers(a, b).ok()?),
            (
                Kind::Rot { increment: a, modulus },
                Kind::Rot { increment: b, modulus: m2 },
            ) if modulus == m2 => Kind::Rot {
                increment: rotate(*a, *b, *modulus),
                modulus: *modulus,
            },
            (Kind::And(a), Kind::And(b)) => Kind::And(a.and(*b)?),
            (Kind::Or(a), Kind::Or(b)) => Kind::Or(a.or(*b)?),
            (Kind::Xor(a), Kind::Xor(b)) => Kind::Xor(a.xor(*b)?),
            (Kind::Not, Kind::Not) => return Some(Operation::NoOp),
            (Kind::And(a), Kind::Or(b)) if a == b => return Some(Operation::set(a.to_value())),
            (Kind::Or(a), Kind::Xor(b)) if a == b => Kind::And(a.complement()),
            _ => return None,
        };
        Some(Math { kind }.simplify())
    }

    /// MATH against MATH. Same operators commute. Different operators need a
    /// prior document in conflictless mode: the lower-ordered side becomes a
    /// SET of the value both orders should reach.
    pub(crate) fn rebase(&self, other: &Math, opts: RebaseOptions<'_>) -> OpResult<Option<(Operation, Operation)>> {
        if self.same_operator(other) {
            return Ok(Some((Operation::Math(self.clone()), Operation::Math(other.clone()))));
        }
        let Some(doc) = opts.prior() else {
            return Ok(None);
        };
        let this_key = json!([self.operator(), self.operand()]);
        let other_key = json!([other.operator(), other.operand()]);
        if !cmp_values(&this_key, &other_key).is_lt() {
            return Ok(None);
        }
        let this = Operation::Math(self.clone());
        let that = Operation::Math(other.clone());
        let result = this.compose(&that).apply_doc(doc)?;
        Ok(Some((Operation::Set(result), that)))
    }

    fn same_operator(&self, other: &Math) -> bool {
        match (&self.kind, &other.kind) {
            (Kind::Rot { modulus: a, .. }, Kind::Rot { modulus: b, .. }) => a == b,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    fn doc_bits(&self, doc: &Doc, like: Bits) -> OpResult<Bits> {
        doc.as_value()
            .and_then(|v| like.same_kind_of(v))
            .ok_or_else(|| self.doc_mismatch(doc))
    }

    fn doc_mismatch(&self, doc: &Doc) -> OpError {
        OpError::TypeMismatch(format!("{self} cannot apply to {}", doc.type_name()))
    }
}

impl fmt::Display for Math {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Add(n) => write!(f, "<MATH add:{n}>"),
            Kind::Mult(n) => write!(f, "<MATH mult:{n}>"),
            Kind::Rot { increment, modulus } => write!(f, "<MATH rot:{increment}%{modulus}>"),
            Kind::And(b) => write!(f, "<MATH and:{b}>"),
            Kind::Or(b) => write!(f, "<MATH or:{b}>"),
            Kind::Xor(b) => write!(f, "<MATH xor:{b}>"),
            Kind::Not => write!(f, "<MATH not>"),
        }
    }
}

fn rot_kind(increment: i64, modulus: i64) -> OpResult<Kind> {
    if modulus <= 1 {
        return Err(OpError::InvalidArgument(format!("rot modulus must be greater than one, got {modulus}")));
    }
    if increment.unsigned_abs() >= modulus.unsigned_abs() {
        return Err(OpError::InvalidArgument(format!(
            "rot increment {increment} must be smaller than the modulus {modulus}"
        )));
    }
    Ok(Kind::Rot { increment, modulus })
}

fn bad_operand(operator: &str, operand: &Value) -> OpError {
    OpError::InvalidArgument(format!("invalid operand {operand} for MATH {operator}"))
}

/// `(x + increment) mod modulus`, always in `0..modulus`.
fn rotate(x: i64, increment: i64, modulus: i64) -> i64 {
    // |x|, |increment| < modulus, so the i128 sum cannot overflow and the
    // result fits back into i64.
    ((x as i128 + increment as i128).rem_euclid(modulus as i128)) as i64
}

// ── Number helpers ────────────────────────────────────────────────────────

fn to_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

/// An integer view of `n`, accepting floats with no fractional part.
pub(crate) fn as_integer(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER)
            .map(|f| f as i64)
    })
}

fn float_number(f: f64) -> OpResult<Number> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        return Ok(Number::from(f as i64));
    }
    Number::from_f64(f).ok_or_else(|| OpError::TypeMismatch(format!("arithmetic result {f} is not a finite number")))
}

fn add_numbers(a: &Number, b: &Number) -> OpResult<Number> {
    if let Some(sum) = a.as_i64().zip(b.as_i64()).and_then(|(x, y)| x.checked_add(y)) {
        return Ok(sum.into());
    }
    float_number(to_f64(a) + to_f64(b))
}

fn mul_numbers(a: &Number, b: &Number) -> OpResult<Number> {
    if let Some(product) = a.as_i64().zip(b.as_i64()).and_then(|(x, y)| x.checked_mul(y)) {
        return Ok(product.into());
    }
    float_number(to_f64(a) * to_f64(b))
}

fn negate(n: &Number) -> OpResult<Number> {
    if let Some(neg) = n.as_i64().and_then(i64::checked_neg) {
        return Ok(neg.into());
    }
    float_number(-to_f64(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn math(op: &str, operand: Value) -> Operation {
        Operation::math(op, operand).unwrap()
    }

    #[test]
    fn rejects_bad_operands() {
        assert!(Math::new("add", json!("1")).is_err());
        assert!(Math::new("rot", json!([1, 1])).is_err());
        assert!(Math::new("rot", json!([5, 5])).is_err());
        assert!(Math::new("rot", json!([1])).is_err());
        assert!(Math::new("and", json!(1.5)).is_err());
        assert!(Math::new("not", json!(0)).is_err());
        assert!(Math::new("pow", json!(2)).is_err());
        assert!(Math::new("rot", json!([-4, 5])).is_ok());
    }

    #[test]
    fn arithmetic() {
        assert_eq!(math("add", json!(3)).apply(&json!(4)).unwrap(), json!(7));
        assert_eq!(math("add", json!(0.5)).apply(&json!(1)).unwrap(), json!(1.5));
        assert_eq!(math("mult", json!(2)).apply(&json!(2.5)).unwrap(), json!(5));
        assert_eq!(math("rot", json!([3, 5])).apply(&json!(4)).unwrap(), json!(2));
        assert_eq!(math("rot", json!([-3, 5])).apply(&json!(1)).unwrap(), json!(3));
    }

    #[test]
    fn rot_requires_value_in_range() {
        let err = math("rot", json!([1, 5])).apply(&json!(7)).unwrap_err();
        assert!(matches!(err, OpError::OutOfRange(_)));
    }

    #[test]
    fn bitwise_on_integers_and_booleans() {
        assert_eq!(math("and", json!(0b1100)).apply(&json!(0b1010)).unwrap(), json!(0b1000));
        assert_eq!(math("or", json!(0b1100)).apply(&json!(0b1010)).unwrap(), json!(0b1110));
        assert_eq!(math("xor", json!(0b1100)).apply(&json!(0b1010)).unwrap(), json!(0b0110));
        assert_eq!(math("not", Value::Null).apply(&json!(0)).unwrap(), json!(-1));
        assert_eq!(math("and", json!(true)).apply(&json!(false)).unwrap(), json!(false));
        assert_eq!(math("xor", json!(true)).apply(&json!(true)).unwrap(), json!(false));
        assert_eq!(math("not", Value::Null).apply(&json!(true)).unwrap(), json!(false));
        assert!(math("and", json!(true)).apply(&json!(1)).is_err());
        assert!(math("add", json!(1)).apply(&json!("x")).is_err());
    }

    #[test]
    fn simplify_degenerate_operands() {
        assert_eq!(math("add", json!(0)).simplify(), Operation::NoOp);
        assert_eq!(math("mult", json!(1)).simplify(), Operation::NoOp);
        assert_eq!(math("rot", json!([0, 3])).simplify(), Operation::NoOp);
        assert_eq!(math("and", json!(0)).simplify(), Operation::set(0));
        assert_eq!(math("and", json!(false)).simplify(), Operation::set(false));
        assert_eq!(math("or", json!(false)).simplify(), Operation::NoOp);
        assert_eq!(math("xor", json!(0)).simplify(), Operation::NoOp);
        assert_eq!(math("xor", json!(1)).simplify(), math("xor", json!(1)));
    }

    #[test]
    fn compose_same_operators() {
        assert_eq!(math("add", json!(1)).compose(&math("add", json!(2))), math("add", json!(3)));
        assert_eq!(math("add", json!(1)).compose(&math("add", json!(-1))), Operation::NoOp);
        assert_eq!(math("rot", json!([3, 5])).compose(&math("rot", json!([4, 5]))), math("rot", json!([2, 5])));
        assert_eq!(math("not", Value::Null).compose(&math("not", Value::Null)), Operation::NoOp);
        assert_eq!(math("and", json!(5)).compose(&math("or", json!(5))), Operation::set(5));
        assert_eq!(math("or", json!(true)).compose(&math("xor", json!(true))), math("and", json!(false)).simplify());
    }

    #[test]
    fn inverse_restores_value() {
        let cases = [
            (math("add", json!(7)), json!(3)),
            (math("mult", json!(4)), json!(3)),
            (math("rot", json!([2, 5])), json!(4)),
            (math("and", json!(0b0110)), json!(0b1011)),
            (math("or", json!(0b0110)), json!(0b1011)),
            (math("xor", json!(0b0110)), json!(0b1011)),
            (math("not", Value::Null), json!(12)),
            (math("and", json!(false)), json!(true)),
            (math("or", json!(true)), json!(false)),
        ];
        for (op, doc) in cases {
            let after = op.apply(&doc).unwrap();
            let inv = op.inverse(&doc).unwrap();
            assert_eq!(inv.apply(&after).unwrap(), doc, "inverse of {op}");
        }
    }

    #[test]
    fn mult_by_zero_has_no_inverse() {
        assert!(math("mult", json!(0)).inverse(&json!(1)).is_err());
    }

    #[test]
    fn different_operators_need_a_document() {
        let add = math("add", json!(2));
        let mult = math("mult", json!(3));
        assert_eq!(add.rebase(&mult, RebaseOptions::strict()).unwrap(), None);

        let doc = Doc::present(1);
        let opts = RebaseOptions::conflictless(Some(&doc));
        let add2 = add.rebase(&mult, opts).unwrap().unwrap();
        let mult2 = mult.rebase(&add, opts).unwrap().unwrap();
        let left = add2.apply(&mult.apply(&json!(1)).unwrap()).unwrap();
        let right = mult2.apply(&add.apply(&json!(1)).unwrap()).unwrap();
        assert_eq!(left, right);
        assert_eq!(left, json!(9));
    }

    #[test]
    fn display() {
        assert_eq!(math("add", json!(3)).to_string(), "<MATH add:3>");
        assert_eq!(math("and", json!(0xf1)).to_string(), "<MATH and:0xf1>");
        assert_eq!(math("rot", json!([1, 4])).to_string(), "<MATH rot:1%4>");
    }
}
