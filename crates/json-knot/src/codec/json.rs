//! JSON codec for operations.
//!
//! Every operation encodes as an object tagged with `_type:
//! "<module>.<NAME>"`. The outermost object also carries `_ver`, the
//! protocol version; nested operations inherit it and must not repeat it.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::operation::Operation;
use crate::sequences::Hunk;
use crate::types::{Doc, OpError, OpResult};

/// The only protocol version this codec reads or writes.
pub const PROTOCOL_VERSION: u64 = 1;

// ── Serialization ─────────────────────────────────────────────────────────

/// Encode an operation as a top-level envelope.
pub fn to_json(op: &Operation) -> Value {
    let mut out = Map::new();
    out.insert("_ver".into(), json!(PROTOCOL_VERSION));
    encode_into(op, &mut out);
    Value::Object(out)
}

fn encode_nested(op: &Operation) -> Value {
    let mut out = Map::new();
    encode_into(op, &mut out);
    Value::Object(out)
}

fn encode_into(op: &Operation, out: &mut Map<String, Value>) {
    let (module, name) = op.type_tag();
    out.insert("_type".into(), Value::String(format!("{module}.{name}")));
    match op {
        Operation::NoOp => {}
        Operation::Set(Doc::Missing) => {
            out.insert("value_missing".into(), Value::Bool(true));
        }
        Operation::Set(Doc::Present(value)) => {
            out.insert("value".into(), value.clone());
        }
        Operation::Math(math) => {
            out.insert("operator".into(), json!(math.operator()));
            out.insert("operand".into(), math.operand());
        }
        Operation::Apply(apply) => {
            let ops: Map<String, Value> = apply
                .ops()
                .iter()
                .map(|(key, op)| (key.clone(), encode_nested(op)))
                .collect();
            out.insert("ops".into(), Value::Object(ops));
        }
        Operation::Patch(patch) => {
            let hunks: Vec<Value> = patch
                .hunks()
                .iter()
                .map(|h| json!({"offset": h.offset, "length": h.length, "op": encode_nested(&h.op)}))
                .collect();
            out.insert("hunks".into(), Value::Array(hunks));
        }
        Operation::Map(inner) => {
            out.insert("op".into(), encode_nested(inner));
        }
        Operation::List(ops) => {
            out.insert("ops".into(), Value::Array(ops.iter().map(encode_nested).collect()));
        }
        Operation::Copy(copy) => {
            let pairs: Vec<Value> = copy
                .pairs()
                .iter()
                .map(|pair| {
                    json!([
                        json_knot_pointer::format_json_pointer(&pair.from),
                        json_knot_pointer::format_json_pointer(&pair.to)
                    ])
                })
                .collect();
            out.insert("pathpairs".into(), Value::Array(pairs));
        }
    }
}

// ── Deserialization ───────────────────────────────────────────────────────

type Decoder = fn(&Map<String, Value>) -> OpResult<Operation>;

static REGISTRY: &[(&str, &str, Decoder)] = &[
    ("values", "NO_OP", decode_no_op),
    ("values", "SET", decode_set),
    ("values", "MATH", decode_math),
    ("objects", "APPLY", decode_apply),
    ("sequences", "PATCH", decode_patch),
    ("sequences", "MAP", decode_map),
    ("lists", "LIST", decode_list),
    ("copies", "COPY", decode_copy),
];

/// Decode a top-level envelope. `_ver` must be present and supported.
pub fn from_json(value: &Value) -> OpResult<Operation> {
    let obj = as_object(value)?;
    match obj.get("_ver") {
        Some(ver) if ver.as_u64() == Some(PROTOCOL_VERSION) => decode(obj),
        Some(ver) => Err(OpError::Format(format!("unsupported protocol version {ver}"))),
        None => Err(OpError::Format("missing protocol version".into())),
    }
}

fn from_json_nested(value: &Value) -> OpResult<Operation> {
    let obj = as_object(value)?;
    if obj.contains_key("_ver") {
        return Err(OpError::Format("nested operation carries its own _ver".into()));
    }
    decode(obj)
}

fn decode(obj: &Map<String, Value>) -> OpResult<Operation> {
    let tag = obj
        .get("_type")
        .and_then(Value::as_str)
        .ok_or_else(|| OpError::Format("not an operation: _type must be a string".into()))?;
    let (module, name) = tag
        .split_once('.')
        .ok_or_else(|| OpError::Format(format!("malformed _type {tag:?}")))?;
    let decoder = REGISTRY
        .iter()
        .find(|(m, n, _)| *m == module && *n == name)
        .map(|(_, _, decoder)| decoder)
        .ok_or_else(|| OpError::Format(format!("unknown operation type {tag:?}")))?;
    decoder(obj)
}

// ── Field helpers ─────────────────────────────────────────────────────────

fn as_object(value: &Value) -> OpResult<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| OpError::Format("operation must be an object".into()))
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> OpResult<&'a Value> {
    obj.get(name).ok_or_else(|| OpError::Format(format!("missing field {name:?}")))
}

fn usize_field(obj: &Map<String, Value>, name: &str) -> OpResult<usize> {
    field(obj, name)?
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| OpError::Format(format!("{name} must be a non-negative integer")))
}

fn array_field<'a>(obj: &'a Map<String, Value>, name: &str) -> OpResult<&'a Vec<Value>> {
    field(obj, name)?
        .as_array()
        .ok_or_else(|| OpError::Format(format!("{name} must be an array")))
}

// ── Decoders ──────────────────────────────────────────────────────────────

fn decode_no_op(_: &Map<String, Value>) -> OpResult<Operation> {
    Ok(Operation::NoOp)
}

fn decode_set(obj: &Map<String, Value>) -> OpResult<Operation> {
    if obj.get("value_missing").and_then(Value::as_bool) == Some(true) {
        return Ok(Operation::set_missing());
    }
    Ok(Operation::set(field(obj, "value")?.clone()))
}

fn decode_math(obj: &Map<String, Value>) -> OpResult<Operation> {
    let operator = field(obj, "operator")?
        .as_str()
        .ok_or_else(|| OpError::Format("operator must be a string".into()))?;
    let operand = obj.get("operand").cloned().unwrap_or(Value::Null);
    Operation::math(operator, operand)
}

fn decode_apply(obj: &Map<String, Value>) -> OpResult<Operation> {
    let ops = field(obj, "ops")?
        .as_object()
        .ok_or_else(|| OpError::Format("ops must be an object".into()))?
        .iter()
        .map(|(key, op)| -> OpResult<(String, Operation)> { Ok((key.clone(), from_json_nested(op)?)) })
        .collect::<OpResult<IndexMap<_, _>>>()?;
    Ok(Operation::apply_ops(ops))
}

fn decode_patch(obj: &Map<String, Value>) -> OpResult<Operation> {
    let hunks = array_field(obj, "hunks")?
        .iter()
        .map(|hunk| -> OpResult<Hunk> {
            let hunk = hunk
                .as_object()
                .ok_or_else(|| OpError::Format("hunk must be an object".into()))?;
            Ok(Hunk::new(
                usize_field(hunk, "offset")?,
                usize_field(hunk, "length")?,
                from_json_nested(field(hunk, "op")?)?,
            ))
        })
        .collect::<OpResult<Vec<_>>>()?;
    Operation::patch(hunks)
}

fn decode_map(obj: &Map<String, Value>) -> OpResult<Operation> {
    Ok(Operation::map(from_json_nested(field(obj, "op")?)?))
}

fn decode_list(obj: &Map<String, Value>) -> OpResult<Operation> {
    let ops = array_field(obj, "ops")?
        .iter()
        .map(from_json_nested)
        .collect::<OpResult<Vec<_>>>()?;
    Ok(Operation::list(ops))
}

fn decode_copy(obj: &Map<String, Value>) -> OpResult<Operation> {
    let pairs = array_field(obj, "pathpairs")?
        .iter()
        .map(|pair| match pair.as_array().map(Vec::as_slice) {
            Some([Value::String(from), Value::String(to)]) => Ok((from.as_str(), to.as_str())),
            _ => Err(OpError::Format("pathpairs entries must be [from, to] strings".into())),
        })
        .collect::<OpResult<Vec<_>>>()?;
    Operation::copy(pairs)
}
