//! APPLY: per-property operations on objects.
//!
//! `PUT` and `REM` are APPLYs whose sub-operation is a SET; see
//! [`Operation::put`] and [`Operation::rem`].

use indexmap::IndexMap;
use serde_json::Value;

use crate::operation::Operation;
use crate::types::{Doc, OpError, OpResult, RebaseOptions, Selector};

/// Operations keyed by object property. A sub-operation that yields
/// `Missing` removes its property.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Apply {
    ops: IndexMap<String, Operation>,
}

impl Apply {
    pub fn new(ops: IndexMap<String, Operation>) -> Self {
        Apply { ops }
    }

    pub fn ops(&self) -> &IndexMap<String, Operation> {
        &self.ops
    }

    pub(crate) fn apply(&self, doc: &Doc) -> OpResult<Doc> {
        let Some(Value::Object(map)) = doc.as_value() else {
            return Err(OpError::TypeMismatch(format!(
                "APPLY needs an object, got {}",
                doc.type_name()
            )));
        };
        let mut out = map.clone();
        for (key, op) in &self.ops {
            let current: Doc = out.get(key).cloned().into();
            match op.apply_doc(&current)? {
                Doc::Present(value) => {
                    out.insert(key.clone(), value);
                }
                Doc::Missing => {
                    out.remove(key);
                }
            }
        }
        Ok(Doc::Present(Value::Object(out)))
    }

    pub(crate) fn simplify(&self) -> Operation {
        let ops: IndexMap<String, Operation> = self
            .ops
            .iter()
            .map(|(k, op)| (k.clone(), op.simplify()))
            .filter(|(_, op)| !op.is_no_op())
            .collect();
        if ops.is_empty() {
            Operation::NoOp
        } else {
            Operation::Apply(Apply { ops })
        }
    }

    pub(crate) fn inverse(&self, doc: &Doc) -> OpResult<Operation> {
        let Some(Value::Object(map)) = doc.as_value() else {
            return Err(OpError::TypeMismatch(format!(
                "APPLY needs an object, got {}",
                doc.type_name()
            )));
        };
        let mut ops = IndexMap::with_capacity(self.ops.len());
        for (key, op) in &self.ops {
            let current: Doc = map.get(key).cloned().into();
            ops.insert(key.clone(), op.inverse_doc(&current)?);
        }
        Ok(Operation::Apply(Apply { ops }))
    }

    /// Merge two APPLYs key by key. Keys present in both compose; a key
    /// whose composition is a no-op is dropped.
    pub(crate) fn compose(&self, other: &Apply) -> Operation {
        let mut ops = self.ops.clone();
        for (key, op) in &other.ops {
            match ops.get(key) {
                Some(prev) => {
                    let composed = prev.compose(op);
                    if composed.is_no_op() {
                        ops.shift_remove(key);
                    } else {
                        ops.insert(key.clone(), composed);
                    }
                }
                None => {
                    ops.insert(key.clone(), op.clone());
                }
            }
        }
        Apply { ops }.simplify()
    }

    pub(crate) fn drilldown(&self, selector: &Selector) -> Operation {
        match selector {
            Selector::Key(key) => self.ops.get(key).cloned().unwrap_or_default(),
            Selector::Index(_) => Operation::NoOp,
        }
    }

    /// APPLY against APPLY. Keys touched on one side only pass through;
    /// shared keys rebase recursively, and any conflict there is a conflict
    /// of the whole pair.
    pub(crate) fn rebase(&self, other: &Apply, opts: RebaseOptions<'_>) -> OpResult<Option<(Operation, Operation)>> {
        let Some(left) = rebase_keys(&self.ops, &other.ops, opts)? else {
            return Ok(None);
        };
        let Some(right) = rebase_keys(&other.ops, &self.ops, opts)? else {
            return Ok(None);
        };
        Ok(Some((Apply { ops: left }.simplify(), Apply { ops: right }.simplify())))
    }
}

fn rebase_keys(
    ops: &IndexMap<String, Operation>,
    base: &IndexMap<String, Operation>,
    opts: RebaseOptions<'_>,
) -> OpResult<Option<IndexMap<String, Operation>>> {
    let mut out = IndexMap::with_capacity(ops.len());
    for (key, op) in ops {
        let rebased = match base.get(key) {
            None => op.clone(),
            Some(other) => {
                let child = property(opts.prior(), key);
                match op.rebase(other, opts.with_document(child.as_ref()))? {
                    Some(op) => op,
                    None => return Ok(None),
                }
            }
        };
        out.insert(key.clone(), rebased);
    }
    Ok(Some(out))
}

/// The prior document's property `key`, when there is a prior document.
fn property(doc: Option<&Doc>, key: &str) -> Option<Doc> {
    let doc = doc?;
    let value = match doc.as_value() {
        Some(Value::Object(map)) => map.get(key).cloned(),
        _ => None,
    };
    Some(value.into())
}
