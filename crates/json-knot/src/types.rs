//! Core types shared by every operation: the error enum, the document
//! model with an explicit "absent" state, drilldown selectors, and rebase
//! options.

use serde_json::Value;
use thiserror::Error;

use json_knot_pointer::JsonPointerError;

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OpError {
    /// The operation could not be constructed from the given arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The document does not have the shape the operation requires.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// A hunk or path reaches outside the document.
    #[error("out of range: {0}")]
    OutOfRange(String),
    /// Conflictless rebase ran out of resolution rules.
    #[error("rebase failed between {0} and {1}")]
    RebaseFailed(String, String),
    /// A serialized operation could not be decoded.
    #[error("format error: {0}")]
    Format(String),
    #[error("pointer: {0}")]
    Pointer(#[from] JsonPointerError),
}

pub type OpResult<T> = Result<T, OpError>;

// ── Document ──────────────────────────────────────────────────────────────

/// A document slot: either a JSON value or the absence of one.
///
/// `Missing` is what an object property holds before it is created and
/// after it is removed. It sorts below every present value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Doc {
    #[default]
    Missing,
    Present(Value),
}

impl Doc {
    pub fn present(value: impl Into<Value>) -> Self {
        Doc::Present(value.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Doc::Missing)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Doc::Present(v) => Some(v),
            Doc::Missing => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Doc::Present(v) => Some(v),
            Doc::Missing => None,
        }
    }

    /// The document's type name, as used in error messages and ordering.
    pub fn type_name(&self) -> &'static str {
        match self {
            Doc::Missing => "missing",
            Doc::Present(v) => type_name(v),
        }
    }
}

impl From<Value> for Doc {
    fn from(value: Value) -> Self {
        Doc::Present(value)
    }
}

impl From<Option<Value>> for Doc {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Doc::Missing, Doc::Present)
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Selector ──────────────────────────────────────────────────────────────

/// One step into a document: an object key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Key(String),
    Index(usize),
}

impl From<&str> for Selector {
    fn from(key: &str) -> Self {
        Selector::Key(key.to_string())
    }
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Selector::Index(index)
    }
}

// ── Rebase options ────────────────────────────────────────────────────────

/// How a rebase should treat situations it cannot merge on its own.
///
/// In strict mode an unresolved case yields "no result". In conflictless
/// mode deterministic tie-breaking is used instead, and the optional
/// `document` (the state both operations were produced against) enables
/// rules that need to look at the data.
#[derive(Debug, Clone, Copy, Default)]
pub struct RebaseOptions<'a> {
    pub conflictless: bool,
    pub document: Option<&'a Doc>,
}

impl<'a> RebaseOptions<'a> {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn conflictless(document: Option<&'a Doc>) -> Self {
        Self {
            conflictless: true,
            document,
        }
    }

    /// The prior document, but only when running conflictless.
    pub fn prior(&self) -> Option<&'a Doc> {
        if self.conflictless {
            self.document
        } else {
            None
        }
    }

    /// The same options, narrowed to a sub-document.
    pub fn with_document<'b>(&self, document: Option<&'b Doc>) -> RebaseOptions<'b> {
        RebaseOptions {
            conflictless: self.conflictless,
            document,
        }
    }
}
