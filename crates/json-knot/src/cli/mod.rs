//! Core logic behind the `json-knot` binary.
//!
//! Operations are passed as serialized envelopes (see [`crate::codec`]) and
//! documents as plain JSON text. Every function returns the text to print.

use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::operation::Operation;
use crate::types::{Doc, OpError, RebaseOptions};

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CliError {
    Json(serde_json::Error),
    Op(OpError),
    Usage(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Json(e)  => write!(f, "{e}"),
            CliError::Op(e)    => write!(f, "{e}"),
            CliError::Usage(e) => write!(f, "{e}"),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self { CliError::Json(e) }
}

impl From<OpError> for CliError {
    fn from(e: OpError) -> Self { CliError::Op(e) }
}

/// Send `tracing` events to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn pretty(value: &Value) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

// ── Commands ──────────────────────────────────────────────────────────────

/// Apply `op_json` to the document in `doc_json`.
pub fn apply(op_json: &str, doc_json: &str) -> Result<String, CliError> {
    let op = Operation::deserialize(op_json)?;
    let doc: Value = serde_json::from_str(doc_json)?;
    pretty(&op.apply(&doc)?)
}

/// `a` then `b` as one operation, simplified.
pub fn compose(a_json: &str, b_json: &str) -> Result<String, CliError> {
    let a = Operation::deserialize(a_json)?;
    let b = Operation::deserialize(b_json)?;
    pretty(&crate::codec::to_json(&a.compose(&b).simplify()))
}

/// Flags accepted by `rebase`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RebaseArgs {
    pub conflictless: bool,
    pub document: Option<String>,
}

impl RebaseArgs {
    /// Parse `--conflictless` and `--document <json>` from the remaining
    /// arguments.
    pub fn parse(args: &[String]) -> Result<Self, CliError> {
        let mut out = RebaseArgs::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--conflictless" => out.conflictless = true,
                "--document" => {
                    let doc = iter
                        .next()
                        .ok_or_else(|| CliError::Usage("--document needs a JSON value".into()))?;
                    out.document = Some(doc.clone());
                }
                other => return Err(CliError::Usage(format!("unknown flag {other}"))),
            }
        }
        Ok(out)
    }
}

/// Rebase `a` onto `b`. `Ok(None)` is a conflict.
pub fn rebase(a_json: &str, b_json: &str, args: &RebaseArgs) -> Result<Option<String>, CliError> {
    let a = Operation::deserialize(a_json)?;
    let b = Operation::deserialize(b_json)?;
    let document = match &args.document {
        Some(text) => Some(Doc::Present(serde_json::from_str(text)?)),
        None => None,
    };
    let opts = if args.conflictless {
        RebaseOptions::conflictless(document.as_ref())
    } else {
        RebaseOptions::strict()
    };
    match a.rebase(&b, opts)? {
        Some(op) => Ok(Some(pretty(&crate::codec::to_json(&op))?)),
        None => Ok(None),
    }
}

/// The operation undoing `op_json` on the document in `doc_json`.
pub fn inverse(op_json: &str, doc_json: &str) -> Result<String, CliError> {
    let op = Operation::deserialize(op_json)?;
    let doc: Value = serde_json::from_str(doc_json)?;
    pretty(&crate::codec::to_json(&op.inverse(&doc)?))
}
