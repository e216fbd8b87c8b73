//! json-knot: an operation algebra for JSON documents.
//!
//! Every change to a document is an [`Operation`]. Operations can be
//! applied, composed into one, inverted, serialized, and rebased against
//! concurrent operations (operational transformation), with optional
//! conflict-free resolution.
//!
//! ```
//! use json_knot::{Operation, RebaseOptions};
//! use serde_json::json;
//!
//! let a = Operation::splice(0, 1, "H").unwrap();
//! let b = Operation::insert(5, "!").unwrap();
//! let b2 = b.rebase(&a, RebaseOptions::strict()).unwrap().unwrap();
//! let doc = a.apply(&json!("hello")).unwrap();
//! assert_eq!(b2.apply(&doc).unwrap(), json!("Hello!"));
//! ```
//!
//! Modules follow the operation families:
//! - [`values`]: NO_OP, SET, MATH
//! - [`objects`]: APPLY (and PUT/REM)
//! - [`sequences`]: PATCH, MAP (and SPLICE/ATINDEX)
//! - [`lists`]: LIST
//! - [`copies`]: COPY

pub mod cmp;
pub mod types;

pub mod operation;

pub mod values;
pub mod objects;
pub mod sequences;
pub mod lists;
pub mod copies;

pub mod codec;
pub mod cli;

pub use codec::{from_json, to_json};
pub use copies::Copy;
pub use objects::Apply;
pub use operation::Operation;
pub use sequences::{Hunk, Patch};
pub use types::{Doc, OpError, OpResult, RebaseOptions, Selector};
pub use values::{Bits, Math};
