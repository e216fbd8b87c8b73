//! Rebase dispatch.
//!
//! `a.rebase(b)` produces `a'` such that `b ∘ a'` and `a ∘ b'` converge.
//! Resolution tries, in order:
//!
//! 1. the pairwise table for `(a, b)`, keeping the left result;
//! 2. the pairwise table for `(b, a)`, keeping the right result;
//! 3. LIST handling, when either side is a LIST;
//! 4. conflictless fallbacks: clone through a COPY, then "SET wins";
//! 5. otherwise a conflict (`None`) in strict mode, or an error.

use tracing::{debug, trace};

use super::Operation;
use crate::lists;
use crate::sequences;
use crate::types::{OpError, OpResult, RebaseOptions};
use crate::values;

impl Operation {
    /// Transform `self` so it applies after `other`. Both must have been
    /// produced against the same document.
    ///
    /// Returns `Ok(None)` on a conflict in strict mode. In conflictless mode
    /// a result is always produced, or an error if no rule applies.
    pub fn rebase(&self, other: &Operation, opts: RebaseOptions<'_>) -> OpResult<Option<Operation>> {
        if let Some((rebased, _)) = rebase_pair(self, other, opts)? {
            trace!(a = %self, b = %other, result = %rebased, "rebased");
            return Ok(Some(rebased));
        }
        if let Some((_, rebased)) = rebase_pair(other, self, opts)? {
            trace!(a = %self, b = %other, result = %rebased, "rebased (mirrored)");
            return Ok(Some(rebased));
        }
        if matches!(self, Operation::List(_)) || matches!(other, Operation::List(_)) {
            return lists::rebase(self, other, opts);
        }

        if opts.conflictless {
            if let (Operation::Copy(copy), Some(doc)) = (other, opts.document) {
                return copy.clone_operation(self, doc).map(Some);
            }
            if matches!(self, Operation::Set(_)) {
                return Ok(Some(self.clone()));
            }
            if matches!(other, Operation::Set(_)) {
                return Ok(Some(Operation::NoOp));
            }
            return Err(OpError::RebaseFailed(self.to_string(), other.to_string()));
        }

        debug!(a = %self, b = %other, "rebase conflict");
        Ok(None)
    }
}

/// The pairwise rebase table. Returns `(a', b')` when the pair has a rule
/// and it resolves.
pub(crate) fn rebase_pair(
    a: &Operation,
    b: &Operation,
    opts: RebaseOptions<'_>,
) -> OpResult<Option<(Operation, Operation)>> {
    use Operation::*;
    match (a, b) {
        (NoOp, _) => Ok(Some((a.clone(), b.clone()))),
        (Set(x), Set(y)) => Ok(values::rebase_sets(x, y, opts)),
        (Set(_), Math(_)) => Ok(Some((a.clone(), NoOp))),
        (Math(x), Math(y)) => x.rebase(y, opts),
        (Apply(x), Apply(y)) => x.rebase(y, opts),
        (Patch(x), Patch(y)) => sequences::rebase_patches(x, y, opts),
        (Map(x), Map(y)) => sequences::rebase_maps(x, y, opts),
        (Map(x), Patch(y)) => sequences::rebase_map_patch(x, y, opts),
        _ => Ok(None),
    }
}
