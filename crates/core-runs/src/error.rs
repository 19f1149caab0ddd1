use std::ops::Range;
use thiserror::Error;

/// Failures of run-partition operations. Every operation checks its inputs
/// before mutating, so receiving one of these means nothing changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// The operation would leave overlapping, unsorted or out-of-bounds runs.
    #[error("invariant violation: {reason} at {start}..{end}")]
    InvariantViolation {
        reason: &'static str,
        start: usize,
        end: usize,
    },
    /// A requested range lies outside `[0, len]`.
    #[error("range {start}..{end} lies outside 0..{len}")]
    OffsetOutOfRange { start: usize, end: usize, len: usize },
}

impl RunError {
    pub(crate) fn violation(reason: &'static str, span: &Range<usize>) -> Self {
        Self::InvariantViolation {
            reason,
            start: span.start,
            end: span.end,
        }
    }
}

/// Reject ranges that are reversed or extend past `len`.
pub fn check_range(range: &Range<usize>, len: usize) -> Result<(), RunError> {
    if range.start > range.end || range.end > len {
        return Err(RunError::OffsetOutOfRange {
            start: range.start,
            end: range.end,
            len,
        });
    }
    Ok(())
}
