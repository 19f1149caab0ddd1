use core_runs::{LinkId, RunError};
use thiserror::Error;

/// Errors surfaced by an editing session. A failed operation never leaves a
/// partially applied state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Run(#[from] RunError),
    /// `end_edit` without `begin_edit`, a second `begin_edit`, or an undo
    /// while an edit is open.
    #[error("malformed history pairing: {0}")]
    MalformedHistoryPairing(&'static str),
    #[error("cell is read-only")]
    ReadOnly,
    #[error("no link with id {0}")]
    UnknownLink(LinkId),
    #[error("no cell {0}")]
    UnknownCell(String),
}
