//! Editing session state for a single spreadsheet cell.
//!
//! - `EditState` is the whole mutable model of a session: selection, text,
//!   the cell's base style and both run partitions (the link partition also
//!   owns the read-only `ActualLengthMap`). It doubles as the history
//!   snapshot type, so restoring a snapshot is a plain assignment.
//! - `session::EditSession` is the engine API: every mutation is computed on
//!   a cloned `EditState` and swapped in only once the result validates.
//! - `undo::HistoryManager` stores `(old, new)` snapshot pairs bracketed by
//!   an explicit `begin_edit`/`end_edit` pairing.
//! - `store` and `surface` are the collaborator seams (cell storage, render
//!   surface, clipboard sanitizer).
//!
//! Telemetry: session lifecycle at debug on `state.session`, per-operation
//! detail at trace, rejected operations at warn. History stack movement is
//! traced on `state.history`. Cell text never appears in events.

use core_runs::{CellStyle, LinkRuns, RunError, StyleRuns, check_range};
use core_text::{Selection, TextBuffer};

pub mod error;
pub mod session;
pub mod store;
pub mod surface;
pub mod undo;

pub use error::EngineError;
pub use session::{BackspaceOutcome, EditSession, SessionOptions};
pub use store::{CellId, CellState, CellStore, MemoryCellStore};
pub use surface::{BufferedSurface, ClipboardSanitizer, PlainTextSanitizer, RenderSurface};
pub use undo::{HISTORY_MAX_DEPTH, HistoryItem, HistoryManager, HistorySnapshot};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditState {
    pub selection: Selection,
    pub text: TextBuffer,
    pub base_style: CellStyle,
    pub style_runs: StyleRuns,
    pub link_runs: LinkRuns,
}

impl EditState {
    /// Selection and both partitions lie within the text and are well formed.
    pub fn validate(&self) -> Result<(), RunError> {
        let len = self.text.len();
        check_range(&self.selection.range(), len)?;
        self.style_runs.validate(len)?;
        self.link_runs.validate(len)
    }
}
