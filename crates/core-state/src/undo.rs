//! Snapshot-pair undo history.
//!
//! Each logical edit is bracketed by `begin_edit` (captures `old`) and
//! `end_edit` (captures `new`); `commit` pushes the pair. Snapshots are full
//! copies: the rope and run vectors clone cheaply enough at cell scale, and
//! restoring never replays patches.
//!
//! Pairing is strict. A second `begin_edit`, an `end_edit` or `commit` with
//! nothing open, or an undo/redo while an edit is open all fail with
//! `MalformedHistoryPairing` and leave the stacks untouched.

use crate::EditState;
use crate::error::EngineError;
use tracing::trace;

/// Default number of items retained on the undo stack.
pub const HISTORY_MAX_DEPTH: usize = 200;

pub type HistorySnapshot = EditState;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    pub old: HistorySnapshot,
    pub new: HistorySnapshot,
}

#[derive(Debug, Clone, Default)]
enum Pending {
    #[default]
    Idle,
    Collecting {
        old: HistorySnapshot,
    },
    Collected {
        old: HistorySnapshot,
        new: HistorySnapshot,
    },
}

#[derive(Debug)]
pub struct HistoryManager {
    undo_stack: Vec<HistoryItem>,
    redo_stack: Vec<HistoryItem>,
    pending: Pending,
    max_depth: usize,
    /// Commits skipped because the edit changed nothing.
    skipped: u64,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(HISTORY_MAX_DEPTH)
    }
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            pending: Pending::Idle,
            max_depth: max_depth.max(1),
            skipped: 0,
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
    pub fn is_collecting(&self) -> bool {
        !matches!(self.pending, Pending::Idle)
    }
    pub fn snapshots_skipped(&self) -> u64 {
        self.skipped
    }

    pub fn begin_edit(&mut self, old: HistorySnapshot) -> Result<(), EngineError> {
        if self.is_collecting() {
            return Err(EngineError::MalformedHistoryPairing(
                "begin_edit while an edit is already open",
            ));
        }
        self.pending = Pending::Collecting { old };
        trace!(target: "state.history", undo_depth = self.undo_stack.len(), "begin_edit");
        Ok(())
    }

    pub fn end_edit(&mut self, new: HistorySnapshot) -> Result<(), EngineError> {
        match std::mem::take(&mut self.pending) {
            Pending::Collecting { old } => {
                self.pending = Pending::Collected { old, new };
                trace!(target: "state.history", "end_edit");
                Ok(())
            }
            other => {
                self.pending = other;
                Err(EngineError::MalformedHistoryPairing(
                    "end_edit without a matching begin_edit",
                ))
            }
        }
    }

    /// Push the collected pair. `Ok(false)` when the edit was a no-op.
    pub fn commit(&mut self) -> Result<bool, EngineError> {
        let (old, new) = match std::mem::take(&mut self.pending) {
            Pending::Collected { old, new } => (old, new),
            other => {
                self.pending = other;
                return Err(EngineError::MalformedHistoryPairing(
                    "commit without a completed begin_edit/end_edit pair",
                ));
            }
        };
        if old == new {
            self.skipped += 1;
            trace!(target: "state.history", skipped = self.skipped, "commit_skip_unchanged");
            return Ok(false);
        }
        self.undo_stack.push(HistoryItem { old, new });
        if self.undo_stack.len() > self.max_depth {
            let _ = self.undo_stack.remove(0);
            trace!(target: "state.history", "undo_stack_trimmed");
        }
        self.redo_stack.clear();
        trace!(target: "state.history", undo_depth = self.undo_stack.len(), redo_depth = 0, "commit");
        Ok(true)
    }

    /// Drop an open or collected edit without recording it.
    pub fn abort(&mut self) {
        if self.is_collecting() {
            trace!(target: "state.history", "abort_edit");
        }
        self.pending = Pending::Idle;
    }

    /// Pop the newest item; returns the snapshot to restore.
    pub fn undo(&mut self) -> Result<Option<HistorySnapshot>, EngineError> {
        if self.is_collecting() {
            return Err(EngineError::MalformedHistoryPairing("undo while an edit is open"));
        }
        let Some(item) = self.undo_stack.pop() else {
            return Ok(None);
        };
        let restore = item.old.clone();
        self.redo_stack.push(item);
        trace!(target: "state.history", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "undo_pop");
        Ok(Some(restore))
    }

    pub fn redo(&mut self) -> Result<Option<HistorySnapshot>, EngineError> {
        if self.is_collecting() {
            return Err(EngineError::MalformedHistoryPairing("redo while an edit is open"));
        }
        let Some(item) = self.redo_stack.pop() else {
            return Ok(None);
        };
        let restore = item.new.clone();
        self.undo_stack.push(item);
        trace!(target: "state.history", undo_depth = self.undo_stack.len(), redo_depth = self.redo_stack.len(), "redo_pop");
        Ok(Some(restore))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::{Selection, TextBuffer};

    fn snap(text: &str) -> HistorySnapshot {
        EditState {
            selection: Selection::caret(text.chars().count()),
            text: TextBuffer::from_str(text),
            ..EditState::default()
        }
    }

    fn record(h: &mut HistoryManager, old: &str, new: &str) {
        h.begin_edit(snap(old)).unwrap();
        h.end_edit(snap(new)).unwrap();
        assert!(h.commit().unwrap());
    }

    #[test]
    fn undo_then_redo_restores_pairs() {
        let mut h = HistoryManager::default();
        record(&mut h, "", "a");
        record(&mut h, "a", "ab");
        assert_eq!(h.undo().unwrap(), Some(snap("a")));
        assert_eq!(h.undo().unwrap(), Some(snap("")));
        assert_eq!(h.undo().unwrap(), None);
        assert_eq!(h.redo().unwrap(), Some(snap("a")));
        assert_eq!(h.redo().unwrap(), Some(snap("ab")));
        assert_eq!(h.redo().unwrap(), None);
    }

    #[test]
    fn new_commit_clears_redo() {
        let mut h = HistoryManager::default();
        record(&mut h, "", "a");
        h.undo().unwrap();
        assert!(h.can_redo());
        record(&mut h, "", "b");
        assert!(!h.can_redo());
        assert_eq!(h.undo_depth(), 1);
    }

    #[test]
    fn double_begin_is_an_error() {
        let mut h = HistoryManager::default();
        h.begin_edit(snap("")).unwrap();
        let err = h.begin_edit(snap("")).unwrap_err();
        assert!(matches!(err, EngineError::MalformedHistoryPairing(_)));
        // the first pairing is still open and completes normally
        h.end_edit(snap("x")).unwrap();
        assert!(h.commit().unwrap());
    }

    #[test]
    fn end_or_commit_without_begin_is_an_error() {
        let mut h = HistoryManager::default();
        assert!(h.end_edit(snap("x")).is_err());
        assert!(h.commit().is_err());
        h.begin_edit(snap("")).unwrap();
        assert!(h.commit().is_err());
        assert!(h.is_collecting());
        assert_eq!(h.undo_depth(), 0);
    }

    #[test]
    fn undo_while_collecting_is_an_error() {
        let mut h = HistoryManager::default();
        record(&mut h, "", "a");
        h.begin_edit(snap("a")).unwrap();
        assert!(h.undo().is_err());
        h.abort();
        assert_eq!(h.undo().unwrap(), Some(snap("")));
    }

    #[test]
    fn unchanged_edit_is_skipped() {
        let mut h = HistoryManager::default();
        h.begin_edit(snap("a")).unwrap();
        h.end_edit(snap("a")).unwrap();
        assert!(!h.commit().unwrap());
        assert_eq!(h.snapshots_skipped(), 1);
        assert!(!h.can_undo());
    }

    #[test]
    fn depth_limit_drops_oldest() {
        let mut h = HistoryManager::new(2);
        record(&mut h, "", "a");
        record(&mut h, "a", "ab");
        record(&mut h, "ab", "abc");
        assert_eq!(h.undo_depth(), 2);
        h.undo().unwrap();
        assert_eq!(h.undo().unwrap(), Some(snap("a")));
        assert_eq!(h.undo().unwrap(), None);
    }
}
