//! Persisted cell state and the store a session reads from and commits to.

use crate::error::EngineError;
use core_runs::{CellStyle, PersistedLink, StyleRun};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cell's value as stored in the grid. Offsets are char offsets into
/// `text`, which is always the actual value (never label-substituted).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellState {
    pub text: String,
    #[serde(default, skip_serializing_if = "CellStyle::is_empty")]
    pub base_style: CellStyle,
    #[serde(default)]
    pub style_runs: Vec<StyleRun>,
    #[serde(default)]
    pub link_runs: Vec<PersistedLink>,
    #[serde(default)]
    pub is_readonly: bool,
}

impl CellState {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Source of truth at session start, sink at session end.
pub trait CellStore {
    fn initial_state(&self, cell: &CellId) -> Result<CellState, EngineError>;
    fn commit_state(&mut self, cell: &CellId, state: CellState) -> Result<(), EngineError>;
}

#[derive(Debug, Default)]
pub struct MemoryCellStore {
    cells: BTreeMap<CellId, CellState>,
}

impl MemoryCellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cell: CellId, state: CellState) {
        self.cells.insert(cell, state);
    }

    pub fn get(&self, cell: &CellId) -> Option<&CellState> {
        self.cells.get(cell)
    }
}

impl CellStore for MemoryCellStore {
    fn initial_state(&self, cell: &CellId) -> Result<CellState, EngineError> {
        self.cells
            .get(cell)
            .cloned()
            .ok_or_else(|| EngineError::UnknownCell(cell.to_string()))
    }

    // The read-only flag belongs to the grid, not to the edited value.
    fn commit_state(&mut self, cell: &CellId, mut state: CellState) -> Result<(), EngineError> {
        if let Some(prev) = self.cells.get(cell) {
            state.is_readonly = prev.is_readonly;
        }
        debug!(
            target: "state.session",
            cell = %cell,
            len = state.text.chars().count(),
            styles = state.style_runs.len(),
            links = state.link_runs.len(),
            "cell_committed"
        );
        self.cells.insert(cell.clone(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_cell_is_an_error() {
        let store = MemoryCellStore::new();
        assert_eq!(
            store.initial_state(&CellId::new("B7")),
            Err(EngineError::UnknownCell("B7".into()))
        );
    }

    #[test]
    fn commit_keeps_readonly_flag() {
        let mut store = MemoryCellStore::new();
        let id = CellId::new("A1");
        store.insert(
            id.clone(),
            CellState {
                is_readonly: true,
                ..CellState::plain("x")
            },
        );
        store.commit_state(&id, CellState::plain("y")).unwrap();
        let stored = store.get(&id).unwrap();
        assert_eq!(stored.text, "y");
        assert!(stored.is_readonly);
    }

    #[test]
    fn serde_shape_matches_grid_storage() {
        let state = CellState {
            text: "ab".into(),
            base_style: CellStyle::bold(),
            style_runs: vec![StyleRun::new(0..1, CellStyle::italic())],
            link_runs: vec![PersistedLink::new(1..2, "https://b.test", None)],
            is_readonly: false,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"text":"ab","baseStyle":{"isBold":true},"#,
                r#""styleRuns":[{"startOffset":0,"endOffset":1,"style":{"isItalic":true}}],"#,
                r#""linkRuns":[{"startOffset":1,"endOffset":2,"ref":"https://b.test"}],"#,
                r#""isReadonly":false}"#
            )
        );
        let back: CellState = serde_json::from_str(r#"{"text":"q"}"#).unwrap();
        assert_eq!(back, CellState::plain("q"));
    }
}
