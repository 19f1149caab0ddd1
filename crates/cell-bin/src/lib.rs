//! Script replay for `cellrun`.
//!
//! A script is a JSON document holding the initial persisted cell and a list
//! of operations. Every operation except `select`, `undo` and `redo` runs as
//! one recorded history item. A rejected operation is reported and replay
//! continues; the session state is unaffected by it.

use anyhow::{Context, Result};
use core_runs::{CellStyle, LinkId, Segment};
use core_state::{BufferedSurface, CellState, EditSession, EngineError, PlainTextSanitizer, SessionOptions};
use core_text::Selection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub cell: CellState,
    #[serde(default)]
    pub ops: Vec<ScriptOp>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ScriptOp {
    Edit {
        start: usize,
        end: usize,
        #[serde(default)]
        text: String,
    },
    Paste {
        start: usize,
        end: usize,
        text: String,
    },
    Style {
        start: usize,
        end: usize,
        style: CellStyle,
    },
    ClearStyle {
        start: usize,
        end: usize,
    },
    AddLink {
        start: usize,
        end: usize,
        #[serde(rename = "ref")]
        reference: String,
        #[serde(default)]
        label: Option<String>,
    },
    RemoveLink {
        id: LinkId,
        #[serde(default, rename = "keepStyle")]
        keep_style: bool,
    },
    UpdateLink {
        id: LinkId,
        #[serde(rename = "ref")]
        reference: String,
        #[serde(default)]
        label: Option<String>,
    },
    Select {
        start: usize,
        end: usize,
    },
    Boundary {
        caret: usize,
        #[serde(rename = "char")]
        ch: char,
    },
    Backspace {
        caret: usize,
    },
    Undo,
    Redo,
}

impl ScriptOp {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptOp::Edit { .. } => "edit",
            ScriptOp::Paste { .. } => "paste",
            ScriptOp::Style { .. } => "style",
            ScriptOp::ClearStyle { .. } => "clearStyle",
            ScriptOp::AddLink { .. } => "addLink",
            ScriptOp::RemoveLink { .. } => "removeLink",
            ScriptOp::UpdateLink { .. } => "updateLink",
            ScriptOp::Select { .. } => "select",
            ScriptOp::Boundary { .. } => "boundary",
            ScriptOp::Backspace { .. } => "backspace",
            ScriptOp::Undo => "undo",
            ScriptOp::Redo => "redo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejected {
    pub index: usize,
    pub op: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Text as rendered (display text for read-only cells).
    pub text: String,
    pub segments: Vec<Segment>,
    pub state: CellState,
    pub undo_depth: usize,
    pub redo_depth: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<Rejected>,
}

pub fn parse_script(raw: &str) -> Result<Script> {
    serde_json::from_str(raw).context("parsing script")
}

pub fn replay(script: Script, options: SessionOptions) -> Result<Report> {
    let mut session = EditSession::begin(script.cell, options).context("opening cell")?;
    let mut rejected = Vec::new();
    for (index, op) in script.ops.iter().enumerate() {
        if let Err(e) = apply(&mut session, op) {
            warn!(target: "replay", index, op = op.name(), error = %e, "op_rejected");
            rejected.push(Rejected {
                index,
                op: op.name(),
                error: e.to_string(),
            });
        }
    }
    let mut surface = BufferedSurface::default();
    session.render_to(&mut surface);
    let undo_depth = session.history().undo_depth();
    let redo_depth = session.history().redo_depth();
    let state = session.end_session().context("ending session")?;
    info!(
        target: "replay",
        ops = script.ops.len(),
        rejected = rejected.len(),
        segments = surface.segments.len(),
        "replay_complete"
    );
    Ok(Report {
        text: surface.text,
        segments: surface.segments,
        state,
        undo_depth,
        redo_depth,
        rejected,
    })
}

fn apply(session: &mut EditSession, op: &ScriptOp) -> Result<(), EngineError> {
    match op {
        ScriptOp::Undo => session.undo().map(|_| ()),
        ScriptOp::Redo => session.redo().map(|_| ()),
        ScriptOp::Select { start, end } => session.set_selection(Selection::new(*start, *end)),
        recorded => session.record(|s| apply_recorded(s, recorded)),
    }
}

fn apply_recorded(s: &mut EditSession, op: &ScriptOp) -> Result<(), EngineError> {
    match op {
        ScriptOp::Edit { start, end, text } => s.apply_edit(*start..*end, text),
        ScriptOp::Paste { start, end, text } => s.paste(*start..*end, text, &PlainTextSanitizer),
        ScriptOp::Style { start, end, style } => s.apply_style(*start..*end, style).map(|_| ()),
        ScriptOp::ClearStyle { start, end } => s.clear_style(*start..*end),
        ScriptOp::AddLink {
            start,
            end,
            reference,
            label,
        } => s.add_link(*start..*end, reference, label.clone()).map(|_| ()),
        ScriptOp::RemoveLink { id, keep_style } => s.remove_link(*id, *keep_style),
        ScriptOp::UpdateLink { id, reference, label } => {
            s.update_link(*id, reference, label.clone()).map(|_| ())
        }
        ScriptOp::Boundary { caret, ch } => s.insert_boundary(*caret, *ch).map(|_| ()),
        ScriptOp::Backspace { caret } => s.backspace(*caret).map(|_| ()),
        ScriptOp::Select { .. } | ScriptOp::Undo | ScriptOp::Redo => Ok(()),
    }
}
