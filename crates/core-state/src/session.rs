//! The editing session: engine API over one cell.
//!
//! Contract:
//! * Every mutating operation runs against a clone of the current
//!   `EditState`; the clone replaces the live state only after it validates.
//!   A rejected operation leaves state, history and id allocation untouched.
//! * Operations take the caret/selection as an explicit argument. The
//!   session never asks a surface where the caret is.
//! * Read-only sessions operate on display text (labels substituted for the
//!   link targets they stand for). Text, style and link creation are
//!   rejected; `remove_link` restores the actual substring. `end_session`
//!   translates everything back to actual-value coordinates.
//! * The auto-link affordance is one-shot: any operation other than the
//!   `backspace` that consumes it clears it.

use crate::EditState;
use crate::error::EngineError;
use crate::store::{CellId, CellState, CellStore};
use crate::surface::{ClipboardSanitizer, RenderSurface};
use crate::undo::HistoryManager;
use core_config::Config;
use core_runs::{
    CellStyle, LinkId, LinkIds, LinkRun, LinkRuns, OffsetTranslator, RunError, Segment, StyleRun,
    StyleRuns, TaggedFragment, check_range, project, substitute_labels,
};
use core_text::{Selection, TextBuffer, linkify};
use std::ops::Range;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub history_depth: usize,
    pub implicit_links: bool,
    pub require_scheme: bool,
}

impl From<&Config> for SessionOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            history_depth: cfg.history_depth(),
            implicit_links: cfg.implicit_links(),
            require_scheme: cfg.require_scheme(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackspaceOutcome {
    /// The link auto-created by the preceding boundary was removed; text kept.
    LinkRemoved(LinkId),
    Deleted(Range<usize>),
    AtStart,
}

#[derive(Debug, Clone, Copy)]
struct AutoLink {
    id: LinkId,
    /// Caret position right after the boundary that created the link.
    caret: usize,
}

/// What a read-only session needs to restore actual text and persist.
#[derive(Debug, Clone)]
struct ReadOnlyOrigin {
    value: TextBuffer,
}

#[derive(Debug)]
pub struct EditSession {
    state: EditState,
    history: HistoryManager,
    ids: LinkIds,
    origin: Option<ReadOnlyOrigin>,
    auto_link: Option<AutoLink>,
    options: SessionOptions,
}

impl EditSession {
    /// Seed a session from persisted cell state. Persisted runs are validated
    /// against the value; a malformed cell is rejected.
    pub fn begin(initial: CellState, options: SessionOptions) -> Result<Self, EngineError> {
        let mut ids = LinkIds::new();
        let value = TextBuffer::from_str(&initial.text);
        let style_runs = StyleRuns::from_runs(initial.style_runs, value.len())?;
        let (state, origin) = if initial.is_readonly {
            let view = substitute_labels(&value, initial.link_runs, &mut ids)?;
            let t = OffsetTranslator::new(&view.links);
            let display_runs = style_runs
                .into_runs()
                .into_iter()
                .map(|r| StyleRun::new(t.to_display(r.start)..t.to_display(r.end), r.style))
                .filter(|r| r.start < r.end)
                .collect();
            let style_runs = StyleRuns::from_runs(display_runs, view.text.len())?;
            let state = EditState {
                selection: Selection::caret(view.text.len()),
                text: view.text,
                base_style: initial.base_style,
                style_runs,
                link_runs: view.links,
            };
            (state, Some(ReadOnlyOrigin { value }))
        } else {
            let link_runs = LinkRuns::from_persisted(initial.link_runs, value.len(), &mut ids)?;
            let state = EditState {
                selection: Selection::caret(value.len()),
                text: value,
                base_style: initial.base_style,
                style_runs,
                link_runs,
            };
            (state, None)
        };
        debug!(
            target: "state.session",
            len = state.text.len(),
            styles = state.style_runs.len(),
            links = state.link_runs.len(),
            readonly = origin.is_some(),
            "session_begin"
        );
        Ok(Self {
            state,
            history: HistoryManager::new(options.history_depth),
            ids,
            origin,
            auto_link: None,
            options,
        })
    }

    pub fn open(store: &impl CellStore, cell: &CellId, options: SessionOptions) -> Result<Self, EngineError> {
        Self::begin(store.initial_state(cell)?, options)
    }

    /// End the session and commit its final state to `store`.
    pub fn close(self, store: &mut impl CellStore, cell: &CellId) -> Result<CellState, EngineError> {
        let state = self.end_session()?;
        store.commit_state(cell, state.clone())?;
        Ok(state)
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn text(&self) -> &TextBuffer {
        &self.state.text
    }

    pub fn selection(&self) -> Selection {
        self.state.selection
    }

    pub fn base_style(&self) -> &CellStyle {
        &self.state.base_style
    }

    pub fn style_runs(&self) -> &StyleRuns {
        &self.state.style_runs
    }

    pub fn link_runs(&self) -> &LinkRuns {
        &self.state.link_runs
    }

    pub fn link(&self, id: LinkId) -> Option<&LinkRun> {
        self.state.link_runs.get(id)
    }

    pub fn link_at(&self, offset: usize) -> Option<&LinkRun> {
        self.state.link_runs.link_at(offset)
    }

    pub fn is_readonly(&self) -> bool {
        self.origin.is_some()
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), EngineError> {
        self.auto_link = None;
        self.transact("set_selection", |state, _| {
            state.selection = selection;
            Ok(())
        })
    }

    /// Replace `range` with `text`. Inserted chars take the style of the char
    /// before the edit (or after it, at offset 0).
    pub fn apply_edit(&mut self, range: Range<usize>, text: &str) -> Result<(), EngineError> {
        self.ensure_editable("apply_edit")?;
        self.auto_link = None;
        self.transact("apply_edit", |state, _| edit_text(state, range, text).map(|_| ()))
    }

    /// Overlay `patch` on `range`, then hoist uniform attributes into the base
    /// style. Returns the folded attribute names.
    pub fn apply_style(&mut self, range: Range<usize>, patch: &CellStyle) -> Result<Vec<&'static str>, EngineError> {
        self.ensure_editable("apply_style")?;
        self.auto_link = None;
        self.transact("apply_style", |state, _| {
            let len = state.text.len();
            state.style_runs.apply_style(&range, patch, len)?;
            Ok(state.style_runs.fold_uniform(&mut state.base_style, len))
        })
    }

    pub fn clear_style(&mut self, range: Range<usize>) -> Result<(), EngineError> {
        self.ensure_editable("clear_style")?;
        self.auto_link = None;
        self.transact("clear_style", |state, _| {
            let len = state.text.len();
            state.style_runs.clear(&range, len)?;
            Ok(())
        })
    }

    /// Replace `range` with a sanitized paste payload, keeping the payload's
    /// own styling for the inserted region.
    pub fn paste(
        &mut self,
        range: Range<usize>,
        payload: &str,
        sanitizer: &dyn ClipboardSanitizer,
    ) -> Result<(), EngineError> {
        self.ensure_editable("paste")?;
        self.auto_link = None;
        let fragments = sanitizer.sanitize(payload);
        self.transact("paste", |state, _| {
            check_range(&range, state.text.len())?;
            let inserted: String = fragments.iter().map(|f| f.text.as_str()).collect();
            let n = inserted.chars().count();
            state.text.replace(range.clone(), &inserted);
            state.style_runs.set_text(&range, n);
            state.link_runs.set_text(&range, n);
            let len = state.text.len();
            let styled = StyleRuns::extract_from_segments(&fragments);
            state.style_runs.splice(&(range.start..range.start + n), &styled, len)?;
            state.style_runs.fold_uniform(&mut state.base_style, len);
            state.selection = Selection::caret(range.start + n);
            trace!(target: "state.session", start = range.start, end = range.end, inserted = n, "paste");
            Ok(())
        })
    }

    /// Create a link over `range`. A label differing from the covered text
    /// replaces it; an empty range without a label inserts `reference`.
    pub fn add_link(
        &mut self,
        range: Range<usize>,
        reference: &str,
        label: Option<String>,
    ) -> Result<LinkId, EngineError> {
        self.ensure_editable("add_link")?;
        self.auto_link = None;
        let id = self.transact("add_link", |state, ids| insert_link(state, ids, range, reference, label))?;
        debug!(target: "state.session", id = %id, "link_added");
        Ok(id)
    }

    /// Delete link `id`. Editable cells keep the covered text; with
    /// `keep_style` false its per-run style is cleared too. Read-only cells
    /// get the actual underlying text back in place of the label and lose
    /// the region's style.
    pub fn remove_link(&mut self, id: LinkId, keep_style: bool) -> Result<(), EngineError> {
        self.auto_link = None;
        let origin = self.origin.clone();
        self.transact("remove_link", |state, _| {
            let Some(run) = state.link_runs.get(id) else {
                return Err(EngineError::UnknownLink(id));
            };
            let span = run.start..run.end;
            match &origin {
                Some(origin) => {
                    let actual = OffsetTranslator::new(&state.link_runs)
                        .actual_span(id)
                        .ok_or(EngineError::UnknownLink(id))?;
                    let restored = origin.value.slice(actual);
                    state.link_runs.remove(id);
                    let n = edit_text(state, span.clone(), &restored)?;
                    let len = state.text.len();
                    state.style_runs.clear(&(span.start..span.start + n), len)?;
                    trace!(
                        target: "state.session",
                        id = %id,
                        display_len = span.len(),
                        actual_len = n,
                        "readonly_link_restored"
                    );
                }
                None => {
                    state.link_runs.remove(id);
                    if !keep_style {
                        let len = state.text.len();
                        state.style_runs.clear(&span, len)?;
                    }
                }
            }
            Ok(())
        })?;
        debug!(target: "state.session", id = %id, keep_style, "link_removed");
        Ok(())
    }

    /// Replace link `id` with a new one over the same text. The old id is
    /// retired and the returned id is fresh.
    pub fn update_link(&mut self, id: LinkId, reference: &str, label: Option<String>) -> Result<LinkId, EngineError> {
        self.ensure_editable("update_link")?;
        self.auto_link = None;
        let new_id = self.transact("update_link", |state, ids| {
            let (run, _) = state.link_runs.remove(id).ok_or(EngineError::UnknownLink(id))?;
            insert_link(state, ids, run.start..run.end, reference, label)
        })?;
        debug!(target: "state.session", old = %id, new = %new_id, "link_updated");
        Ok(new_id)
    }

    /// Promote the URL-like word ending at `caret` into a link. `Ok(None)`
    /// when detection is disabled, the cell is read-only, or nothing matched.
    pub fn detect_implicit_link(&mut self, caret: usize) -> Result<Option<LinkId>, EngineError> {
        if self.is_readonly() {
            return Ok(None);
        }
        let options = self.options;
        let found = self.transact("detect_implicit_link", |state, ids| detect(state, ids, caret, options))?;
        self.auto_link = found.map(|id| AutoLink { id, caret });
        Ok(found)
    }

    /// Word/line boundary typed at `caret`: auto-link the preceding word,
    /// then insert `boundary`.
    pub fn insert_boundary(&mut self, caret: usize, boundary: char) -> Result<Option<LinkId>, EngineError> {
        self.ensure_editable("insert_boundary")?;
        let options = self.options;
        let mut buf = [0u8; 4];
        let boundary: &str = boundary.encode_utf8(&mut buf);
        let found = self.transact("insert_boundary", |state, ids| {
            check_range(&(caret..caret), state.text.len())?;
            let found = detect(state, ids, caret, options)?;
            edit_text(state, caret..caret, boundary)?;
            Ok(found)
        })?;
        self.auto_link = found.map(|id| AutoLink { id, caret: caret + 1 });
        Ok(found)
    }

    /// Undo a just-created auto-link, or delete one grapheme before `caret`.
    pub fn backspace(&mut self, caret: usize) -> Result<BackspaceOutcome, EngineError> {
        self.ensure_editable("backspace")?;
        if let Some(auto) = self.auto_link.take()
            && auto.caret == caret
            && self.state.link_runs.get(auto.id).is_some()
        {
            self.transact("backspace", |state, _| {
                state.link_runs.remove(auto.id);
                Ok(())
            })?;
            debug!(target: "state.session", id = %auto.id, "auto_link_undone");
            return Ok(BackspaceOutcome::LinkRemoved(auto.id));
        }
        self.transact("backspace", |state, _| {
            check_range(&(caret..caret), state.text.len())?;
            if caret == 0 {
                return Ok(BackspaceOutcome::AtStart);
            }
            let start = state.text.prev_grapheme_boundary(caret);
            edit_text(state, start..caret, "")?;
            Ok(BackspaceOutcome::Deleted(start..caret))
        })
    }

    /// Rebuild text, style runs and link runs from spans handed back by a
    /// rendering surface.
    pub fn rebuild_from_spans(&mut self, spans: &[TaggedFragment]) -> Result<(), EngineError> {
        self.ensure_editable("rebuild_from_spans")?;
        self.auto_link = None;
        self.transact("rebuild_from_spans", |state, ids| {
            let text: String = spans.iter().map(|s| s.text.as_str()).collect();
            let styled: Vec<_> = spans.iter().map(TaggedFragment::as_styled).collect();
            state.text = TextBuffer::from_str(&text);
            let len = state.text.len();
            state.style_runs = StyleRuns::extract_from_segments(&styled);
            state.style_runs.fold_uniform(&mut state.base_style, len);
            state.link_runs = LinkRuns::extract_from_spans(spans, ids);
            state.selection = Selection::new(state.selection.start.min(len), state.selection.end.min(len));
            trace!(
                target: "state.session",
                spans = spans.len(),
                len,
                styles = state.style_runs.len(),
                links = state.link_runs.len(),
                "rebuild_from_spans"
            );
            Ok(())
        })
    }

    pub fn project(&self) -> Vec<Segment> {
        project(self.state.text.len(), &self.state.style_runs, &self.state.link_runs)
    }

    pub fn render_to(&self, surface: &mut dyn RenderSurface) {
        let segments = self.project();
        surface.render(&self.state.text.to_string(), &segments);
        surface.set_selection(self.state.selection);
    }

    /// Adopt the surface's current caret/selection.
    pub fn sync_selection(&mut self, surface: &dyn RenderSurface) -> Result<(), EngineError> {
        self.set_selection(surface.selection())
    }

    pub fn begin_edit(&mut self) -> Result<(), EngineError> {
        self.history.begin_edit(self.state.clone())
    }

    pub fn end_edit(&mut self) -> Result<(), EngineError> {
        self.history.end_edit(self.state.clone())
    }

    /// Push the pending pair; `Ok(false)` when nothing changed.
    pub fn commit(&mut self) -> Result<bool, EngineError> {
        self.history.commit()
    }

    /// Run `f` as one logical edit: begin, apply, end and commit. A failing
    /// `f` leaves history as it was.
    pub fn record<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, EngineError>) -> Result<T, EngineError> {
        self.begin_edit()?;
        match f(self) {
            Ok(value) => {
                self.end_edit()?;
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                self.history.abort();
                Err(e)
            }
        }
    }

    pub fn undo(&mut self) -> Result<bool, EngineError> {
        let Some(snapshot) = self.history.undo()? else {
            return Ok(false);
        };
        self.state = snapshot;
        self.auto_link = None;
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, EngineError> {
        let Some(snapshot) = self.history.redo()? else {
            return Ok(false);
        };
        self.state = snapshot;
        self.auto_link = None;
        Ok(true)
    }

    /// Final persisted form. Editable cells get a last uniformity fold;
    /// read-only cells return their actual value with runs translated back.
    pub fn end_session(self) -> Result<CellState, EngineError> {
        if self.history.is_collecting() {
            return Err(EngineError::MalformedHistoryPairing("end_session while an edit is open"));
        }
        let EditSession { state, origin, .. } = self;
        let out = match origin {
            Some(origin) => {
                let t = OffsetTranslator::new(&state.link_runs);
                let style_runs = state
                    .style_runs
                    .runs()
                    .iter()
                    .map(|r| StyleRun::new(t.to_actual(r.start)..t.to_actual(r.end), r.style.clone()))
                    .filter(|r| r.start < r.end)
                    .collect();
                CellState {
                    text: origin.value.to_string(),
                    base_style: state.base_style,
                    style_runs,
                    link_runs: t.actual_links(),
                    is_readonly: true,
                }
            }
            None => {
                let EditState {
                    text,
                    mut base_style,
                    mut style_runs,
                    link_runs,
                    ..
                } = state;
                style_runs.fold_uniform(&mut base_style, text.len());
                CellState {
                    text: text.to_string(),
                    base_style,
                    style_runs: style_runs.into_runs(),
                    link_runs: link_runs.persisted(),
                    is_readonly: false,
                }
            }
        };
        debug!(
            target: "state.session",
            len = out.text.chars().count(),
            styles = out.style_runs.len(),
            links = out.link_runs.len(),
            "session_end"
        );
        Ok(out)
    }

    fn ensure_editable(&self, op: &'static str) -> Result<(), EngineError> {
        if self.is_readonly() {
            warn!(target: "state.session", op, "readonly_edit_rejected");
            return Err(EngineError::ReadOnly);
        }
        Ok(())
    }

    fn transact<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut EditState, &mut LinkIds) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut next = self.state.clone();
        let mut ids = self.ids.clone();
        let result = f(&mut next, &mut ids).and_then(|value| {
            next.validate()?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                self.state = next;
                self.ids = ids;
                Ok(value)
            }
            Err(e) => {
                warn!(target: "state.session", op, error = %e, "operation_rejected");
                Err(e)
            }
        }
    }
}

fn inherited_style(state: &EditState, range: &Range<usize>) -> CellStyle {
    if range.start > 0 {
        state.style_runs.style_at(range.start - 1)
    } else {
        state.style_runs.style_at(range.end)
    }
}

/// Replace `range` by `text` in all three models; caret lands after the
/// inserted text. Returns the inserted char count.
fn edit_text(state: &mut EditState, range: Range<usize>, text: &str) -> Result<usize, EngineError> {
    check_range(&range, state.text.len())?;
    let inherited = inherited_style(state, &range);
    replace_styled(state, range, text, inherited)
}

/// `edit_text` with an explicit style for the inserted chars.
fn replace_styled(
    state: &mut EditState,
    range: Range<usize>,
    text: &str,
    inherited: CellStyle,
) -> Result<usize, EngineError> {
    let n = text.chars().count();
    state.text.replace(range.clone(), text);
    state.style_runs.set_text(&range, n);
    let retired = state.link_runs.set_text(&range, n);
    let len = state.text.len();
    if n > 0 && !inherited.is_empty() {
        state.style_runs.apply_style(&(range.start..range.start + n), &inherited, len)?;
    } else {
        state.style_runs.normalize();
    }
    state.selection = Selection::caret(range.start + n);
    trace!(
        target: "state.session",
        start = range.start,
        end = range.end,
        inserted = n,
        retired = retired.len(),
        "edit_text"
    );
    Ok(n)
}

fn insert_link(
    state: &mut EditState,
    ids: &mut LinkIds,
    range: Range<usize>,
    reference: &str,
    label: Option<String>,
) -> Result<LinkId, EngineError> {
    check_range(&range, state.text.len())?;
    if !state.link_runs.is_free(&range) {
        return Err(RunError::InvariantViolation {
            reason: "link overlaps an existing link",
            start: range.start,
            end: range.end,
        }
        .into());
    }
    let label = label.filter(|l| !l.is_empty());
    let replacement = match &label {
        Some(l) if state.text.slice(range.clone()) != *l => Some(l.clone()),
        None if range.is_empty() => Some(reference.to_string()),
        _ => None,
    };
    let span = match replacement {
        // A label takes the style of the text it replaces.
        Some(text) if !range.is_empty() => {
            let style = state.style_runs.style_at(range.start);
            let n = replace_styled(state, range.clone(), &text, style)?;
            range.start..range.start + n
        }
        Some(text) => {
            let n = edit_text(state, range.clone(), &text)?;
            range.start..range.start + n
        }
        None => range,
    };
    let id = ids.allocate();
    state.link_runs.insert(LinkRun::new(id, span.clone(), reference, label))?;
    trace!(target: "runs.link", id = %id, start = span.start, end = span.end, "link_inserted");
    Ok(id)
}

fn detect(
    state: &mut EditState,
    ids: &mut LinkIds,
    caret: usize,
    options: SessionOptions,
) -> Result<Option<LinkId>, EngineError> {
    if !options.implicit_links {
        return Ok(None);
    }
    check_range(&(caret..caret), state.text.len())?;
    let Some(floor) = state.link_runs.floor_before(caret) else {
        return Ok(None);
    };
    let Some(found) = linkify::detect_before_caret(&state.text, caret, floor, options.require_scheme) else {
        return Ok(None);
    };
    let id = insert_link(state, ids, found.range, &found.reference, None)?;
    debug!(target: "text.linkify", id = %id, "implicit_link_added");
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{BufferedSurface, PlainTextSanitizer};
    use core_runs::{FragmentLink, PersistedLink, SegmentTag, StyledFragment};
    use pretty_assertions::assert_eq;

    fn session(text: &str) -> EditSession {
        EditSession::begin(CellState::plain(text), SessionOptions::default()).unwrap()
    }

    fn spans(s: &EditSession) -> Vec<(Range<usize>, CellStyle)> {
        s.style_runs()
            .runs()
            .iter()
            .map(|r| (r.start..r.end, r.style.clone()))
            .collect()
    }

    #[test]
    fn typing_at_run_end_inherits_style() {
        let mut s = EditSession::begin(
            CellState {
                style_runs: vec![StyleRun::new(0..3, CellStyle::bold())],
                ..CellState::plain("abcdef")
            },
            SessionOptions::default(),
        )
        .unwrap();
        s.apply_edit(3..3, "XY").unwrap();
        assert_eq!(s.text().to_string(), "abcXYdef");
        assert_eq!(spans(&s), vec![(0..5, CellStyle::bold())]);
        assert_eq!(s.selection(), Selection::caret(5));
    }

    #[test]
    fn typing_at_start_takes_following_style() {
        let mut s = EditSession::begin(
            CellState {
                style_runs: vec![StyleRun::new(0..2, CellStyle::italic())],
                ..CellState::plain("ab")
            },
            SessionOptions::default(),
        )
        .unwrap();
        s.apply_edit(0..0, "z").unwrap();
        assert_eq!(spans(&s), vec![(0..3, CellStyle::italic())]);
    }

    #[test]
    fn out_of_range_edit_is_rejected_without_change() {
        let mut s = session("abc");
        let before = s.state().clone();
        let err = s.apply_edit(2..9, "x").unwrap_err();
        assert!(matches!(err, EngineError::Run(RunError::OffsetOutOfRange { .. })));
        assert_eq!(s.state(), &before);
    }

    #[test]
    fn bold_everything_folds_into_base() {
        let mut s = session("hello");
        let folded = s.apply_style(0..5, &CellStyle::bold()).unwrap();
        assert_eq!(folded, vec!["is_bold"]);
        assert_eq!(s.base_style(), &CellStyle::bold());
        assert!(s.style_runs().is_empty());
    }

    #[test]
    fn add_link_with_label_replaces_text_and_shifts_runs() {
        let mut s = EditSession::begin(
            CellState {
                style_runs: vec![StyleRun::new(8..10, CellStyle::bold())],
                ..CellState::plain("go here now")
            },
            SessionOptions::default(),
        )
        .unwrap();
        let id = s.add_link(3..7, "https://x.test", Some("there".into())).unwrap();
        assert_eq!(id, LinkId(1));
        assert_eq!(s.text().to_string(), "go there now");
        let link = s.link(id).unwrap();
        assert_eq!(link.start..link.end, 3..8);
        assert_eq!(spans(&s), vec![(9..11, CellStyle::bold())]);
    }

    #[test]
    fn label_keeps_style_of_replaced_text() {
        let mut s = EditSession::begin(
            CellState {
                style_runs: vec![StyleRun::new(3..7, CellStyle::bold())],
                ..CellState::plain("go here now")
            },
            SessionOptions::default(),
        )
        .unwrap();
        s.add_link(3..7, "https://x.test", Some("there".into())).unwrap();
        assert_eq!(s.text().to_string(), "go there now");
        assert_eq!(spans(&s), vec![(3..8, CellStyle::bold())]);
    }

    #[test]
    fn add_link_on_empty_range_inserts_reference() {
        let mut s = session("see ");
        let id = s.add_link(4..4, "https://a.test", None).unwrap();
        assert_eq!(s.text().to_string(), "see https://a.test");
        assert_eq!(s.link_at(4).map(|l| l.id), Some(id));
    }

    #[test]
    fn overlapping_add_link_is_rejected() {
        let mut s = session("abcdefgh");
        s.add_link(0..4, "https://a.test", None).unwrap();
        let err = s.add_link(3..6, "https://b.test", None).unwrap_err();
        assert!(matches!(err, EngineError::Run(RunError::InvariantViolation { .. })));
        assert_eq!(s.link_runs().len(), 1);
    }

    #[test]
    fn remove_link_keeps_text_and_optionally_style() {
        let mut s = EditSession::begin(
            CellState {
                style_runs: vec![StyleRun::new(0..6, CellStyle::italic())],
                link_runs: vec![PersistedLink::new(0..3, "https://a.test", None)],
                ..CellState::plain("abcdef")
            },
            SessionOptions::default(),
        )
        .unwrap();
        let mut kept = EditSession::begin(
            CellState {
                style_runs: vec![StyleRun::new(0..6, CellStyle::italic())],
                link_runs: vec![PersistedLink::new(0..3, "https://a.test", None)],
                ..CellState::plain("abcdef")
            },
            SessionOptions::default(),
        )
        .unwrap();
        kept.remove_link(LinkId(1), true).unwrap();
        assert_eq!(spans(&kept), vec![(0..6, CellStyle::italic())]);
        s.remove_link(LinkId(1), false).unwrap();
        assert_eq!(s.text().to_string(), "abcdef");
        assert!(s.link_runs().is_empty());
        assert_eq!(spans(&s), vec![(3..6, CellStyle::italic())]);
        assert_eq!(s.remove_link(LinkId(1), true), Err(EngineError::UnknownLink(LinkId(1))));
    }

    #[test]
    fn update_link_retires_old_id() {
        let mut s = session("abc");
        let old = s.add_link(0..3, "https://a.test", None).unwrap();
        let new = s.update_link(old, "https://b.test", None).unwrap();
        assert_ne!(old, new);
        assert!(s.link(old).is_none());
        assert_eq!(s.link(new).map(|l| l.reference.as_str()), Some("https://b.test"));
    }

    #[test]
    fn deleting_whole_link_retires_it() {
        let mut s = session("ab cd");
        let id = s.add_link(3..5, "https://c.test", None).unwrap();
        s.apply_edit(2..5, "").unwrap();
        assert!(s.link(id).is_none());
        assert_eq!(s.text().to_string(), "ab");
    }

    #[test]
    fn boundary_auto_links_and_backspace_undoes_it() {
        let mut s = session("see example.com");
        let id = s.insert_boundary(15, ' ').unwrap().expect("auto link");
        assert_eq!(s.text().to_string(), "see example.com ");
        let link = s.link(id).unwrap();
        assert_eq!((link.start, link.end, link.reference.as_str()), (4, 15, "example.com"));

        assert_eq!(s.backspace(16).unwrap(), BackspaceOutcome::LinkRemoved(id));
        assert!(s.link_runs().is_empty());
        assert_eq!(s.text().to_string(), "see example.com ");
        // affordance is one-shot
        assert_eq!(s.backspace(16).unwrap(), BackspaceOutcome::Deleted(15..16));
    }

    #[test]
    fn moving_caret_disables_auto_link_backspace() {
        let mut s = session("a.test");
        let id = s.insert_boundary(6, '\n').unwrap();
        assert!(id.is_some());
        s.set_selection(Selection::caret(7)).unwrap();
        assert_eq!(s.backspace(7).unwrap(), BackspaceOutcome::Deleted(6..7));
        assert_eq!(s.link_runs().len(), 1);
    }

    #[test]
    fn detection_respects_config() {
        let mut s = EditSession::begin(
            CellState::plain("example.com"),
            SessionOptions {
                implicit_links: false,
                ..SessionOptions::default()
            },
        )
        .unwrap();
        assert_eq!(s.insert_boundary(11, ' ').unwrap(), None);

        let mut strict = EditSession::begin(
            CellState::plain("example.com"),
            SessionOptions {
                require_scheme: true,
                ..SessionOptions::default()
            },
        )
        .unwrap();
        assert_eq!(strict.detect_implicit_link(11).unwrap(), None);
    }

    #[test]
    fn backspace_removes_whole_grapheme() {
        let mut s = session("ae\u{0301}");
        assert_eq!(s.backspace(3).unwrap(), BackspaceOutcome::Deleted(1..3));
        assert_eq!(s.text().to_string(), "a");
        assert_eq!(s.backspace(0).unwrap(), BackspaceOutcome::AtStart);
    }

    #[test]
    fn paste_keeps_payload_plain_inside_bold_run() {
        let mut s = EditSession::begin(
            CellState {
                style_runs: vec![StyleRun::new(0..4, CellStyle::bold())],
                ..CellState::plain("abcdxy")
            },
            SessionOptions::default(),
        )
        .unwrap();
        s.paste(2..2, "1\r\n2", &PlainTextSanitizer).unwrap();
        assert_eq!(s.text().to_string(), "ab1\n2cdxy");
        assert_eq!(
            spans(&s),
            vec![(0..2, CellStyle::bold()), (5..7, CellStyle::bold())]
        );
        assert_eq!(s.selection(), Selection::caret(5));
    }

    #[test]
    fn rebuild_from_spans_merges_split_link() {
        let mut s = session("");
        let link = FragmentLink {
            id: None,
            reference: "https://a.test".into(),
            label: None,
        };
        s.rebuild_from_spans(&[
            TaggedFragment::plain("go ", CellStyle::default()),
            TaggedFragment::linked("he", CellStyle::italic(), link.clone()),
            TaggedFragment::linked("re", CellStyle::default(), link),
        ])
        .unwrap();
        assert_eq!(s.text().to_string(), "go here");
        assert_eq!(s.link_runs().len(), 1);
        assert_eq!(spans(&s), vec![(3..5, CellStyle::italic())]);
    }

    #[test]
    fn rebuilt_ids_stay_unique_for_later_links() {
        let mut s = session("");
        let carried = FragmentLink {
            id: Some(LinkId(3)),
            reference: "https://a.test".into(),
            label: None,
        };
        s.rebuild_from_spans(&[
            TaggedFragment::linked("aa", CellStyle::default(), carried),
            TaggedFragment::plain(" bb cc dd ee", CellStyle::default()),
        ])
        .unwrap();
        let added: Vec<LinkId> = [3..5, 6..8, 9..11, 12..14]
            .into_iter()
            .map(|r| s.add_link(r, "https://b.test", None).unwrap())
            .collect();
        assert_eq!(added, vec![LinkId(4), LinkId(5), LinkId(6), LinkId(7)]);
        assert_eq!(s.link_runs().len(), 5);
    }

    #[test]
    fn render_to_surface_projects_segments() {
        let mut s = session("ab");
        s.add_link(0..1, "https://a.test", None).unwrap();
        let mut surface = BufferedSurface::default();
        s.render_to(&mut surface);
        assert_eq!(surface.text, "ab");
        assert_eq!(surface.frames, 1);
        let tags: Vec<_> = surface.segments.iter().map(|seg| seg.tag).collect();
        assert_eq!(tags, vec![SegmentTag::Link, SegmentTag::Plain]);
        surface.set_selection(Selection::new(0, 2));
        s.sync_selection(&surface).unwrap();
        assert_eq!(s.selection(), Selection::new(0, 2));
    }

    #[test]
    fn record_commits_one_history_item() {
        let mut s = session("ab");
        s.record(|s| {
            s.apply_edit(2..2, "c")?;
            s.apply_style(0..1, &CellStyle::bold())
        })
        .unwrap();
        assert_eq!(s.history().undo_depth(), 1);
        assert!(s.undo().unwrap());
        assert_eq!(s.text().to_string(), "ab");
        assert!(s.style_runs().is_empty());
        assert!(s.redo().unwrap());
        assert_eq!(s.text().to_string(), "abc");
    }

    #[test]
    fn failed_record_leaves_history_clean() {
        let mut s = session("ab");
        let err = s.record(|s| s.apply_edit(5..6, "x")).unwrap_err();
        assert!(matches!(err, EngineError::Run(_)));
        assert!(!s.history().is_collecting());
        assert!(!s.history().can_undo());
    }

    #[test]
    fn end_session_folds_and_persists() {
        let mut s = session("abc");
        s.apply_style(0..2, &CellStyle::italic()).unwrap();
        s.apply_edit(3..3, "d").unwrap();
        s.add_link(3..4, "https://d.test", None).unwrap();
        let out = s.end_session().unwrap();
        assert_eq!(out.text, "abcd");
        assert_eq!(out.style_runs, vec![StyleRun::new(0..2, CellStyle::italic())]);
        assert_eq!(out.link_runs, vec![PersistedLink::new(3..4, "https://d.test", None)]);
        assert!(!out.is_readonly);
    }

    #[test]
    fn end_session_with_open_edit_is_an_error() {
        let mut s = session("a");
        s.begin_edit().unwrap();
        assert!(matches!(s.end_session(), Err(EngineError::MalformedHistoryPairing(_))));
    }

    #[test]
    fn readonly_session_rejects_edits() {
        let mut s = EditSession::begin(
            CellState {
                is_readonly: true,
                ..CellState::plain("abc")
            },
            SessionOptions::default(),
        )
        .unwrap();
        assert_eq!(s.apply_edit(0..0, "x"), Err(EngineError::ReadOnly));
        assert_eq!(s.apply_style(0..1, &CellStyle::bold()), Err(EngineError::ReadOnly));
        assert_eq!(s.add_link(0..1, "https://a.test", None), Err(EngineError::ReadOnly));
        assert_eq!(
            s.paste(0..0, "x", &PlainTextSanitizer),
            Err(EngineError::ReadOnly)
        );
        assert_eq!(s.detect_implicit_link(3).unwrap(), None);
        assert_eq!(s.text().to_string(), "abc");
    }

    #[test]
    fn styled_fragment_payload_goes_through_extraction() {
        struct BoldSanitizer;
        impl ClipboardSanitizer for BoldSanitizer {
            fn sanitize(&self, payload: &str) -> Vec<StyledFragment> {
                vec![StyledFragment::new(payload, CellStyle::bold())]
            }
        }
        let mut s = session("ab");
        s.paste(1..1, "XY", &BoldSanitizer).unwrap();
        assert_eq!(spans(&s), vec![(1..3, CellStyle::bold())]);
    }
}
