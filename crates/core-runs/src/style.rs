//! Style run model.
//!
//! A `StyleRuns` is a partition whose payload is a sparse `CellStyle`. Gaps
//! between runs mean "use the cell's base style". Runs with an empty style are
//! pruned and adjacent runs with equal styles are merged by `normalize`;
//! `set_text` alone never merges (it is pure re-indexing).

use crate::error::{RunError, check_range};
use crate::fragment::StyledFragment;
use crate::partition::{Partition, Run};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::trace;

/// Sparse character style. `None` means "inherit"; `Some(false)` is an
/// explicit override of an inherited `true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CellStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_strikethrough: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
}

impl CellStyle {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn bold() -> Self {
        Self::default().with_bold(true)
    }

    pub fn italic() -> Self {
        Self::default().with_italic(true)
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.is_bold = Some(bold);
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.is_italic = Some(italic);
        self
    }

    pub fn with_underline(mut self, underline: bool) -> Self {
        self.is_underline = Some(underline);
        self
    }

    pub fn with_strikethrough(mut self, strikethrough: bool) -> Self {
        self.is_strikethrough = Some(strikethrough);
        self
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn with_text_color(mut self, color: impl Into<String>) -> Self {
        self.text_color = Some(color.into());
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Copy of `self` with every field present in `patch` taking the patch value.
    pub fn overlay(&self, patch: &CellStyle) -> CellStyle {
        CellStyle {
            is_bold: patch.is_bold.or(self.is_bold),
            is_italic: patch.is_italic.or(self.is_italic),
            is_strikethrough: patch.is_strikethrough.or(self.is_strikethrough),
            is_underline: patch.is_underline.or(self.is_underline),
            font_family: patch.font_family.clone().or_else(|| self.font_family.clone()),
            text_color: patch.text_color.clone().or_else(|| self.text_color.clone()),
            font_size: patch.font_size.or(self.font_size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRun {
    #[serde(rename = "startOffset")]
    pub start: usize,
    #[serde(rename = "endOffset")]
    pub end: usize,
    pub style: CellStyle,
}

impl StyleRun {
    pub fn new(span: Range<usize>, style: CellStyle) -> Self {
        Self {
            start: span.start,
            end: span.end,
            style,
        }
    }
}

impl Run for StyleRun {
    fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    fn set_span(&mut self, span: Range<usize>) {
        self.start = span.start;
        self.end = span.end;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleRuns {
    runs: Partition<StyleRun>,
}

/// Fold one attribute into the base style when every run carries the same value.
macro_rules! fold_attr {
    ($runs:expr, $base:expr, $folded:expr, $field:ident) => {{
        let first = $runs.first().and_then(|r| r.style.$field.clone());
        if let Some(value) = first
            && $runs.iter().all(|r| r.style.$field.as_ref() == Some(&value))
        {
            for run in $runs.iter_mut() {
                run.style.$field = None;
            }
            $base.$field = Some(value);
            $folded.push(stringify!($field));
        }
    }};
}

impl StyleRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from persisted runs: empty-style runs are pruned, the rest must be
    /// non-overlapping and in bounds; the result is normalized.
    pub fn from_runs(runs: Vec<StyleRun>, text_len: usize) -> Result<Self, RunError> {
        let runs = runs.into_iter().filter(|r| !r.style.is_empty()).collect();
        let mut out = Self {
            runs: Partition::from_runs(runs, text_len)?,
        };
        out.normalize();
        Ok(out)
    }

    pub fn runs(&self) -> &[StyleRun] {
        self.runs.runs()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn into_runs(self) -> Vec<StyleRun> {
        self.runs.into_runs()
    }

    pub fn validate(&self, text_len: usize) -> Result<(), RunError> {
        self.runs.validate(text_len)
    }

    /// Style of the run covering `offset`, or empty in a gap.
    pub fn style_at(&self, offset: usize) -> CellStyle {
        self.runs
            .find_at(offset)
            .map(|(_, r)| r.style.clone())
            .unwrap_or_default()
    }

    /// Re-index for `replaced` being overwritten by `inserted` chars.
    pub fn set_text(&mut self, replaced: &Range<usize>, inserted: usize) {
        let dropped = self.runs.reindex(replaced, inserted);
        trace!(
            target: "runs.style",
            start = replaced.start,
            end = replaced.end,
            inserted,
            dropped = dropped.len(),
            runs = self.runs.len(),
            "style_set_text"
        );
    }

    /// Merge touching runs with equal styles and prune empty ones.
    pub fn normalize(&mut self) {
        let mut merged: Vec<StyleRun> = Vec::with_capacity(self.runs.len());
        for run in self.runs.iter() {
            if run.style.is_empty() || run.start >= run.end {
                continue;
            }
            match merged.last_mut() {
                Some(prev) if prev.end == run.start && prev.style == run.style => {
                    prev.end = run.end;
                }
                _ => merged.push(run.clone()),
            }
        }
        self.runs.replace_all(merged);
    }

    /// Build canonical runs from fragments covering the buffer contiguously.
    pub fn extract_from_segments(fragments: &[StyledFragment]) -> Self {
        let mut runs: Vec<StyleRun> = Vec::new();
        let mut cursor = 0usize;
        for fragment in fragments {
            let len = fragment.char_len();
            if len == 0 {
                continue;
            }
            let end = cursor + len;
            if !fragment.style.is_empty() {
                match runs.last_mut() {
                    Some(prev) if prev.end == cursor && prev.style == fragment.style => {
                        prev.end = end;
                    }
                    _ => runs.push(StyleRun::new(cursor..end, fragment.style.clone())),
                }
            }
            cursor = end;
        }
        let mut partition = Partition::new();
        partition.replace_all(runs);
        Self { runs: partition }
    }

    /// Overlay `patch` on every character of `range`; gaps take the patch alone.
    pub fn apply_style(&mut self, range: &Range<usize>, patch: &CellStyle, text_len: usize) -> Result<(), RunError> {
        check_range(range, text_len)?;
        self.rewrite(range, |style| style.overlay(patch));
        trace!(target: "runs.style", start = range.start, end = range.end, runs = self.runs.len(), "apply_style");
        Ok(())
    }

    /// Drop all per-run style inside `range`.
    pub fn clear(&mut self, range: &Range<usize>, text_len: usize) -> Result<(), RunError> {
        check_range(range, text_len)?;
        self.rewrite(range, |_| CellStyle::default());
        Ok(())
    }

    /// Replace everything inside `range` with `runs` (given relative to
    /// `range.start`).
    pub fn splice(&mut self, range: &Range<usize>, runs: &StyleRuns, text_len: usize) -> Result<(), RunError> {
        check_range(range, text_len)?;
        if let Some(last) = runs.runs().last()
            && range.start + last.end > range.end
        {
            return Err(RunError::violation("spliced runs exceed range", range));
        }
        self.rewrite(range, |_| CellStyle::default());
        let mut all = self.runs.runs().to_vec();
        all.extend(runs.runs().iter().map(|r| {
            StyleRun::new(range.start + r.start..range.start + r.end, r.style.clone())
        }));
        all.sort_by_key(|r| r.start);
        self.runs.replace_all(all);
        self.normalize();
        Ok(())
    }

    /// Hoist attributes shared by every run into `base`. Only applies when the
    /// runs cover `[0, text_len)` without gaps, since gap characters would
    /// otherwise pick up the hoisted value. Returns the folded attribute names.
    pub fn fold_uniform(&mut self, base: &mut CellStyle, text_len: usize) -> Vec<&'static str> {
        let mut folded = Vec::new();
        if text_len == 0 || !self.covers(text_len) {
            return folded;
        }
        let mut runs = self.runs.runs().to_vec();
        fold_attr!(runs, base, folded, is_bold);
        fold_attr!(runs, base, folded, is_italic);
        fold_attr!(runs, base, folded, is_strikethrough);
        fold_attr!(runs, base, folded, is_underline);
        fold_attr!(runs, base, folded, font_size);
        fold_attr!(runs, base, folded, font_family);
        fold_attr!(runs, base, folded, text_color);
        if !folded.is_empty() {
            self.runs.replace_all(runs);
            self.normalize();
            trace!(target: "runs.style", folded = ?folded, runs = self.runs.len(), "fold_uniform");
        }
        folded
    }

    /// Same runs with every gap filled by an empty-style run, covering
    /// `[0, text_len)` exactly.
    pub fn filled(&self, text_len: usize) -> Vec<StyleRun> {
        let mut out = Vec::with_capacity(self.runs.len() * 2 + 1);
        let mut cursor = 0usize;
        for run in self.runs.iter() {
            if cursor < run.start {
                out.push(StyleRun::new(cursor..run.start, CellStyle::default()));
            }
            out.push(run.clone());
            cursor = run.end;
        }
        if cursor < text_len {
            out.push(StyleRun::new(cursor..text_len, CellStyle::default()));
        }
        out
    }

    fn covers(&self, text_len: usize) -> bool {
        let mut cursor = 0usize;
        for run in self.runs.iter() {
            if run.start != cursor {
                return false;
            }
            cursor = run.end;
        }
        cursor == text_len
    }

    /// Replace styles inside `range` by `f(existing)`; gaps are treated as the
    /// empty style. Runs straddling the boundaries are split.
    fn rewrite(&mut self, range: &Range<usize>, f: impl Fn(&CellStyle) -> CellStyle) {
        if range.start >= range.end {
            return;
        }
        let mut out: Vec<StyleRun> = Vec::with_capacity(self.runs.len() + 2);
        let mut cursor = range.start;
        for run in self.runs.iter() {
            if run.end <= range.start || run.start >= range.end {
                out.push(run.clone());
                continue;
            }
            if run.start < range.start {
                out.push(StyleRun::new(run.start..range.start, run.style.clone()));
            }
            let inner_start = run.start.max(range.start);
            let inner_end = run.end.min(range.end);
            if cursor < inner_start {
                out.push(StyleRun::new(cursor..inner_start, f(&CellStyle::default())));
            }
            out.push(StyleRun::new(inner_start..inner_end, f(&run.style)));
            cursor = inner_end;
            if run.end > range.end {
                out.push(StyleRun::new(range.end..run.end, run.style.clone()));
            }
        }
        if cursor < range.end {
            out.push(StyleRun::new(cursor..range.end, f(&CellStyle::default())));
        }
        out.sort_by_key(|r| r.start);
        self.runs.replace_all(out);
        self.normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(span: Range<usize>, style: CellStyle) -> StyleRun {
        StyleRun::new(span, style)
    }

    #[test]
    fn from_runs_prunes_and_merges() {
        let runs = StyleRuns::from_runs(
            vec![
                run(0..3, CellStyle::bold()),
                run(3..5, CellStyle::bold()),
                run(5..7, CellStyle::default()),
            ],
            10,
        )
        .unwrap();
        assert_eq!(runs.runs(), &[run(0..5, CellStyle::bold())]);
    }

    #[test]
    fn set_text_does_not_merge() {
        let mut runs = StyleRuns::from_runs(
            vec![run(0..2, CellStyle::bold()), run(4..6, CellStyle::bold())],
            6,
        )
        .unwrap();
        runs.set_text(&(2..4), 0);
        assert_eq!(
            runs.runs(),
            &[run(0..2, CellStyle::bold()), run(2..4, CellStyle::bold())]
        );
        runs.normalize();
        assert_eq!(runs.runs(), &[run(0..4, CellStyle::bold())]);
    }

    #[test]
    fn extract_merges_equal_neighbours_and_skips_plain() {
        let fragments = vec![
            StyledFragment::new("ab", CellStyle::bold()),
            StyledFragment::new("cd", CellStyle::bold()),
            StyledFragment::plain("ef"),
            StyledFragment::new("g", CellStyle::italic()),
            StyledFragment::new("", CellStyle::italic()),
        ];
        let runs = StyleRuns::extract_from_segments(&fragments);
        assert_eq!(
            runs.runs(),
            &[run(0..4, CellStyle::bold()), run(6..7, CellStyle::italic())]
        );
    }

    #[test]
    fn apply_style_splits_and_fills_gaps() {
        let mut runs = StyleRuns::from_runs(vec![run(2..6, CellStyle::bold())], 10).unwrap();
        runs.apply_style(&(4..8), &CellStyle::italic(), 10).unwrap();
        assert_eq!(
            runs.runs(),
            &[
                run(2..4, CellStyle::bold()),
                run(4..6, CellStyle::bold().with_italic(true)),
                run(6..8, CellStyle::italic()),
            ]
        );
    }

    #[test]
    fn apply_style_out_of_range_is_rejected_untouched() {
        let mut runs = StyleRuns::from_runs(vec![run(0..2, CellStyle::bold())], 4).unwrap();
        let before = runs.clone();
        let err = runs.apply_style(&(2..9), &CellStyle::italic(), 4).unwrap_err();
        assert!(matches!(err, RunError::OffsetOutOfRange { .. }));
        assert_eq!(runs, before);
    }

    #[test]
    fn clear_removes_inner_style_only() {
        let mut runs = StyleRuns::from_runs(vec![run(0..10, CellStyle::bold())], 10).unwrap();
        runs.clear(&(3..7), 10).unwrap();
        assert_eq!(
            runs.runs(),
            &[run(0..3, CellStyle::bold()), run(7..10, CellStyle::bold())]
        );
    }

    #[test]
    fn splice_replaces_range_content() {
        let mut runs = StyleRuns::from_runs(vec![run(0..6, CellStyle::bold())], 6).unwrap();
        let inner = StyleRuns::extract_from_segments(&[
            StyledFragment::plain("x"),
            StyledFragment::new("y", CellStyle::italic()),
        ]);
        runs.splice(&(2..4), &inner, 6).unwrap();
        assert_eq!(
            runs.runs(),
            &[
                run(0..2, CellStyle::bold()),
                run(3..4, CellStyle::italic()),
                run(4..6, CellStyle::bold()),
            ]
        );
    }

    #[test]
    fn fold_uniform_hoists_shared_bold() {
        let mut runs = StyleRuns::from_runs(
            vec![
                run(0..3, CellStyle::bold().with_italic(true)),
                run(3..6, CellStyle::bold()),
            ],
            6,
        )
        .unwrap();
        let mut base = CellStyle::default();
        let folded = runs.fold_uniform(&mut base, 6);
        assert_eq!(folded, vec!["is_bold"]);
        assert_eq!(base, CellStyle::bold());
        assert_eq!(runs.runs(), &[run(0..3, CellStyle::italic())]);
    }

    #[test]
    fn fold_uniform_skips_when_gaps_exist() {
        let mut runs = StyleRuns::from_runs(vec![run(0..3, CellStyle::bold())], 6).unwrap();
        let mut base = CellStyle::default();
        assert!(runs.fold_uniform(&mut base, 6).is_empty());
        assert!(base.is_empty());
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn fold_uniform_each_attribute_independent() {
        let mut runs = StyleRuns::from_runs(
            vec![
                run(0..2, CellStyle::default().with_font_size(11.0).with_text_color("#f00")),
                run(2..4, CellStyle::default().with_font_size(11.0).with_text_color("#0f0")),
            ],
            4,
        )
        .unwrap();
        let mut base = CellStyle::default();
        assert_eq!(runs.fold_uniform(&mut base, 4), vec!["font_size"]);
        assert_eq!(base.font_size, Some(11.0));
        assert_eq!(runs.runs()[0].style, CellStyle::default().with_text_color("#f00"));
    }

    #[test]
    fn fold_uniform_hoists_decorations_and_family() {
        let shared = CellStyle::default()
            .with_strikethrough(true)
            .with_underline(false)
            .with_font_family("Arial");
        let mut runs = StyleRuns::from_runs(
            vec![
                run(0..3, shared.clone().with_bold(true)),
                run(3..5, shared.with_underline(true)),
            ],
            5,
        )
        .unwrap();
        let mut base = CellStyle::default();
        assert_eq!(runs.fold_uniform(&mut base, 5), vec!["is_strikethrough", "font_family"]);
        assert_eq!(base, CellStyle::default().with_strikethrough(true).with_font_family("Arial"));
        assert_eq!(
            runs.runs()[1].style,
            CellStyle::default().with_underline(true)
        );
    }

    #[test]
    fn filled_covers_text() {
        let runs = StyleRuns::from_runs(vec![run(2..4, CellStyle::bold())], 6).unwrap();
        let spans: Vec<_> = runs.filled(6).iter().map(|r| r.start..r.end).collect();
        assert_eq!(spans, vec![0..2, 2..4, 4..6]);
    }

    #[test]
    fn serde_uses_offset_names_and_sparse_style() {
        let json = serde_json::to_string(&run(1..3, CellStyle::bold())).unwrap();
        assert_eq!(json, r#"{"startOffset":1,"endOffset":3,"style":{"isBold":true}}"#);
    }
}
