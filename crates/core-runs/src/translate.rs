//! Offset translation between a cell's actual value and its display text.
//!
//! A read-only cell shows link labels in place of the value substrings they
//! stand for, so a link's display length can differ from its actual length.
//! The mapping is monotone and piecewise: outside links it is a shift by the
//! accumulated `display - actual` delta of all links before the offset;
//! inside a link it advances one-to-one from the link start and clamps at the
//! shorter of the two lengths. Offsets in the clamped tail of a link whose
//! actual text is longer than its label have no display counterpart of their
//! own and map to the label end.

use crate::error::RunError;
use crate::link::{LinkId, LinkIds, LinkRun, LinkRuns, PersistedLink};
use crate::partition::Partition;
use core_text::TextBuffer;
use std::ops::Range;
use tracing::debug;

pub struct OffsetTranslator<'a> {
    links: &'a LinkRuns,
}

impl<'a> OffsetTranslator<'a> {
    pub fn new(links: &'a LinkRuns) -> Self {
        Self { links }
    }

    pub fn to_display(&self, actual: usize) -> usize {
        // display - actual, accumulated over links entirely before `actual`.
        let mut delta: isize = 0;
        for run in self.links.runs() {
            let actual_len = self.links.actual_length(run);
            let actual_start = (run.start as isize - delta) as usize;
            let actual_end = actual_start + actual_len;
            if actual >= actual_end {
                delta += run.display_len() as isize - actual_len as isize;
                continue;
            }
            if actual > actual_start {
                return run.start + (actual - actual_start).min(run.display_len());
            }
            break;
        }
        (actual as isize + delta) as usize
    }

    pub fn to_actual(&self, display: usize) -> usize {
        // actual - display, accumulated over links entirely before `display`.
        let mut delta: isize = 0;
        for run in self.links.runs() {
            let actual_len = self.links.actual_length(run);
            if display >= run.end {
                delta += actual_len as isize - run.display_len() as isize;
                continue;
            }
            if display > run.start {
                let actual_start = (run.start as isize + delta) as usize;
                return actual_start + (display - run.start).min(actual_len);
            }
            break;
        }
        (display as isize + delta) as usize
    }

    /// Actual-value range covered by the link `id`.
    pub fn actual_span(&self, id: LinkId) -> Option<Range<usize>> {
        let mut delta: isize = 0;
        for run in self.links.runs() {
            let actual_len = self.links.actual_length(run);
            if run.id == id {
                let start = (run.start as isize + delta) as usize;
                return Some(start..start + actual_len);
            }
            delta += actual_len as isize - run.display_len() as isize;
        }
        None
    }

    /// Links re-expressed in actual-value coordinates, labels kept.
    pub fn actual_links(&self) -> Vec<PersistedLink> {
        let mut delta: isize = 0;
        let mut out = Vec::with_capacity(self.links.len());
        for run in self.links.runs() {
            let actual_len = self.links.actual_length(run);
            let start = (run.start as isize + delta) as usize;
            out.push(PersistedLink::new(
                start..start + actual_len,
                run.reference.clone(),
                run.label.clone(),
            ));
            delta += actual_len as isize - run.display_len() as isize;
        }
        out
    }
}

/// Display text plus display-coordinate link runs for a read-only value.
#[derive(Debug, Clone)]
pub struct DisplayView {
    pub text: TextBuffer,
    pub links: LinkRuns,
}

/// Substitute each labeled link's label for its actual substring, recording
/// the actual length of every substituted link.
pub fn substitute_labels(
    value: &TextBuffer,
    links: Vec<PersistedLink>,
    ids: &mut LinkIds,
) -> Result<DisplayView, RunError> {
    let actual_runs: Vec<LinkRun> = links
        .into_iter()
        .map(|l| LinkRun::new(ids.allocate(), l.start..l.end, l.reference, l.label))
        .collect();
    let actual = Partition::from_runs(actual_runs, value.len())?;

    let mut display = String::new();
    let mut display_len = 0usize;
    let mut cursor = 0usize;
    let mut runs = Vec::with_capacity(actual.len());
    let mut substituted: Vec<(LinkId, usize)> = Vec::new();
    for run in actual.iter() {
        let before = value.slice(cursor..run.start);
        display_len += before.chars().count();
        display.push_str(&before);
        let shown = match &run.label {
            Some(label) if !label.is_empty() => {
                substituted.push((run.id, run.display_len()));
                label.clone()
            }
            _ => value.slice(run.start..run.end),
        };
        let shown_len = shown.chars().count();
        display.push_str(&shown);
        runs.push(LinkRun::new(
            run.id,
            display_len..display_len + shown_len,
            run.reference.clone(),
            run.label.clone(),
        ));
        display_len += shown_len;
        cursor = run.end;
    }
    display.push_str(&value.slice(cursor..value.len()));
    display_len = display.chars().count();

    let mut links = LinkRuns::from_runs(runs, display_len)?;
    for (id, len) in substituted {
        links.set_actual_length(id, len);
    }
    debug!(
        target: "runs.link",
        actual_len = value.len(),
        display_len,
        links = links.len(),
        "labels_substituted"
    );
    Ok(DisplayView {
        text: TextBuffer::from_str(&display),
        links,
    })
}
