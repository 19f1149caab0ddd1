//! Link run model.
//!
//! Link runs share the partition invariants of style runs but carry an
//! identity: a `LinkId` allocated per editing session, stable across edits,
//! retired when the run collapses or is explicitly replaced. For read-only
//! cells the model also records, per link, the length of the underlying
//! value the displayed label stands in for (`ActualLengthMap`).

use crate::error::RunError;
use crate::fragment::TaggedFragment;
use crate::partition::{Partition, Run};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub u64);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Per-session id source. Never rewinds, so ids stay unique across undo.
#[derive(Debug, Clone)]
pub struct LinkIds {
    next: u64,
}

impl Default for LinkIds {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl LinkIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> LinkId {
        let id = LinkId(self.next);
        self.next += 1;
        id
    }

    /// Move the counter past `id` so later allocations cannot reuse it.
    pub fn reserve_past(&mut self, id: LinkId) {
        self.next = self.next.max(id.0 + 1);
    }
}

/// `id → actual length`; absent means actual length equals display length.
pub type ActualLengthMap = BTreeMap<LinkId, usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRun {
    pub id: LinkId,
    #[serde(rename = "startOffset")]
    pub start: usize,
    #[serde(rename = "endOffset")]
    pub end: usize,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl LinkRun {
    pub fn new(id: LinkId, span: Range<usize>, reference: impl Into<String>, label: Option<String>) -> Self {
        Self {
            id,
            start: span.start,
            end: span.end,
            reference: reference.into(),
            label,
        }
    }

    pub fn display_len(&self) -> usize {
        self.end - self.start
    }
}

impl Run for LinkRun {
    fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    fn set_span(&mut self, span: Range<usize>) {
        self.start = span.start;
        self.end = span.end;
    }
}

/// Link as stored with the cell: no session identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedLink {
    #[serde(rename = "startOffset")]
    pub start: usize,
    #[serde(rename = "endOffset")]
    pub end: usize,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl PersistedLink {
    pub fn new(span: Range<usize>, reference: impl Into<String>, label: Option<String>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            reference: reference.into(),
            label,
        }
    }
}

impl From<&LinkRun> for PersistedLink {
    fn from(run: &LinkRun) -> Self {
        Self {
            start: run.start,
            end: run.end,
            reference: run.reference.clone(),
            label: run.label.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkRuns {
    runs: Partition<LinkRun>,
    actual_lengths: ActualLengthMap,
}

impl LinkRuns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_runs(runs: Vec<LinkRun>, text_len: usize) -> Result<Self, RunError> {
        let links = Self {
            runs: Partition::from_runs(runs, text_len)?,
            actual_lengths: ActualLengthMap::new(),
        };
        links.check_unique_ids()?;
        Ok(links)
    }

    /// Assign fresh ids to persisted links.
    pub fn from_persisted(links: Vec<PersistedLink>, text_len: usize, ids: &mut LinkIds) -> Result<Self, RunError> {
        let runs = links
            .into_iter()
            .map(|l| LinkRun::new(ids.allocate(), l.start..l.end, l.reference, l.label))
            .collect();
        Self::from_runs(runs, text_len)
    }

    pub fn runs(&self) -> &[LinkRun] {
        self.runs.runs()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn validate(&self, text_len: usize) -> Result<(), RunError> {
        self.runs.validate(text_len)?;
        self.check_unique_ids()
    }

    fn check_unique_ids(&self) -> Result<(), RunError> {
        let mut seen = BTreeSet::new();
        match self.runs.iter().find(|r| !seen.insert(r.id)) {
            Some(dup) => Err(RunError::violation("duplicate link id", &dup.span())),
            None => Ok(()),
        }
    }

    pub fn actual_lengths(&self) -> &ActualLengthMap {
        &self.actual_lengths
    }

    pub fn set_actual_length(&mut self, id: LinkId, len: usize) {
        self.actual_lengths.insert(id, len);
    }

    /// Actual length of `run`; falls back to its display length.
    pub fn actual_length(&self, run: &LinkRun) -> usize {
        self.actual_lengths
            .get(&run.id)
            .copied()
            .unwrap_or_else(|| run.display_len())
    }

    pub fn get(&self, id: LinkId) -> Option<&LinkRun> {
        self.runs.iter().find(|r| r.id == id)
    }

    /// Link covering `offset` (`start <= offset < end`).
    pub fn link_at(&self, offset: usize) -> Option<&LinkRun> {
        self.runs.find_at(offset).map(|(_, r)| r)
    }

    /// Leftmost offset a word ending at `offset` may start from without
    /// entering a link. `None` when `offset` lies strictly inside a link.
    pub fn floor_before(&self, offset: usize) -> Option<usize> {
        let mut floor = 0;
        for run in self.runs.iter() {
            if run.end <= offset {
                floor = run.end;
            } else if run.start < offset {
                return None;
            } else {
                break;
            }
        }
        Some(floor)
    }

    /// Re-index for `replaced` being overwritten by `inserted` chars. Returns
    /// the ids of links that collapsed to zero width; they are retired.
    pub fn set_text(&mut self, replaced: &Range<usize>, inserted: usize) -> Vec<LinkId> {
        let retired: Vec<LinkId> = self
            .runs
            .reindex(replaced, inserted)
            .into_iter()
            .map(|r| r.id)
            .collect();
        for id in &retired {
            self.actual_lengths.remove(id);
        }
        trace!(
            target: "runs.link",
            start = replaced.start,
            end = replaced.end,
            inserted,
            retired = retired.len(),
            runs = self.runs.len(),
            "link_set_text"
        );
        retired
    }

    pub fn insert(&mut self, run: LinkRun) -> Result<(), RunError> {
        if self.get(run.id).is_some() {
            return Err(RunError::violation("duplicate link id", &run.span()));
        }
        self.runs.insert(run)?;
        Ok(())
    }

    /// Remove the run with `id` along with its actual-length entry.
    pub fn remove(&mut self, id: LinkId) -> Option<(LinkRun, Option<usize>)> {
        let idx = self.runs.position(|r| r.id == id)?;
        let run = self.runs.remove_at(idx);
        let actual = self.actual_lengths.remove(&id);
        Some((run, actual))
    }

    /// True when `range` touches no existing link (touching ends is fine).
    pub fn is_free(&self, range: &Range<usize>) -> bool {
        self.runs
            .iter()
            .all(|r| r.end <= range.start || r.start >= range.end)
    }

    /// Rebuild link runs from rendered spans. Contiguous spans with the same
    /// id, or lacking ids, with the same ref, merge into a single run; spans
    /// without an id get a fresh one. Ids carried by the spans are reserved
    /// first; a carried id already taken by an earlier run is reassigned.
    pub fn extract_from_spans(fragments: &[TaggedFragment], ids: &mut LinkIds) -> Self {
        for id in fragments.iter().filter_map(|f| f.link.as_ref().and_then(|l| l.id)) {
            ids.reserve_past(id);
        }
        let mut runs: Vec<LinkRun> = Vec::new();
        let mut anonymous_tail: Option<usize> = None;
        let mut cursor = 0usize;
        for fragment in fragments {
            let len = fragment.char_len();
            let end = cursor + len;
            if let Some(link) = &fragment.link
                && len > 0
            {
                let continues = runs.last().is_some_and(|prev| {
                    prev.end == cursor
                        && match link.id {
                            Some(id) => prev.id == id,
                            None => {
                                anonymous_tail == Some(runs.len() - 1)
                                    && prev.reference == link.reference
                            }
                        }
                });
                if let (true, Some(prev)) = (continues, runs.last_mut()) {
                    prev.end = end;
                } else {
                    let id = match link.id {
                        Some(id) if !runs.iter().any(|r| r.id == id) => id,
                        _ => ids.allocate(),
                    };
                    anonymous_tail = link.id.is_none().then_some(runs.len());
                    runs.push(LinkRun::new(id, cursor..end, link.reference.clone(), link.label.clone()));
                }
            }
            cursor = end;
        }
        let mut partition = Partition::new();
        partition.replace_all(runs);
        Self {
            runs: partition,
            actual_lengths: ActualLengthMap::new(),
        }
    }

    pub fn persisted(&self) -> Vec<PersistedLink> {
        self.runs.iter().map(PersistedLink::from).collect()
    }
}
