//! Ordered, non-overlapping half-open ranges over a text buffer.
//!
//! Invariants held by every `Partition` after a successful operation:
//! * runs are sorted ascending by start;
//! * no two runs overlap (touching is fine);
//! * each run is non-empty and lies inside `[0, len(text)]`.
//!
//! Gaps carry no meaning here; the payload models decide what a gap means.

use crate::error::RunError;
use std::ops::Range;

/// A payload-carrying range stored in a `Partition`.
pub trait Run: Clone {
    fn span(&self) -> Range<usize>;
    fn set_span(&mut self, span: Range<usize>);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition<R> {
    runs: Vec<R>,
}

impl<R> Default for Partition<R> {
    fn default() -> Self {
        Self { runs: Vec::new() }
    }
}

impl<R: Run> Partition<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary-order runs; sorts, then rejects overlap or bounds
    /// problems instead of repairing them.
    pub fn from_runs(mut runs: Vec<R>, text_len: usize) -> Result<Self, RunError> {
        runs.sort_by_key(|r| r.span().start);
        let partition = Self { runs };
        partition.validate(text_len)?;
        Ok(partition)
    }

    pub fn validate(&self, text_len: usize) -> Result<(), RunError> {
        let mut prev_end = 0usize;
        for run in &self.runs {
            let span = run.span();
            if span.start >= span.end {
                return Err(RunError::violation("empty run", &span));
            }
            if span.end > text_len {
                return Err(RunError::violation("run past end of text", &span));
            }
            if span.start < prev_end {
                return Err(RunError::violation("overlapping runs", &span));
            }
            prev_end = span.end;
        }
        Ok(())
    }

    pub fn runs(&self) -> &[R] {
        &self.runs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.runs.iter()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn into_runs(self) -> Vec<R> {
        self.runs
    }

    /// Index and run covering `offset` (`start <= offset < end`).
    pub fn find_at(&self, offset: usize) -> Option<(usize, &R)> {
        let idx = self.runs.partition_point(|r| r.span().end <= offset);
        self.runs
            .get(idx)
            .filter(|r| r.span().start <= offset)
            .map(|r| (idx, r))
    }

    /// Insert a run at its sorted position. Fails without mutating if it would
    /// overlap a neighbour or is empty.
    pub fn insert(&mut self, run: R) -> Result<usize, RunError> {
        let span = run.span();
        if span.start >= span.end {
            return Err(RunError::violation("empty run", &span));
        }
        let idx = self.runs.partition_point(|r| r.span().start < span.start);
        if let Some(prev) = idx.checked_sub(1).and_then(|i| self.runs.get(i))
            && prev.span().end > span.start
        {
            return Err(RunError::violation("overlapping runs", &span));
        }
        if let Some(next) = self.runs.get(idx)
            && next.span().start < span.end
        {
            return Err(RunError::violation("overlapping runs", &span));
        }
        self.runs.insert(idx, run);
        Ok(idx)
    }

    pub fn remove_at(&mut self, idx: usize) -> R {
        self.runs.remove(idx)
    }

    pub fn position(&self, pred: impl FnMut(&R) -> bool) -> Option<usize> {
        self.runs.iter().position(pred)
    }

    /// Re-index every run for `replaced` being overwritten by `inserted` chars.
    /// Runs collapsing to zero width are removed and returned.
    pub fn reindex(&mut self, replaced: &Range<usize>, inserted: usize) -> Vec<R> {
        let mut dropped = Vec::new();
        let mut kept = Vec::with_capacity(self.runs.len());
        for mut run in self.runs.drain(..) {
            let span = reindex_span(run.span(), replaced, inserted);
            if span.start >= span.end {
                dropped.push(run);
            } else {
                run.set_span(span);
                kept.push(run);
            }
        }
        self.runs = kept;
        dropped
    }

    pub(crate) fn replace_all(&mut self, runs: Vec<R>) {
        self.runs = runs;
    }
}

/// Geometric re-indexing of a single span for `replaced` becoming `inserted`
/// chars long.
///
/// Start: unchanged before the edit, shifted after it, clipped to the end of
/// the inserted text when it fell inside the replaced range. End: unchanged
/// when at or before the edit start, shifted when past the replaced range,
/// clipped to the edit start otherwise. A span strictly containing the edit
/// therefore grows over the inserted text; a span merely touching it does not.
pub fn reindex_span(span: Range<usize>, replaced: &Range<usize>, inserted: usize) -> Range<usize> {
    let (s, e) = (replaced.start, replaced.end);
    let shift = |x: usize| x - (e - s) + inserted;
    let start = if span.start < s {
        span.start
    } else if span.start >= e {
        shift(span.start)
    } else {
        s + inserted
    };
    let end = if span.end <= s {
        span.end
    } else if span.end > e {
        shift(span.end)
    } else {
        s
    };
    start..end
}
