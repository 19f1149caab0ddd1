//! Segment projection: merge the style partition and the link partition into
//! one ordered list of tagged segments for a renderer.
//!
//! Design invariants:
//! * Output segments are contiguous and cover `[0, len(text))` exactly once.
//! * A link segment inherits the style of the style run it intersects; link
//!   identity decides the tag, style still applies on top.
//! * Both inputs are sorted, so a single merged sweep suffices: the link
//!   cursor only ever moves forward.

use crate::link::{LinkId, LinkRuns};
use crate::style::{CellStyle, StyleRuns};
use serde::Serialize;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentTag {
    Plain,
    Link,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub tag: SegmentTag,
    #[serde(rename = "startOffset")]
    pub start: usize,
    #[serde(rename = "endOffset")]
    pub end: usize,
    pub style: CellStyle,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<LinkId>,
}

impl Segment {
    fn plain(span: Range<usize>, style: &CellStyle) -> Self {
        Self {
            tag: SegmentTag::Plain,
            start: span.start,
            end: span.end,
            style: style.clone(),
            reference: None,
            id: None,
        }
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }
}

pub fn project(text_len: usize, styles: &StyleRuns, links: &LinkRuns) -> Vec<Segment> {
    let style_runs = styles.filled(text_len);
    let link_runs = links.runs();
    let mut out = Vec::with_capacity(style_runs.len() + link_runs.len() * 2);
    let mut li = 0usize;
    for sr in &style_runs {
        let mut cursor = sr.start;
        while let Some(lr) = link_runs.get(li) {
            let start = sr.start.max(lr.start);
            let end = sr.end.min(lr.end);
            if start < end {
                if cursor < start {
                    out.push(Segment::plain(cursor..start, &sr.style));
                }
                out.push(Segment {
                    tag: SegmentTag::Link,
                    start,
                    end,
                    style: sr.style.clone(),
                    reference: Some(lr.reference.clone()),
                    id: Some(lr.id),
                });
                cursor = end;
                if lr.end <= sr.end {
                    li += 1;
                    continue;
                }
                break;
            }
            if lr.end <= sr.start {
                li += 1;
                continue;
            }
            break;
        }
        if cursor < sr.end {
            out.push(Segment::plain(cursor..sr.end, &sr.style));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkRun;
    use crate::style::StyleRun;
    use pretty_assertions::assert_eq;

    fn seg(tag: SegmentTag, span: Range<usize>, style: CellStyle, link: Option<(u64, &str)>) -> Segment {
        Segment {
            tag,
            start: span.start,
            end: span.end,
            style,
            reference: link.map(|(_, r)| r.to_string()),
            id: link.map(|(id, _)| LinkId(id)),
        }
    }

    #[test]
    fn link_inside_bold_run_yields_three_segments() {
        let styles = StyleRuns::from_runs(vec![StyleRun::new(0..10, CellStyle::bold())], 10).unwrap();
        let links = LinkRuns::from_runs(
            vec![LinkRun::new(LinkId(1), 3..7, "ref", Some("label".into()))],
            10,
        )
        .unwrap();
        assert_eq!(
            project(10, &styles, &links),
            vec![
                seg(SegmentTag::Plain, 0..3, CellStyle::bold(), None),
                seg(SegmentTag::Link, 3..7, CellStyle::bold(), Some((1, "ref"))),
                seg(SegmentTag::Plain, 7..10, CellStyle::bold(), None),
            ]
        );
    }

    #[test]
    fn link_spanning_two_style_runs_splits() {
        let styles = StyleRuns::from_runs(
            vec![
                StyleRun::new(0..4, CellStyle::bold()),
                StyleRun::new(4..8, CellStyle::italic()),
            ],
            8,
        )
        .unwrap();
        let links = LinkRuns::from_runs(vec![LinkRun::new(LinkId(1), 2..6, "r", None)], 8).unwrap();
        assert_eq!(
            project(8, &styles, &links),
            vec![
                seg(SegmentTag::Plain, 0..2, CellStyle::bold(), None),
                seg(SegmentTag::Link, 2..4, CellStyle::bold(), Some((1, "r"))),
                seg(SegmentTag::Link, 4..6, CellStyle::italic(), Some((1, "r"))),
                seg(SegmentTag::Plain, 6..8, CellStyle::italic(), None),
            ]
        );
    }

    #[test]
    fn several_links_in_one_gap() {
        let styles = StyleRuns::new();
        let links = LinkRuns::from_runs(
            vec![
                LinkRun::new(LinkId(1), 0..2, "a", None),
                LinkRun::new(LinkId(2), 4..6, "b", None),
            ],
            7,
        )
        .unwrap();
        let tags: Vec<_> = project(7, &styles, &links)
            .iter()
            .map(|s| (s.tag, s.span()))
            .collect();
        assert_eq!(
            tags,
            vec![
                (SegmentTag::Link, 0..2),
                (SegmentTag::Plain, 2..4),
                (SegmentTag::Link, 4..6),
                (SegmentTag::Plain, 6..7),
            ]
        );
    }

    #[test]
    fn empty_text_projects_nothing() {
        assert!(project(0, &StyleRuns::new(), &LinkRuns::new()).is_empty());
    }
}
