//! Collaborator seams: the rendering surface the session projects into and
//! the clipboard sanitizer that turns paste payloads into styled fragments.

use core_runs::{Segment, StyledFragment};
use core_text::Selection;
use core_text::normalize::normalize_input;

/// One-way render sink plus caret access. The session never reads rendered
/// nodes back; callers that need a surface's caret ask it explicitly.
pub trait RenderSurface {
    fn render(&mut self, text: &str, segments: &[Segment]);
    fn selection(&self) -> Selection;
    fn set_selection(&mut self, selection: Selection);
}

pub trait ClipboardSanitizer {
    /// Fragments covering the inserted text in order.
    fn sanitize(&self, payload: &str) -> Vec<StyledFragment>;
}

/// Treats every payload as unstyled text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextSanitizer;

impl ClipboardSanitizer for PlainTextSanitizer {
    fn sanitize(&self, payload: &str) -> Vec<StyledFragment> {
        let text = normalize_input(payload);
        if text.is_empty() {
            return Vec::new();
        }
        vec![StyledFragment::plain(text)]
    }
}

/// Surface that keeps the last frame in memory. Used by the replay tool and
/// by tests.
#[derive(Debug, Clone, Default)]
pub struct BufferedSurface {
    pub text: String,
    pub segments: Vec<Segment>,
    pub selection: Selection,
    pub frames: usize,
}

impl RenderSurface for BufferedSurface {
    fn render(&mut self, text: &str, segments: &[Segment]) {
        self.text = text.to_string();
        self.segments = segments.to_vec();
        self.frames += 1;
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }
}
