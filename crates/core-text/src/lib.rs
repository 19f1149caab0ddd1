//! Rope-backed text buffer for a single cell's editable content.
//!
//! Every offset handed across this crate's API is a *char* offset (Unicode
//! scalar value index). Byte offsets never escape: regex matches and grapheme
//! segmentation are translated back to char offsets before returning.

use ropey::Rope;
use std::fmt;
use std::ops::Range;

pub mod linkify;
pub mod normalize;

/// Immutable-per-version cell text. Edits replace a range wholesale; cloning is
/// cheap (rope nodes are shared) which keeps full history snapshots affordable.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    rope: Rope,
}

impl fmt::Debug for TextBuffer {
    // Cell content is user data; only the length is shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBuffer")
            .field("len", &self.len())
            .finish()
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.rope.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

impl From<&str> for TextBuffer {
    fn from(value: &str) -> Self {
        Self::from_str(value)
    }
}

impl TextBuffer {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
        }
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    pub fn char_at(&self, offset: usize) -> Option<char> {
        if offset < self.len() {
            Some(self.rope.char(offset))
        } else {
            None
        }
    }

    /// Owned copy of the chars in `range`, clamped to the buffer.
    pub fn slice(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        self.rope.slice(start..end).to_string()
    }

    /// Replace `range` with `text`, returning the removed chars. The range is
    /// clamped; callers validate beforehand when out-of-range must be an error.
    pub fn replace(&mut self, range: Range<usize>, text: &str) -> String {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        let removed = self.rope.slice(start..end).to_string();
        self.rope.remove(start..end);
        self.rope.insert(start, text);
        removed
    }

    /// Char offset of the grapheme boundary preceding `offset` (0 at start).
    pub fn prev_grapheme_boundary(&self, offset: usize) -> usize {
        let offset = offset.min(self.len());
        let prefix = self.slice(0..offset);
        grapheme::prev_boundary(&prefix, offset)
    }

    /// Start of the run of non-whitespace chars ending at `offset`, never
    /// walking left past `floor`.
    pub fn word_start_before(&self, offset: usize, floor: usize) -> usize {
        let mut start = offset.min(self.len());
        while start > floor {
            match self.char_at(start - 1) {
                Some(c) if !c.is_whitespace() => start -= 1,
                _ => break,
            }
        }
        start
    }
}

/// Caret or selection, normalized so `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn caret(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

pub mod grapheme {
    use unicode_segmentation::UnicodeSegmentation;

    /// Previous grapheme boundary for a prefix whose char length is
    /// `prefix_chars`; the result is a char offset.
    pub fn prev_boundary(prefix: &str, prefix_chars: usize) -> usize {
        match prefix.graphemes(true).next_back() {
            Some(last) => prefix_chars - last.chars().count(),
            None => 0,
        }
    }

    /// Convert a byte offset inside `s` to a char offset.
    pub fn byte_to_char(s: &str, byte: usize) -> usize {
        s[..byte.min(s.len())].chars().count()
    }
}
