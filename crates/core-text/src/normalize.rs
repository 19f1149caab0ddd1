//! Normalization applied to externally supplied text (paste payloads,
//! sanitizer output) before it enters a `TextBuffer`.
//!
//! Contract:
//! - Output is NFC so equal-looking input yields equal offsets.
//! - CRLF and solitary CR become LF; cell text carries a single line-break form.
//! - Does not log content.

use unicode_normalization::UnicodeNormalization;

/// NFC-normalize `input` and fold line endings to `\n`.
pub fn normalize_input(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.nfc().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_combining_sequences() {
        let decomposed = "e\u{0301}";
        assert_eq!(normalize_input(decomposed), "\u{00E9}");
    }

    #[test]
    fn folds_line_endings() {
        assert_eq!(normalize_input("a\r\nb\rc\nd"), "a\nb\nc\nd");
    }

    #[test]
    fn plain_ascii_untouched() {
        assert_eq!(normalize_input("plain text"), "plain text");
    }
}
