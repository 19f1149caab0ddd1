//! Implicit link recognition for word-bounded text.
//!
//! The word immediately preceding the caret is matched against a
//! scheme-optional `host[.tld][:port][/path]` pattern anchored at the word
//! start (after any opening punctuation). Sentence punctuation trailing the
//! match is trimmed. A candidate is accepted only when it also parses as an
//! `http`/`https` URL with a host; bare hosts are parsed with an `http://`
//! prefix but the returned reference is the text exactly as typed.

use crate::{TextBuffer, grapheme};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use tracing::trace;
use url::Url;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?i)(?:",
        r"https?://[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*",
        r"|(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,63}",
        r")(?::\d{1,5})?(?:[/?#]\S*)?",
    ))
    .expect("url pattern compiles")
});

/// A recognized link inside a buffer, in char offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitLink {
    pub range: Range<usize>,
    pub reference: String,
}

/// Match a single whitespace-free word. The returned range is relative to
/// the word, in chars.
pub fn find_url(word: &str, require_scheme: bool) -> Option<ImplicitLink> {
    let lead = word
        .char_indices()
        .find(|(_, c)| !matches!(c, '(' | '[' | '<' | '"' | '\''))
        .map(|(i, _)| i)?;
    let candidate = &word[lead..];
    let m = URL_PATTERN.find(candidate)?;
    let (matched, _) = strip_trailing_punctuation(m.as_str());
    if matched.is_empty() {
        return None;
    }
    let has_scheme = has_http_scheme(matched);
    if require_scheme && !has_scheme {
        return None;
    }
    if !is_web_url(matched, has_scheme) {
        trace!(target: "text.linkify", len = matched.len(), "candidate_rejected_by_url_parse");
        return None;
    }
    let start = grapheme::byte_to_char(word, lead);
    let end = start + matched.chars().count();
    Some(ImplicitLink {
        range: start..end,
        reference: matched.to_string(),
    })
}

/// Scan the word ending at `caret` (never left of `floor`) for a link.
pub fn detect_before_caret(
    text: &TextBuffer,
    caret: usize,
    floor: usize,
    require_scheme: bool,
) -> Option<ImplicitLink> {
    let word_start = text.word_start_before(caret, floor);
    if word_start == caret {
        return None;
    }
    let word = text.slice(word_start..caret);
    let found = find_url(&word, require_scheme)?;
    Some(ImplicitLink {
        range: found.range.start + word_start..found.range.end + word_start,
        reference: found.reference,
    })
}

fn has_http_scheme(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_web_url(candidate: &str, has_scheme: bool) -> bool {
    let parsed = if has_scheme {
        Url::parse(candidate)
    } else {
        Url::parse(&format!("http://{candidate}"))
    };
    match parsed {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

fn strip_trailing_punctuation(s: &str) -> (&str, &str) {
    let trimmed = s.trim_end_matches(|c: char| {
        matches!(c, '.' | ',' | '?' | '!' | ':' | ';' | ')' | ']' | '>' | '\'' | '"')
    });
    s.split_at(trimmed.len())
}
