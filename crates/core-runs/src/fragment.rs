//! Externally produced text pieces that are folded back into runs.
//!
//! A clipboard sanitizer yields `StyledFragment`s; a rendering surface that
//! hands its content back yields `TaggedFragment`s. Both cover their text
//! contiguously in order.

use crate::link::LinkId;
use crate::style::CellStyle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyledFragment {
    pub text: String,
    #[serde(default)]
    pub style: CellStyle,
}

impl StyledFragment {
    pub fn new(text: impl Into<String>, style: CellStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, CellStyle::default())
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Link identity carried by a rendered span. `id` is absent for links the
/// surface created itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentLink {
    #[serde(default)]
    pub id: Option<LinkId>,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaggedFragment {
    pub text: String,
    #[serde(default)]
    pub style: CellStyle,
    #[serde(default)]
    pub link: Option<FragmentLink>,
}

impl TaggedFragment {
    pub fn plain(text: impl Into<String>, style: CellStyle) -> Self {
        Self {
            text: text.into(),
            style,
            link: None,
        }
    }

    pub fn linked(text: impl Into<String>, style: CellStyle, link: FragmentLink) -> Self {
        Self {
            text: text.into(),
            style,
            link: Some(link),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn as_styled(&self) -> StyledFragment {
        StyledFragment::new(self.text.clone(), self.style.clone())
    }
}
