//! Domain types for Notion content.

use serde::{Deserialize, Serialize};

/// A page linked from another page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRef {
  pub id: String,
  pub title: String,
  #[serde(rename = "type")]
  pub kind: String,
}

/// A run of text with its formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
  pub content: String,
  pub is_bold: bool,
  pub is_italic: bool,
  pub is_strikethrough: bool,
  pub is_underline: bool,
  pub is_code: bool,
  pub color: Option<String>,
}

/// A block the site knows how to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
  Paragraph { text: Vec<TextSpan> },
  #[serde(rename = "heading_1")]
  Heading1 { text: Vec<TextSpan> },
  #[serde(rename = "heading_2")]
  Heading2 { text: Vec<TextSpan> },
  #[serde(rename = "heading_3")]
  Heading3 { text: Vec<TextSpan> },
  Image { url: String, caption: String },
}

impl ContentBlock {
  /// No visible text, or an image without a URL.
  pub fn is_empty(&self) -> bool {
    match self {
      Self::Paragraph { text }
      | Self::Heading1 { text }
      | Self::Heading2 { text }
      | Self::Heading3 { text } => text.iter().all(|span| span.content.is_empty()),
      Self::Image { url, .. } => url.is_empty(),
    }
  }
}

/// A preface page and the blocks loaded so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrefacePage {
  pub title: String,
  pub blocks: Vec<ContentBlock>,
  pub has_more: bool,
  /// Where the next `load_more` continues
  pub start_cursor: Option<String>,
  /// The page's edit time when it was fetched
  pub edited_at: Option<String>,
}
