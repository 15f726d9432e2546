//! Serde-deserializable types matching Notion API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on what the site renders.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::types::{ContentBlock, PageRef, TextSpan};

// ============================================================================
// Blocks
// ============================================================================

/// One page of `GET /blocks/{id}/children`.
#[derive(Debug, Deserialize)]
pub struct ApiBlockList {
  #[serde(default)]
  pub results: Vec<ApiBlock>,
  #[serde(default)]
  pub has_more: bool,
  #[serde(default)]
  pub next_cursor: Option<String>,
}

/// A block. Its payload sits under a key named after its type.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiBlock {
  pub id: String,
  #[serde(rename = "type")]
  pub block_type: String,
  #[serde(flatten)]
  pub payload: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ApiChildPage {
  #[serde(default)]
  title: String,
}

#[derive(Debug, Deserialize)]
struct ApiTextBlock {
  #[serde(default)]
  rich_text: Vec<ApiRichText>,
}

#[derive(Debug, Deserialize)]
struct ApiRichText {
  #[serde(default)]
  plain_text: String,
  #[serde(default)]
  annotations: ApiAnnotations,
}

#[derive(Debug, Default, Deserialize)]
struct ApiAnnotations {
  #[serde(default)]
  bold: bool,
  #[serde(default)]
  italic: bool,
  #[serde(default)]
  strikethrough: bool,
  #[serde(default)]
  underline: bool,
  #[serde(default)]
  code: bool,
  #[serde(default)]
  color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiFileRef {
  #[serde(default)]
  url: String,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
  file: Option<ApiFileRef>,
  external: Option<ApiFileRef>,
  #[serde(default)]
  caption: Vec<ApiRichText>,
}

impl ApiBlock {
  fn payload<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
    let value = self.payload.get(&self.block_type)?;
    serde_json::from_value(value.clone()).ok()
  }

  /// The page this block links to, when it is a `child_page` block.
  pub fn into_child_page(self) -> Option<PageRef> {
    if self.block_type != "child_page" {
      return None;
    }
    let child: ApiChildPage = self.payload()?;
    Some(PageRef {
      id: self.id,
      title: child.title,
      kind: self.block_type,
    })
  }

  /// Renderable content, if this is a paragraph, heading or image block
  /// with something in it.
  pub fn into_content(self) -> Option<ContentBlock> {
    let block = match self.block_type.as_str() {
      "paragraph" | "heading_1" | "heading_2" | "heading_3" => {
        let text: ApiTextBlock = self.payload()?;
        let spans = text.rich_text.into_iter().map(ApiRichText::into_span).collect();
        match self.block_type.as_str() {
          "paragraph" => ContentBlock::Paragraph { text: spans },
          "heading_1" => ContentBlock::Heading1 { text: spans },
          "heading_2" => ContentBlock::Heading2 { text: spans },
          _ => ContentBlock::Heading3 { text: spans },
        }
      }
      "image" => {
        let image: ApiImage = self.payload()?;
        let url = image
          .file
          .or(image.external)
          .map(|f| f.url)
          .unwrap_or_default();
        let caption = image.caption.into_iter().map(|c| c.plain_text).collect();
        ContentBlock::Image { url, caption }
      }
      _ => return None,
    };

    (!block.is_empty()).then_some(block)
  }
}

impl ApiRichText {
  fn into_span(self) -> TextSpan {
    TextSpan {
      content: self.plain_text,
      is_bold: self.annotations.bold,
      is_italic: self.annotations.italic,
      is_strikethrough: self.annotations.strikethrough,
      is_underline: self.annotations.underline,
      is_code: self.annotations.code,
      color: self.annotations.color,
    }
  }
}

// ============================================================================
// Pages
// ============================================================================

/// `GET /pages/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPage {
  pub id: String,
  #[serde(default)]
  pub last_edited_time: Option<String>,
  #[serde(default)]
  pub properties: HashMap<String, Value>,
}

impl ApiPage {
  /// Plain text of the first run of the `title` property.
  pub fn title(&self) -> String {
    self
      .properties
      .get("title")
      .and_then(|p| p.get("title"))
      .and_then(|runs| runs.get(0))
      .and_then(|run| run.get("plain_text"))
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn block(value: Value) -> ApiBlock {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_child_page() {
    let page = block(json!({
      "id": "p1",
      "type": "child_page",
      "child_page": {"title": "Deel 1"}
    }))
    .into_child_page()
    .unwrap();
    assert_eq!(page.title, "Deel 1");
    assert_eq!(page.kind, "child_page");

    let paragraph = block(json!({"id": "b1", "type": "paragraph", "paragraph": {"rich_text": []}}));
    assert!(paragraph.into_child_page().is_none());
  }

  #[test]
  fn test_paragraph_annotations() {
    let content = block(json!({
      "id": "b1",
      "type": "paragraph",
      "paragraph": {"rich_text": [
        {"plain_text": "Hallo ", "annotations": {
          "bold": true, "italic": false, "strikethrough": false,
          "underline": false, "code": false, "color": "default"}},
        {"plain_text": "wereld", "annotations": {
          "bold": false, "italic": true, "strikethrough": false,
          "underline": false, "code": false, "color": "red"}}
      ]}
    }))
    .into_content()
    .unwrap();

    match content {
      ContentBlock::Paragraph { text } => {
        assert_eq!(text.len(), 2);
        assert!(text[0].is_bold);
        assert!(text[1].is_italic);
        assert_eq!(text[1].color.as_deref(), Some("red"));
      }
      other => panic!("unexpected block: {other:?}"),
    }
  }

  #[test]
  fn test_image_prefers_file_url_and_joins_caption() {
    let content = block(json!({
      "id": "i1",
      "type": "image",
      "image": {
        "file": {"url": "https://files/a.png"},
        "caption": [{"plain_text": "Een "}, {"plain_text": "foto"}]
      }
    }))
    .into_content()
    .unwrap();
    assert_eq!(
      content,
      ContentBlock::Image {
        url: "https://files/a.png".to_string(),
        caption: "Een foto".to_string()
      }
    );

    let external = block(json!({
      "id": "i2",
      "type": "image",
      "image": {"external": {"url": "https://cdn/b.jpg"}}
    }))
    .into_content();
    assert!(matches!(
      external,
      Some(ContentBlock::Image { url, .. }) if url == "https://cdn/b.jpg"
    ));
  }

  #[test]
  fn test_empty_and_unsupported_blocks_dropped() {
    let empty_heading = json!({
      "id": "b",
      "type": "heading_2",
      "heading_2": {"rich_text": [{"plain_text": ""}]}
    });
    assert!(block(empty_heading)
      .into_content()
      .is_none());
    assert!(block(json!({"id": "i", "type": "image", "image": {}}))
      .into_content()
      .is_none());
    assert!(block(json!({"id": "d", "type": "divider", "divider": {}}))
      .into_content()
      .is_none());
  }

  #[test]
  fn test_page_title() {
    let page: ApiPage = serde_json::from_value(json!({
      "id": "p",
      "last_edited_time": "2024-05-01T10:00:00.000Z",
      "properties": {"title": {"title": [{"plain_text": "Voorwoord"}]}}
    }))
    .unwrap();
    assert_eq!(page.title(), "Voorwoord");

    let untitled: ApiPage = serde_json::from_value(json!({"id": "p", "properties": {}})).unwrap();
    assert_eq!(untitled.title(), "");
  }
}
