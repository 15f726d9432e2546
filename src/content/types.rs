//! Rows of the publishing tables.
//!
//! Column names follow the database (including the `catagory` spelling).
//! Chapters and headers carry a `sort_order` rank; articles carry their
//! category relation.

use serde::{Deserialize, Deserializer, Serialize};

/// Accept ids stored either as integers or as text (uuid) columns.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Text(String),
    Number(i64),
  }

  Ok(match RawId::deserialize(deserializer)? {
    RawId::Text(s) => s,
    RawId::Number(n) => n.to_string(),
  })
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  struct Wrapper(#[serde(deserialize_with = "deserialize_id")] String);

  Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(id)| id))
}

/// Legacy rows may carry a null rank; treat it as unranked.
fn deserialize_rank<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
  D: Deserializer<'de>,
{
  Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}

fn default_true() -> bool {
  true
}

// ============================================================================
// Books
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub book_name: String,
  #[serde(default)]
  pub enable: bool,
  #[serde(default)]
  pub created_at: Option<String>,
  #[serde(default, rename = "book_image")]
  pub images: Vec<BookImage>,
  #[serde(default, rename = "book_header")]
  pub headers: Vec<BookHeader>,
  #[serde(default, rename = "chapter")]
  pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookImage {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub book_image_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookDraft {
  pub book_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookPatch {
  pub book_name: String,
  pub enable: bool,
}

// ============================================================================
// Chapters and headers (ranked within a book)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  /// Absent when embedded under its book
  #[serde(default, deserialize_with = "deserialize_optional_id")]
  pub book_id: Option<String>,
  pub chapter_name: String,
  #[serde(default)]
  pub chapter_text: Option<String>,
  #[serde(default = "default_true")]
  pub enable: bool,
  #[serde(default)]
  pub book_chapter_image_url: Option<String>,
  #[serde(default, deserialize_with = "deserialize_rank")]
  pub sort_order: i64,
  #[serde(default)]
  pub created_at: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
}

/// Fields a caller supplies when creating or editing a chapter.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterDraft {
  pub chapter_name: String,
  pub chapter_text: Option<String>,
  pub enable: bool,
  pub book_chapter_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookHeader {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  #[serde(default, deserialize_with = "deserialize_optional_id")]
  pub book_id: Option<String>,
  pub book_header_name: String,
  #[serde(default)]
  pub book_header_text: Option<String>,
  #[serde(default = "default_true")]
  pub enable: bool,
  #[serde(default)]
  pub book_header_image_url: Option<String>,
  #[serde(default, deserialize_with = "deserialize_rank")]
  pub sort_order: i64,
  #[serde(default)]
  pub created_at: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookHeaderDraft {
  pub book_header_name: String,
  pub book_header_text: Option<String>,
  pub enable: bool,
  pub book_header_image_url: Option<String>,
}

// ============================================================================
// Articles and categories
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub article_name: String,
  #[serde(default)]
  pub article_text: Option<String>,
  #[serde(default)]
  pub article_image_url: Option<String>,
  #[serde(default)]
  pub article_featured: bool,
  #[serde(default)]
  pub enable: bool,
  #[serde(default, deserialize_with = "deserialize_optional_id")]
  pub article_catagory_id: Option<String>,
  #[serde(default, rename = "article_catagory")]
  pub category: Option<Category>,
  #[serde(default)]
  pub created_at: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleDraft {
  pub article_name: String,
  pub article_text: Option<String>,
  pub article_image_url: Option<String>,
  pub article_featured: bool,
  pub enable: bool,
  pub article_catagory_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  #[serde(deserialize_with = "deserialize_id")]
  pub id: String,
  pub catagory_name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryDraft {
  pub catagory_name: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_numeric_and_text_ids() {
    let chapter: Chapter = serde_json::from_value(json!({
      "id": 12,
      "book_id": "7f1c",
      "chapter_name": "Een"
    }))
    .unwrap();
    assert_eq!(chapter.id, "12");
    assert_eq!(chapter.book_id.as_deref(), Some("7f1c"));
    assert!(chapter.enable);
    assert_eq!(chapter.sort_order, 0);
  }

  #[test]
  fn test_book_with_embedded_relations() {
    let book: Book = serde_json::from_value(json!({
      "id": 1,
      "book_name": "Reisverslag",
      "enable": true,
      "book_image": [{"id": 3, "book_image_url": "https://img/1.png"}],
      "book_header": [{"id": 4, "book_header_name": "Intro", "sort_order": 1}],
      "chapter": [{"id": 5, "chapter_name": "Vertrek", "sort_order": null, "book_id": null}]
    }))
    .unwrap();

    assert_eq!(book.images[0].book_image_url, "https://img/1.png");
    assert_eq!(book.headers[0].book_header_name, "Intro");
    assert_eq!(book.chapters[0].book_id, None);
    assert_eq!(book.chapters[0].sort_order, 0);
  }

  #[test]
  fn test_article_category_relation() {
    let article: Article = serde_json::from_value(json!({
      "id": "a1",
      "article_name": "Lente",
      "article_featured": false,
      "enable": true,
      "article_catagory_id": 2,
      "article_catagory": {"id": 2, "catagory_name": "Natuur"}
    }))
    .unwrap();

    assert_eq!(article.article_catagory_id.as_deref(), Some("2"));
    assert_eq!(article.category.unwrap().catagory_name, "Natuur");
  }
}
