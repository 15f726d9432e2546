use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Query key types
// ============================================================================

/// Public listings served through the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentQuery {
  /// Books readers may see, oldest first
  EnabledBooks,
  /// Enabled articles flagged as featured
  FeaturedArticles,
  /// Enabled articles not flagged as featured
  PublishedArticles,
  /// Enabled articles in one category
  ArticlesByCategory { category_id: String },
  /// Every category, by name
  Categories,
}

impl ContentQuery {
  /// Storage key: a readable prefix plus a stable hash of the query.
  pub fn cache_key(&self) -> String {
    let input = match self {
      Self::EnabledBooks => "books:enabled".to_string(),
      Self::FeaturedArticles => "articles:featured".to_string(),
      Self::PublishedArticles => "articles:published".to_string(),
      Self::ArticlesByCategory { category_id } => {
        format!("articles:category:{}", category_id.trim())
      }
      Self::Categories => "categories".to_string(),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("content_{}", hex::encode(hasher.finalize()))
  }

  pub fn description(&self) -> String {
    match self {
      Self::EnabledBooks => "enabled books".to_string(),
      Self::FeaturedArticles => "featured articles".to_string(),
      Self::PublishedArticles => "published articles".to_string(),
      Self::ArticlesByCategory { category_id } => format!("articles in category {}", category_id),
      Self::Categories => "article categories".to_string(),
    }
  }
}

/// Cached payloads must be objects, so lists are stored wrapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Listing<T> {
  pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_keys_are_stable_and_distinct() {
    let a = ContentQuery::ArticlesByCategory {
      category_id: "3".to_string(),
    };
    let b = ContentQuery::ArticlesByCategory {
      category_id: " 3 ".to_string(),
    };
    assert_eq!(a.cache_key(), b.cache_key());
    assert_ne!(a.cache_key(), ContentQuery::FeaturedArticles.cache_key());
    assert!(a.cache_key().starts_with("content_"));
    assert_eq!(a.cache_key().len(), "content_".len() + 64);
  }

  #[test]
  fn test_description() {
    assert_eq!(ContentQuery::Categories.description(), "article categories");
    assert_eq!(
      ContentQuery::ArticlesByCategory {
        category_id: "7".to_string()
      }
      .description(),
      "articles in category 7"
    );
  }
}
