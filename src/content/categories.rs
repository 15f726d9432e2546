//! Article categories (`article_catagory` table).

use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::keys::{ContentQuery, Listing};
use super::types::{Category, CategoryDraft};
use crate::backend::{decode_row, decode_rows, to_row, Filter, Select, TableBackend};
use crate::cache::CacheResult;
use crate::error::{Error, Result};
use crate::refresh::Refresher;
use crate::state::StatusHandle;

const TABLE: &str = "article_catagory";

/// A category row with just enough of its articles to decide visibility.
#[derive(Deserialize)]
struct CategoryWithArticles {
  #[serde(flatten)]
  category: Category,
  #[serde(default, rename = "article")]
  articles: Vec<ArticleFlags>,
}

#[derive(Deserialize)]
struct ArticleFlags {
  #[serde(default)]
  article_featured: bool,
  #[serde(default)]
  enable: bool,
}

pub struct CategoryStore {
  backend: Arc<dyn TableBackend>,
  refresher: Refresher,
  categories: Mutex<Vec<Category>>,
  status: StatusHandle,
}

impl CategoryStore {
  pub fn new(backend: Arc<dyn TableBackend>, refresher: Refresher) -> Self {
    Self {
      backend,
      refresher,
      categories: Mutex::new(Vec::new()),
      status: StatusHandle::new(),
    }
  }

  pub fn categories(&self) -> Vec<Category> {
    self.categories.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  pub fn status(&self) -> &StatusHandle {
    &self.status
  }

  /// Every category, by name.
  pub async fn fetch_categories(&self) -> Result<Vec<Category>> {
    self.status.track(self.load()).await
  }

  pub async fn fetch_category(&self, category_id: &str) -> Result<Category> {
    self
      .status
      .track(async {
        decode_row(
          self
            .backend
            .select_one(&Select::from(TABLE).eq("id", category_id))
            .await?,
        )
      })
      .await
  }

  pub async fn create_category(&self, draft: &CategoryDraft) -> Result<Category> {
    let category = self
      .status
      .track(async {
        let category: Category = decode_row(self.backend.insert(TABLE, to_row(draft)?).await?)?;
        info!(target: "categories", id = %category.id, name = %category.catagory_name, "created");
        Ok::<_, Error>(category)
      })
      .await?;

    self.reload_after_write().await;
    Ok(category)
  }

  pub async fn update_category(&self, category_id: &str, draft: &CategoryDraft) -> Result<()> {
    self
      .status
      .track(async {
        self
          .backend
          .update(TABLE, &[Filter::eq("id", category_id)], to_row(draft)?)
          .await?;
        info!(target: "categories", category_id, "updated");
        Ok::<_, Error>(())
      })
      .await?;

    self.reload_after_write().await;
    Ok(())
  }

  pub async fn delete_category(&self, category_id: &str) -> Result<()> {
    self
      .status
      .track(async {
        self
          .backend
          .delete(TABLE, &[Filter::eq("id", category_id)])
          .await?;
        info!(target: "categories", category_id, "deleted");
        Ok::<_, Error>(())
      })
      .await?;

    self.reload_after_write().await;
    Ok(())
  }

  /// Categories holding at least one enabled, non-featured article.
  pub async fn with_published_articles(&self) -> Result<CacheResult<Vec<Category>>> {
    let query = ContentQuery::Categories;
    let key = query.cache_key();
    let max_age = self.refresher.cache().max_age();

    let result = self
      .status
      .track(self.refresher.get_or_refresh(&key, max_age, || async {
        let select = Select::from(TABLE)
          .columns("id, catagory_name, article(id, article_featured, enable)")
          .order("catagory_name", true);
        let rows: Vec<CategoryWithArticles> = decode_rows(self.backend.select(&select).await?)?;
        let items = rows
          .into_iter()
          .filter(|row| row.articles.iter().any(|a| a.enable && !a.article_featured))
          .map(|row| row.category)
          .collect();
        Ok(Listing { items })
      }))
      .await?;

    debug!(target: "categories", query = %query.description(), source = ?result.source, "served");
    Ok(result.map(|listing| listing.items))
  }

  /// Refetch the admin listing after a completed write. A failure is
  /// recorded on the status; the write's own result stands.
  async fn reload_after_write(&self) {
    if let Err(e) = self.fetch_categories().await {
      warn!(target: "categories", error = %e, "refetch after write failed");
    }
  }

  async fn load(&self) -> Result<Vec<Category>> {
    let rows = self
      .backend
      .select(&Select::from(TABLE).order("catagory_name", true))
      .await?;
    let categories: Vec<Category> = decode_rows(rows)?;
    debug!(target: "categories", count = categories.len(), "fetched");
    *self.categories.lock().unwrap_or_else(|p| p.into_inner()) = categories.clone();
    Ok(categories)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::memory::MemoryBackend;
  use crate::cache::{ContentCache, MemoryStorage};
  use serde_json::json;

  fn store(backend: &Arc<MemoryBackend>) -> CategoryStore {
    let cache = ContentCache::new(Arc::new(MemoryStorage::new()));
    CategoryStore::new(backend.clone() as Arc<dyn TableBackend>, Refresher::new(cache))
  }

  #[tokio::test]
  async fn test_listing_ordered_by_name() {
    let backend = Arc::new(MemoryBackend::new());
    let store = store(&backend);
    for name in ["Reizen", "Natuur", "Koken"] {
      store
        .create_category(&CategoryDraft {
          catagory_name: name.to_string(),
        })
        .await
        .unwrap();
    }

    let names: Vec<String> = store
      .fetch_categories()
      .await
      .unwrap()
      .into_iter()
      .map(|c| c.catagory_name)
      .collect();
    assert_eq!(names, vec!["Koken", "Natuur", "Reizen"]);
  }

  #[tokio::test]
  async fn test_only_categories_with_published_articles() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed(
      TABLE,
      vec![
        json!({"id": 1, "catagory_name": "Natuur",
               "article": [{"id": 1, "article_featured": false, "enable": true}]}),
        json!({"id": 2, "catagory_name": "Leeg", "article": []}),
        json!({"id": 3, "catagory_name": "Uitgelicht",
               "article": [{"id": 2, "article_featured": true, "enable": true},
                           {"id": 3, "article_featured": false, "enable": false}]}),
      ],
    );

    let visible = store(&backend).with_published_articles().await.unwrap();
    assert_eq!(visible.data.len(), 1);
    assert_eq!(visible.data[0].catagory_name, "Natuur");
    assert_eq!(visible.data[0].id, "1");
  }

  #[tokio::test]
  async fn test_update_and_delete() {
    let backend = Arc::new(MemoryBackend::new());
    let store = store(&backend);
    let category = store
      .create_category(&CategoryDraft {
        catagory_name: "Natuur".to_string(),
      })
      .await
      .unwrap();

    store
      .update_category(
        &category.id,
        &CategoryDraft {
          catagory_name: "Buiten".to_string(),
        },
      )
      .await
      .unwrap();
    assert_eq!(store.fetch_category(&category.id).await.unwrap().catagory_name, "Buiten");

    store.delete_category(&category.id).await.unwrap();
    assert!(store.categories().is_empty());
  }
}
