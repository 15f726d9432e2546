//! Articles: admin CRUD plus the cached public listings.

use chrono::Utc;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use super::keys::{ContentQuery, Listing};
use super::types::{Article, ArticleDraft};
use crate::backend::{decode_row, decode_rows, to_row, Filter, Select, TableBackend};
use crate::cache::CacheResult;
use crate::error::{Error, Result};
use crate::refresh::Refresher;
use crate::state::StatusHandle;

const ARTICLE_COLUMNS: &str = "
  id,
  article_name,
  article_text,
  article_image_url,
  article_featured,
  article_catagory_id,
  enable,
  created_at,
  updated_at,
  article_catagory (
    id,
    catagory_name
  )";

pub struct ArticleStore {
  backend: Arc<dyn TableBackend>,
  refresher: Refresher,
  articles: Mutex<Vec<Article>>,
  status: StatusHandle,
}

impl ArticleStore {
  pub fn new(backend: Arc<dyn TableBackend>, refresher: Refresher) -> Self {
    Self {
      backend,
      refresher,
      articles: Mutex::new(Vec::new()),
      status: StatusHandle::new(),
    }
  }

  pub fn articles(&self) -> Vec<Article> {
    self.articles.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  pub fn status(&self) -> &StatusHandle {
    &self.status
  }

  /// Every article, newest first.
  pub async fn fetch_articles(&self) -> Result<Vec<Article>> {
    self.status.track(self.load()).await
  }

  pub async fn fetch_article(&self, article_id: &str) -> Result<Article> {
    self
      .status
      .track(async {
        let select = Select::from("article")
          .columns(ARTICLE_COLUMNS)
          .eq("id", article_id);
        decode_row(self.backend.select_one(&select).await?)
      })
      .await
  }

  pub async fn create_article(&self, draft: &ArticleDraft) -> Result<Article> {
    let article = self
      .status
      .track(async {
        let row = self.backend.insert("article", to_row(draft)?).await?;
        let article: Article = decode_row(row)?;
        info!(target: "articles", id = %article.id, featured = article.article_featured, "created");
        Ok::<_, Error>(article)
      })
      .await?;

    self.reload_after_write().await;
    Ok(article)
  }

  pub async fn update_article(&self, article_id: &str, draft: &ArticleDraft) -> Result<()> {
    self
      .status
      .track(async {
        let mut patch = to_row(draft)?;
        patch.insert("updated_at".to_string(), Value::from(Utc::now().to_rfc3339()));
        self
          .backend
          .update("article", &[Filter::eq("id", article_id)], patch)
          .await?;
        info!(target: "articles", article_id, "updated");
        Ok::<_, Error>(())
      })
      .await?;

    self.reload_after_write().await;
    Ok(())
  }

  pub async fn delete_article(&self, article_id: &str) -> Result<()> {
    self
      .status
      .track(async {
        self
          .backend
          .delete("article", &[Filter::eq("id", article_id)])
          .await?;
        info!(target: "articles", article_id, "deleted");
        Ok::<_, Error>(())
      })
      .await?;

    self.reload_after_write().await;
    Ok(())
  }

  pub async fn featured(&self) -> Result<CacheResult<Vec<Article>>> {
    self.listing(ContentQuery::FeaturedArticles).await
  }

  /// Enabled articles that are not featured.
  pub async fn published(&self) -> Result<CacheResult<Vec<Article>>> {
    self.listing(ContentQuery::PublishedArticles).await
  }

  pub async fn by_category(&self, category_id: &str) -> Result<CacheResult<Vec<Article>>> {
    self
      .listing(ContentQuery::ArticlesByCategory {
        category_id: category_id.to_string(),
      })
      .await
  }

  async fn listing(&self, query: ContentQuery) -> Result<CacheResult<Vec<Article>>> {
    let mut select = Select::from("article")
      .columns(ARTICLE_COLUMNS)
      .eq("enable", true);
    select = match &query {
      ContentQuery::FeaturedArticles => select.eq("article_featured", true),
      ContentQuery::ArticlesByCategory { category_id } => select
        .eq("article_catagory_id", category_id.as_str())
        .eq("article_featured", false),
      _ => select.eq("article_featured", false),
    };
    let select = select.order("created_at", false);

    let key = query.cache_key();
    let max_age = self.refresher.cache().max_age();
    let result = self
      .status
      .track(self.refresher.get_or_refresh(&key, max_age, || async {
        let rows = self.backend.select(&select).await.inspect_err(|e| {
          error!(target: "articles", query = %query.description(), error = %e, "fetch failed")
        })?;
        Ok(Listing {
          items: decode_rows::<Article>(rows)?,
        })
      }))
      .await?;

    debug!(
      target: "articles",
      query = %query.description(),
      source = ?result.source,
      count = result.data.items.len(),
      "served"
    );
    Ok(result.map(|listing| listing.items))
  }

  /// Refetch the admin listing after a completed write. A failure is
  /// recorded on the status; the write's own result stands.
  async fn reload_after_write(&self) {
    if let Err(e) = self.fetch_articles().await {
      warn!(target: "articles", error = %e, "refetch after write failed");
    }
  }

  async fn load(&self) -> Result<Vec<Article>> {
    let select = Select::from("article")
      .columns(ARTICLE_COLUMNS)
      .order("created_at", false);
    let rows = self
      .backend
      .select(&select)
      .await
      .inspect_err(|e| error!(target: "articles", error = %e, "fetch failed"))?;

    let articles: Vec<Article> = decode_rows(rows)?;
    debug!(target: "articles", count = articles.len(), "fetched");
    *self.articles.lock().unwrap_or_else(|p| p.into_inner()) = articles.clone();
    Ok(articles)
  }
}
