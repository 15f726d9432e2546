//! Article tree: the child pages of the main page, with the child pages of
//! each section ("Deel 1", "Deel 2", ...) nested under it.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, info};

use super::client::NotionClient;
use super::types::PageRef;
use crate::cache::CacheResult;
use crate::error::Result;
use crate::refresh::{fetch_tree, Branch, Refresher};
use crate::state::StatusHandle;

pub const TREE_CACHE_KEY: &str = "notion_articles_tree";
pub const DEFAULT_SECTION_PREFIX: &str = "deel";

pub type ArticleNode = Branch<PageRef, PageRef>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArticleTree {
  articles: Vec<ArticleNode>,
}

pub struct NotionArticles {
  client: NotionClient,
  refresher: Refresher,
  main_page_id: String,
  section_prefix: String,
  articles: Mutex<Vec<ArticleNode>>,
  status: StatusHandle,
}

impl NotionArticles {
  pub fn new(client: NotionClient, refresher: Refresher, main_page_id: impl Into<String>) -> Self {
    Self {
      client,
      refresher,
      main_page_id: main_page_id.into(),
      section_prefix: DEFAULT_SECTION_PREFIX.to_string(),
      articles: Mutex::new(Vec::new()),
      status: StatusHandle::new(),
    }
  }

  /// Titles starting with this prefix (case-insensitive) get their children fetched.
  pub fn with_section_prefix(mut self, prefix: &str) -> Self {
    self.section_prefix = prefix.to_lowercase();
    self
  }

  pub fn articles(&self) -> Vec<ArticleNode> {
    self.articles.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  pub fn status(&self) -> &StatusHandle {
    &self.status
  }

  /// The tree, from the cache while fresh.
  ///
  /// A section whose children can't be fetched keeps an empty child list;
  /// only a failure to list the main page fails the call.
  pub async fn fetch_articles(&self) -> Result<CacheResult<Vec<ArticleNode>>> {
    let max_age = self.refresher.cache().max_age();
    let result = self
      .status
      .track(self.refresher.get_or_refresh(TREE_CACHE_KEY, max_age, || async {
        let articles = fetch_tree(
          self.client.child_pages(&self.main_page_id),
          |page: &PageRef| page.title.to_lowercase().starts_with(&self.section_prefix),
          |page: &PageRef| {
            let (client, id) = (&self.client, page.id.clone());
            async move { client.child_pages(&id).await }
          },
        )
        .await?;
        info!(target: "notion_articles", count = articles.len(), "fetched article tree");
        Ok(ArticleTree { articles })
      }))
      .await?;

    debug!(target: "notion_articles", source = ?result.source, "served");
    let result = result.map(|tree| tree.articles);
    *self.articles.lock().unwrap_or_else(|p| p.into_inner()) = result.data.clone();
    Ok(result)
  }
}
