//! Preface pages: title plus renderable blocks, loaded a page of blocks at a
//! time.
//!
//! The first page of blocks is cached per page id together with the page's
//! `last_edited_time`. A cached entry is refetched when it is older than the
//! max age, or when an edit newer than the cached one is already known.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

use super::api_types::ApiBlock;
use super::client::NotionClient;
use super::types::{ContentBlock, PrefacePage};
use crate::cache::CacheResult;
use crate::error::Result;
use crate::refresh::{Refresher, Versioned};
use crate::state::StatusHandle;

pub fn cache_key(page_id: &str) -> String {
  format!("notion_preface_{}", page_id)
}

pub struct NotionPreface {
  client: NotionClient,
  refresher: Refresher,
  /// Pages loaded so far, including blocks added by `load_more`
  pages: Mutex<HashMap<String, PrefacePage>>,
  status: StatusHandle,
}

impl NotionPreface {
  pub fn new(client: NotionClient, refresher: Refresher) -> Self {
    Self {
      client,
      refresher,
      pages: Mutex::new(HashMap::new()),
      status: StatusHandle::new(),
    }
  }

  pub fn status(&self) -> &StatusHandle {
    &self.status
  }

  pub fn page(&self, page_id: &str) -> Option<PrefacePage> {
    self
      .pages
      .lock()
      .unwrap_or_else(|p| p.into_inner())
      .get(page_id)
      .cloned()
  }

  /// Title and first page of blocks, from the cache while fresh.
  pub async fn fetch_preface(&self, page_id: &str) -> Result<CacheResult<PrefacePage>> {
    let key = cache_key(page_id);
    let known_edit = self.page(page_id).and_then(|p| p.edited_at);
    let max_age = self.refresher.cache().max_age();

    let result = self
      .status
      .track(self.refresher.get_or_refresh_versioned(
        &key,
        max_age,
        known_edit.as_deref(),
        || async {
          let page = self.client.retrieve_page(page_id).await?;
          let list = self.client.list_children(page_id, None).await?;
          let preface = PrefacePage {
            title: page.title(),
            blocks: renderable(list.results),
            has_more: list.has_more,
            start_cursor: list.next_cursor,
            edited_at: page.last_edited_time.clone(),
          };
          info!(
            target: "notion_preface",
            page_id,
            blocks = preface.blocks.len(),
            "fetched preface"
          );
          Ok(Versioned::new(preface, page.last_edited_time))
        },
      ))
      .await?;

    debug!(target: "notion_preface", page_id, source = ?result.source, "served");
    self.store(page_id, result.data.clone());
    Ok(result)
  }

  /// Next page of blocks after the stored cursor. Empty when everything is
  /// loaded. Not cached.
  pub async fn load_more(&self, page_id: &str) -> Result<Vec<ContentBlock>> {
    let Some(current) = self.page(page_id) else {
      return Ok(Vec::new());
    };
    let Some(cursor) = current.start_cursor.filter(|_| current.has_more) else {
      debug!(target: "notion_preface", page_id, "no more blocks");
      return Ok(Vec::new());
    };

    self
      .status
      .track(async {
        let list = self.client.list_children(page_id, Some(&cursor)).await?;
        let blocks = renderable(list.results);

        let mut pages = self.pages.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(page) = pages.get_mut(page_id) {
          page.blocks.extend(blocks.iter().cloned());
          page.has_more = list.has_more;
          page.start_cursor = list.next_cursor;
        }
        debug!(target: "notion_preface", page_id, added = blocks.len(), "loaded more blocks");
        Ok(blocks)
      })
      .await
  }

  /// Load every remaining page of blocks. A batch with nothing renderable in
  /// it doesn't end the loop; only the page's own `has_more` does.
  pub async fn load_remaining(&self, page_id: &str) -> Result<Option<PrefacePage>> {
    while self
      .page(page_id)
      .is_some_and(|page| page.has_more && page.start_cursor.is_some())
    {
      self.load_more(page_id).await?;
    }
    Ok(self.page(page_id))
  }

  fn store(&self, page_id: &str, page: PrefacePage) {
    self
      .pages
      .lock()
      .unwrap_or_else(|p| p.into_inner())
      .insert(page_id.to_string(), page);
  }
}

fn renderable(blocks: Vec<ApiBlock>) -> Vec<ContentBlock> {
  blocks.into_iter().filter_map(ApiBlock::into_content).collect()
}
