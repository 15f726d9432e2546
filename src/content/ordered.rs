//! Items ranked within a parent (chapters and headers within a book).
//!
//! Ranks are assigned by the collection: `append` takes the current maximum
//! for the parent plus one, `reorder` rewrites the whole list to `1..=N` in
//! the order given. Writes for one parent go through a per-parent queue, so
//! an append can't read a max rank in the middle of another caller's reorder.
//! Every write is followed by a full refetch of that parent.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::backend::{decode_row, decode_rows, to_row, Filter, Select, TableBackend};
use crate::error::{Error, Result};
use crate::refresh::KeyedQueue;
use crate::state::StatusHandle;

/// A row that lives in a ranked, parent-scoped table.
pub trait OrderedItem: Clone + Send + Sync + DeserializeOwned + 'static {
  /// Caller-supplied fields for inserts and edits
  type Draft: Serialize + Send + Sync;

  const TABLE: &'static str;
  const PARENT_COLUMN: &'static str;
  const RANK_COLUMN: &'static str = "sort_order";
  /// Projection used for reads
  const COLUMNS: &'static str = "*";

  fn id(&self) -> &str;
  fn rank(&self) -> i64;
}

/// Store for one ranked table. Holds the items of the parent fetched last.
pub struct OrderedCollection<T: OrderedItem> {
  backend: Arc<dyn TableBackend>,
  items: Mutex<Vec<T>>,
  status: StatusHandle,
  queue: KeyedQueue,
}

impl<T: OrderedItem> OrderedCollection<T> {
  pub fn new(backend: Arc<dyn TableBackend>) -> Self {
    Self {
      backend,
      items: Mutex::new(Vec::new()),
      status: StatusHandle::new(),
      queue: KeyedQueue::new(),
    }
  }

  /// Items of the most recently fetched parent, in rank order.
  pub fn items(&self) -> Vec<T> {
    self.items.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  pub fn status(&self) -> &StatusHandle {
    &self.status
  }

  /// Fetch the items of `parent_id` ordered by rank. Without a parent there
  /// is nothing to fetch and the result is empty.
  pub async fn fetch_ordered(&self, parent_id: Option<&str>) -> Result<Vec<T>> {
    self.status.track(self.load(parent_id)).await
  }

  pub async fn fetch_one(&self, item_id: &str) -> Result<T> {
    self
      .status
      .track(async {
        let row = self
          .backend
          .select_one(&Select::from(T::TABLE).columns(T::COLUMNS).eq("id", item_id))
          .await?;
        decode_row(row)
      })
      .await
  }

  /// Insert `draft` under `parent_id` at the end of the list.
  ///
  /// The inserted item is returned even if the refetch that follows fails;
  /// that failure only shows up on [`Self::status`].
  pub async fn append(&self, parent_id: &str, draft: &T::Draft) -> Result<T> {
    let _turn = self.queue.acquire(parent_id).await;

    let inserted = self
      .status
      .track(async {
        let rank = self.next_rank(parent_id).await?;
        let mut row = to_row(draft)?;
        row.insert(T::PARENT_COLUMN.to_string(), Value::from(parent_id));
        row.insert(T::RANK_COLUMN.to_string(), Value::from(rank));

        let row = self.backend.insert(T::TABLE, row).await.inspect_err(|e| {
          error!(target: "ordered", table = T::TABLE, parent_id, error = %e, "insert failed")
        })?;
        let inserted: T = decode_row(row)?;
        info!(
          target: "ordered",
          table = T::TABLE,
          parent_id,
          id = inserted.id(),
          rank,
          "appended"
        );
        Ok::<T, Error>(inserted)
      })
      .await?;

    self.reload_after_write(parent_id).await;
    Ok(inserted)
  }

  /// Rewrite ranks so that `ordered_ids[i]` gets rank `i + 1`.
  ///
  /// Updates are issued one at a time in list order. Each is scoped to
  /// `parent_id`, so ids belonging to another parent are left alone.
  pub async fn reorder(&self, parent_id: &str, ordered_ids: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    if let Some(dup) = ordered_ids.iter().find(|id| !seen.insert(id.as_str())) {
      return Err(Error::validation(format!("duplicate id in reorder: {}", dup)));
    }

    let _turn = self.queue.acquire(parent_id).await;

    self
      .status
      .track(async {
        for (position, id) in ordered_ids.iter().enumerate() {
          let rank = position as i64 + 1;
          let mut patch = serde_json::Map::new();
          patch.insert(T::RANK_COLUMN.to_string(), Value::from(rank));

          let scope = [
            Filter::eq("id", id.as_str()),
            Filter::eq(T::PARENT_COLUMN, parent_id),
          ];
          self
            .backend
            .update(T::TABLE, &scope, patch)
            .await
            .inspect_err(|e| {
              error!(
                target: "ordered",
                table = T::TABLE,
                parent_id,
                id = %id,
                rank,
                error = %e,
                "rank update failed"
              )
            })?;
          debug!(target: "ordered", table = T::TABLE, id = %id, rank, "rank updated");
        }

        info!(
          target: "ordered",
          table = T::TABLE,
          parent_id,
          count = ordered_ids.len(),
          "reordered"
        );
        Ok::<_, Error>(())
      })
      .await?;

    self.reload_after_write(parent_id).await;
    Ok(())
  }

  /// Replace the editable fields of one item; its rank is untouched.
  pub async fn update(&self, parent_id: &str, item_id: &str, draft: &T::Draft) -> Result<()> {
    let _turn = self.queue.acquire(parent_id).await;

    self
      .status
      .track(async {
        let mut patch = to_row(draft)?;
        patch.insert("updated_at".to_string(), Value::from(Utc::now().to_rfc3339()));
        self
          .backend
          .update(T::TABLE, &[Filter::eq("id", item_id)], patch)
          .await?;
        info!(target: "ordered", table = T::TABLE, id = item_id, "updated");
        Ok::<_, Error>(())
      })
      .await?;

    self.reload_after_write(parent_id).await;
    Ok(())
  }

  /// Delete one item. Remaining ranks keep their gaps until the next reorder.
  pub async fn remove(&self, parent_id: &str, item_id: &str) -> Result<()> {
    let _turn = self.queue.acquire(parent_id).await;

    self
      .status
      .track(async {
        self
          .backend
          .delete(T::TABLE, &[Filter::eq("id", item_id)])
          .await?;
        info!(target: "ordered", table = T::TABLE, id = item_id, "removed");
        Ok::<_, Error>(())
      })
      .await?;

    self.reload_after_write(parent_id).await;
    Ok(())
  }

  /// Refetch after a completed write. A failure here is recorded on the
  /// status but does not undo the write's result.
  async fn reload_after_write(&self, parent_id: &str) {
    if let Err(e) = self.fetch_ordered(Some(parent_id)).await {
      warn!(
        target: "ordered",
        table = T::TABLE,
        parent_id,
        error = %e,
        "refetch after write failed"
      );
    }
  }

  async fn load(&self, parent_id: Option<&str>) -> Result<Vec<T>> {
    let Some(parent_id) = parent_id.filter(|id| !id.is_empty()) else {
      debug!(target: "ordered", table = T::TABLE, "no parent id, nothing to fetch");
      self.set_items(Vec::new());
      return Ok(Vec::new());
    };

    let query = Select::from(T::TABLE)
      .columns(T::COLUMNS)
      .eq(T::PARENT_COLUMN, parent_id)
      .order(T::RANK_COLUMN, true);
    let rows = self.backend.select(&query).await.inspect_err(|e| {
      error!(target: "ordered", table = T::TABLE, parent_id, error = %e, "fetch failed")
    })?;

    let items: Vec<T> = decode_rows(rows)?;
    debug!(target: "ordered", table = T::TABLE, parent_id, count = items.len(), "fetched");
    self.set_items(items.clone());
    Ok(items)
  }

  /// Highest rank under `parent_id` plus one; an empty parent starts at 1.
  async fn next_rank(&self, parent_id: &str) -> Result<i64> {
    let query = Select::from(T::TABLE)
      .columns(T::RANK_COLUMN)
      .eq(T::PARENT_COLUMN, parent_id)
      .order_nulls_last(T::RANK_COLUMN, false)
      .limit(1);
    let rows = self.backend.select(&query).await?;

    let max = rows
      .first()
      .and_then(|row| row.get(T::RANK_COLUMN))
      .and_then(Value::as_i64)
      .unwrap_or(0)
      .max(0);
    Ok(max + 1)
  }

  fn set_items(&self, items: Vec<T>) {
    *self.items.lock().unwrap_or_else(|p| p.into_inner()) = items;
  }
}
