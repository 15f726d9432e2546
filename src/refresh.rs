//! Decides per request whether to serve cached data or fetch fresh data.
//!
//! 1. Check cache - if fresh, return immediately
//! 2. If stale or missing, run the fetcher (bounded by an optional timeout)
//! 3. On success, write the cache and return the fresh data
//! 4. On failure, surface the error and leave the cached entry untouched
//!
//! A fetch that is overtaken by a newer fetch for the same key is not
//! written to the cache, so a slow old response can't replace a newer one.

use chrono::Duration;
use futures::future::join_all;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use crate::cache::{CacheResult, ContentCache};
use crate::error::{Error, Result};

/// Fetched data plus the remote version marker it was fetched at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
  pub data: T,
  pub version: Option<String>,
}

impl<T> Versioned<T> {
  pub fn new(data: T, version: Option<String>) -> Self {
    Self { data, version }
  }
}

/// Cache-or-fetch orchestrator.
#[derive(Clone)]
pub struct Refresher {
  cache: ContentCache,
  /// Latest request ticket per key
  generations: Arc<Mutex<HashMap<String, u64>>>,
  timeout: Option<std::time::Duration>,
}

impl Refresher {
  pub fn new(cache: ContentCache) -> Self {
    Self {
      cache,
      generations: Arc::new(Mutex::new(HashMap::new())),
      timeout: None,
    }
  }

  /// Bound every fetch by `timeout`.
  pub fn with_timeout(mut self, timeout: Option<std::time::Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn cache(&self) -> &ContentCache {
    &self.cache
  }

  /// Serve `key` from the cache when younger than `max_age`, else fetch it.
  pub async fn get_or_refresh<T, F, Fut>(
    &self,
    key: &str,
    max_age: Duration,
    fetcher: F,
  ) -> Result<CacheResult<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    self
      .get_or_refresh_versioned(key, max_age, None, move || async move {
        fetcher().await.map(|data| Versioned::new(data, None))
      })
      .await
  }

  /// Like [`Self::get_or_refresh`], also refetching when `known_version` is
  /// newer than the version stored with the entry. The fetcher reports the
  /// version of what it fetched, which is stored alongside it.
  pub async fn get_or_refresh_versioned<T, F, Fut>(
    &self,
    key: &str,
    max_age: Duration,
    known_version: Option<&str>,
    fetcher: F,
  ) -> Result<CacheResult<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Versioned<T>>>,
  {
    if !self.cache.is_stale_against(key, max_age, known_version) {
      if let Some(entry) = self.cache.read::<T>(key) {
        debug!(target: "refresh", key, stored_at = %entry.stored_at, "serving cached data");
        return Ok(CacheResult::from_cache(entry.payload, entry.stored_at));
      }
    }

    let ticket = self.next_ticket(key);
    debug!(target: "refresh", key, ticket, "cache stale or missing, fetching");

    let fetched = match self.timeout {
      Some(limit) => tokio::time::timeout(limit, fetcher())
        .await
        .map_err(|_| Error::Timeout(limit))??,
      None => fetcher().await?,
    };

    if !self.is_latest(key, ticket) {
      warn!(target: "refresh", key, ticket, "discarding response overtaken by a newer request");
      return Err(Error::Superseded(key.to_string()));
    }

    if let Err(e) = self
      .cache
      .write(key, &fetched.data, fetched.version.as_deref())
    {
      warn!(target: "refresh", key, error = %e, "failed to persist fresh data");
    }

    Ok(CacheResult::from_network(fetched.data))
  }

  fn next_ticket(&self, key: &str) -> u64 {
    let mut generations = self.generations.lock().unwrap_or_else(|p| p.into_inner());
    let ticket = generations.entry(key.to_string()).or_insert(0);
    *ticket += 1;
    *ticket
  }

  fn is_latest(&self, key: &str, ticket: u64) -> bool {
    self
      .generations
      .lock()
      .unwrap_or_else(|p| p.into_inner())
      .get(key)
      .is_some_and(|latest| *latest == ticket)
  }
}

/// A parent entry and, when it qualified for a child fetch, its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch<P, C> {
  #[serde(flatten)]
  pub node: P,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub children: Option<Vec<C>>,
}

/// Fetch a parent collection, then children for each parent accepted by
/// `wants_children`.
///
/// A failing parent fetch fails the whole operation. A failing child fetch
/// is logged and that parent gets an empty child list.
pub async fn fetch_tree<P, C, PFut, Pred, F, CFut>(
  parents: PFut,
  wants_children: Pred,
  fetch_children: F,
) -> Result<Vec<Branch<P, C>>>
where
  PFut: Future<Output = Result<Vec<P>>>,
  Pred: Fn(&P) -> bool,
  F: Fn(&P) -> CFut,
  CFut: Future<Output = Result<Vec<C>>>,
{
  let parents = parents.await?;

  let branches = parents.into_iter().enumerate().map(|(position, node)| {
    let wants_children = &wants_children;
    let fetch_children = &fetch_children;
    async move {
      if !wants_children(&node) {
        return Branch {
          node,
          children: None,
        };
      }

      let children = match fetch_children(&node).await {
        Ok(children) => children,
        Err(e) => {
          warn!(
            target: "refresh",
            position,
            error = %e,
            "child fetch failed, continuing without children"
          );
          Vec::new()
        }
      };
      Branch {
        node,
        children: Some(children),
      }
    }
  });

  Ok(join_all(branches).await)
}

/// Serializes operations that share a key (e.g. a parent id).
#[derive(Clone, Default)]
pub struct KeyedQueue {
  locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl KeyedQueue {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wait for every earlier holder of `key`; the turn lasts until the guard drops.
  pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
    let lock = {
      let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
      Arc::clone(locks.entry(key.to_string()).or_default())
    };
    lock.lock_owned().await
  }
}
