//! Core types for the caching system.

use chrono::{DateTime, Utc};
use serde::Serialize;
#[cfg(test)]
use std::sync::Mutex;

/// Source of "now" for staleness checks.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self {
      now: Mutex::new(start),
    }
  }

  pub fn advance(&self, by: chrono::Duration) {
    let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
    *now += by;
  }

  pub fn set(&self, to: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(|p| p.into_inner()) = to;
  }
}

#[cfg(test)]
impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|p| p.into_inner())
  }
}

/// A cached payload together with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  pub key: String,
  pub payload: T,
  /// When the entry was written (not the data's own timestamp)
  pub stored_at: DateTime<Utc>,
  /// Opaque remote marker, e.g. a page's `last_edited_time`
  pub remote_version: Option<String>,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone, Serialize)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      cached_at: self.cached_at,
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still within its max age
  Cache,
}

/// Whether `remote` is strictly newer than `stored`.
///
/// Both markers are ISO-8601 timestamps; if either one does not parse the
/// versions are treated as incomparable and this returns false.
pub fn is_newer_version(remote: &str, stored: &str) -> bool {
  match (
    DateTime::parse_from_rfc3339(remote),
    DateTime::parse_from_rfc3339(stored),
  ) {
    (Ok(remote), Ok(stored)) => remote > stored,
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_newer_version() {
    assert!(is_newer_version(
      "2024-05-02T10:00:00.000Z",
      "2024-05-01T10:00:00.000Z"
    ));
    assert!(!is_newer_version(
      "2024-05-01T10:00:00.000Z",
      "2024-05-01T10:00:00.000Z"
    ));
    assert!(!is_newer_version(
      "2024-04-30T10:00:00Z",
      "2024-05-01T10:00:00Z"
    ));
  }

  #[test]
  fn test_unparsable_versions_are_not_newer() {
    assert!(!is_newer_version("yesterday", "2024-05-01T10:00:00Z"));
    assert!(!is_newer_version("2024-05-01T10:00:00Z", "v2"));
  }

  #[test]
  fn test_manual_clock_advances() {
    let start = Utc::now();
    let clock = ManualClock::new(start);
    clock.advance(chrono::Duration::minutes(5));
    assert_eq!(clock.now() - start, chrono::Duration::minutes(5));
  }
}
