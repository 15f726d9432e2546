//! Time-boxed JSON cache on top of a [`KvStorage`].

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::storage::KvStorage;
use super::traits::{is_newer_version, CacheEntry, Clock, SystemClock};
use crate::error::{Error, Result};

/// Field holding the write time, in epoch milliseconds.
const TIMESTAMP_FIELD: &str = "timestamp";
/// Field holding the remote version marker.
const VERSION_FIELD: &str = "last_edited_time";

/// Persistent cache of JSON blobs keyed by resource id.
///
/// Entries are stored flat: the payload's own fields plus `timestamp` and an
/// optional `last_edited_time`. Payloads must therefore serialize to a JSON
/// object and must not use those two field names.
#[derive(Clone)]
pub struct ContentCache {
  storage: Arc<dyn KvStorage>,
  clock: Arc<dyn Clock>,
  /// Max age used when callers don't pass one
  max_age: Duration,
}

impl ContentCache {
  pub fn new(storage: Arc<dyn KvStorage>) -> Self {
    Self {
      storage,
      clock: Arc::new(SystemClock),
      max_age: Duration::hours(1),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_max_age(mut self, max_age: Duration) -> Self {
    self.max_age = max_age;
    self
  }

  pub fn max_age(&self) -> Duration {
    self.max_age
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }

  /// The underlying storage, shared with non-cache users such as the session record.
  pub fn storage(&self) -> &Arc<dyn KvStorage> {
    &self.storage
  }

  /// Read an entry. Missing, unreadable and malformed entries are all `None`.
  pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
    let mut fields = self.read_fields(key)?;
    let (stored_at, remote_version) = take_meta(&mut fields)?;

    match serde_json::from_value::<T>(Value::Object(fields)) {
      Ok(payload) => Some(CacheEntry {
        key: key.to_string(),
        payload,
        stored_at,
        remote_version,
      }),
      Err(e) => {
        debug!(target: "cache", key, error = %e, "cached payload has unexpected shape");
        None
      }
    }
  }

  /// Serialize and persist `payload`, stamped with the current time.
  pub fn write<T: Serialize>(
    &self,
    key: &str,
    payload: &T,
    remote_version: Option<&str>,
  ) -> Result<()> {
    let mut fields = match serde_json::to_value(payload)? {
      Value::Object(map) => map,
      other => {
        return Err(Error::Cache(format!(
          "payload for '{}' must be a JSON object, got {}",
          key,
          json_kind(&other)
        )))
      }
    };

    fields.insert(
      TIMESTAMP_FIELD.to_string(),
      Value::from(self.clock.now().timestamp_millis()),
    );
    match remote_version {
      Some(version) => {
        fields.insert(VERSION_FIELD.to_string(), Value::from(version));
      }
      None => {
        fields.remove(VERSION_FIELD);
      }
    }

    let text = serde_json::to_string(&Value::Object(fields))?;
    self.storage.set(key, &text)?;
    debug!(target: "cache", key, bytes = text.len(), "cache entry written");
    Ok(())
  }

  /// Stale when absent or when at least `max_age` has passed since the write.
  pub fn is_stale(&self, key: &str, max_age: Duration) -> bool {
    self.is_stale_against(key, max_age, None)
  }

  /// Like [`Self::is_stale`], and also stale when both sides carry a version
  /// and `remote_version` is strictly newer than the stored one.
  pub fn is_stale_against(
    &self,
    key: &str,
    max_age: Duration,
    remote_version: Option<&str>,
  ) -> bool {
    let Some(mut fields) = self.read_fields(key) else {
      return true;
    };
    let Some((stored_at, stored_version)) = take_meta(&mut fields) else {
      return true;
    };

    if self.clock.now() - stored_at >= max_age {
      return true;
    }

    match (remote_version, stored_version.as_deref()) {
      (Some(remote), Some(stored)) => is_newer_version(remote, stored),
      _ => false,
    }
  }

  fn read_fields(&self, key: &str) -> Option<Map<String, Value>> {
    let raw = match self.storage.get(key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        debug!(target: "cache", key, error = %e, "cache read failed, treating as miss");
        return None;
      }
    };

    match serde_json::from_str::<Value>(&raw) {
      Ok(Value::Object(map)) => Some(map),
      Ok(_) | Err(_) => {
        debug!(target: "cache", key, "malformed cache entry, treating as miss");
        None
      }
    }
  }
}

/// Strip the bookkeeping fields, returning write time and remote version.
fn take_meta(fields: &mut Map<String, Value>) -> Option<(DateTime<Utc>, Option<String>)> {
  let millis = fields.remove(TIMESTAMP_FIELD)?.as_i64()?;
  let stored_at = DateTime::from_timestamp_millis(millis)?;
  let version = fields
    .remove(VERSION_FIELD)
    .and_then(|v| v.as_str().map(String::from));
  Some((stored_at, version))
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
