//! Object storage buckets (media files).

#[cfg(test)]
pub mod memory;
mod rest;

pub use rest::RestStorage;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
  /// Folders have no id
  #[serde(default)]
  pub id: Option<String>,
  pub name: String,
  #[serde(default)]
  pub created_at: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
  #[serde(default)]
  pub metadata: Option<ObjectMetadata>,
}

impl ObjectInfo {
  pub fn size(&self) -> u64 {
    self.metadata.as_ref().map(|m| m.size).unwrap_or(0)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
  #[serde(default)]
  pub size: u64,
  #[serde(default)]
  pub mimetype: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListOptions {
  pub limit: usize,
  pub offset: usize,
  pub sort_column: String,
  pub descending: bool,
}

impl Default for ListOptions {
  fn default() -> Self {
    Self {
      limit: 100,
      offset: 0,
      sort_column: "created_at".to_string(),
      descending: true,
    }
  }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
  /// Seconds, sent as `Cache-Control: max-age=<n>`
  pub cache_control: u32,
  /// Replace an existing object instead of failing
  pub upsert: bool,
}

impl Default for UploadOptions {
  fn default() -> Self {
    Self {
      cache_control: 3600,
      upsert: false,
    }
  }
}

/// Bucket operations used by the media manager.
#[async_trait]
pub trait BlobStorage: Send + Sync {
  /// Entries directly under `folder` (`""` for the bucket root).
  async fn list(
    &self,
    bucket: &str,
    folder: &str,
    options: &ListOptions,
  ) -> Result<Vec<ObjectInfo>>;

  /// Store `bytes` at `path`, returning the stored path.
  async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
    options: &UploadOptions,
  ) -> Result<String>;

  async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;

  /// URL serving the object from a public bucket. No request is made.
  fn public_url(&self, bucket: &str, path: &str) -> Result<String>;

  /// Time-limited URL for an object in a private bucket.
  async fn signed_url(&self, bucket: &str, path: &str, expires_in_secs: u64) -> Result<String>;
}
