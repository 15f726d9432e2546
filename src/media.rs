//! Media library: image files in a storage bucket.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::blob::{BlobStorage, ListOptions, UploadOptions};
use crate::cache::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::state::StatusHandle;

pub const DEFAULT_BUCKET: &str = "images";
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_SIGNED_URL_SECS: u64 = 3600;

static IMAGE_NAME: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|svg)$").expect("valid image pattern"));

/// Placeholder object the storage service creates for empty folders.
const FOLDER_PLACEHOLDER: &str = ".emptyFolderPlaceholder";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaImage {
  pub id: Option<String>,
  pub name: String,
  pub size: u64,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
  /// Path within the bucket
  pub path: String,
  pub url: String,
  pub bucket: String,
  pub folder: String,
}

/// A file to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
  pub name: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

impl UploadFile {
  /// Read a local file, guessing its content type from the extension.
  pub async fn from_path(path: &Path) -> Result<Self> {
    let bytes = tokio::fs::read(path)
      .await
      .map_err(|e| Error::validation(format!("Cannot read {}: {}", path.display(), e)))?;
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    let content_type = mime_guess::from_path(path)
      .first_or_octet_stream()
      .essence_str()
      .to_string();
    Ok(Self {
      name,
      content_type,
      bytes,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
  pub path: String,
  pub file_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
  pub file: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchUpload {
  pub success: bool,
  pub success_count: usize,
  pub failure_count: usize,
  pub results: Vec<FileReport>,
}

pub struct MediaManager {
  storage: Arc<dyn BlobStorage>,
  clock: Arc<dyn Clock>,
  bucket: Mutex<String>,
  max_upload_bytes: usize,
  images: Mutex<Vec<MediaImage>>,
  status: StatusHandle,
  upload_status: StatusHandle,
}

impl MediaManager {
  pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
    Self {
      storage,
      clock: Arc::new(SystemClock),
      bucket: Mutex::new(DEFAULT_BUCKET.to_string()),
      max_upload_bytes: MAX_UPLOAD_BYTES,
      images: Mutex::new(Vec::new()),
      status: StatusHandle::new(),
      upload_status: StatusHandle::new(),
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_max_upload_bytes(mut self, max: usize) -> Self {
    self.max_upload_bytes = max;
    self
  }

  pub fn set_bucket(&self, bucket: &str) {
    debug!(target: "media", bucket, "bucket selected");
    *self.bucket.lock().unwrap_or_else(|p| p.into_inner()) = bucket.to_string();
  }

  pub fn bucket(&self) -> String {
    self.bucket.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  pub fn images(&self) -> Vec<MediaImage> {
    self.images.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  pub fn status(&self) -> &StatusHandle {
    &self.status
  }

  pub fn upload_status(&self) -> &StatusHandle {
    &self.upload_status
  }

  /// List the images directly under `folder`, newest first.
  ///
  /// A failed listing also clears the held images.
  pub async fn fetch_images(&self, folder: &str) -> Result<Vec<MediaImage>> {
    let result = self.status.track(self.load(folder)).await;
    if result.is_err() {
      self.set_images(Vec::new());
    }
    result
  }

  /// Upload one image under `folder`, named `file_name` or `image_<millis>.<ext>`.
  pub async fn upload_image(
    &self,
    file: &UploadFile,
    folder: &str,
    file_name: Option<&str>,
  ) -> Result<UploadOutcome> {
    let outcome = self
      .upload_status
      .track(self.upload_one(file, folder, file_name, None))
      .await?;
    self.reload_after_write(folder).await;
    Ok(outcome)
  }

  /// Upload each file in turn. Failures are reported per file and do not
  /// stop the batch. Generated names carry the file's position in the batch,
  /// `image_<millis>_<index>.<ext>`, so files uploaded within the same
  /// millisecond don't collide.
  pub async fn upload_many(&self, files: &[UploadFile], folder: &str) -> Result<BatchUpload> {
    let batch = self
      .upload_status
      .track(async {
        let mut results = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
          let report = match self.upload_one(file, folder, None, Some(index)).await {
            Ok(outcome) => FileReport {
              file: file.name.clone(),
              path: Some(outcome.path),
              error: None,
            },
            Err(e) => {
              warn!(target: "media", file = %file.name, error = %e, "upload failed");
              FileReport {
                file: file.name.clone(),
                path: None,
                error: Some(e.to_string()),
              }
            }
          };
          results.push(report);
        }

        let success_count = results.iter().filter(|r| r.error.is_none()).count();
        let failure_count = results.len() - success_count;
        info!(target: "media", success_count, failure_count, "batch upload finished");

        Ok::<_, Error>(BatchUpload {
          success: failure_count == 0,
          success_count,
          failure_count,
          results,
        })
      })
      .await?;

    self.reload_after_write(folder).await;
    Ok(batch)
  }

  pub async fn delete_image(&self, path: &str) -> Result<()> {
    self.delete_many(&[path.to_string()]).await
  }

  /// Remove objects and drop them from the held listing.
  pub async fn delete_many(&self, paths: &[String]) -> Result<()> {
    self
      .status
      .track(async {
        self.storage.remove(&self.bucket(), paths).await?;
        self
          .images
          .lock()
          .unwrap_or_else(|p| p.into_inner())
          .retain(|image| !paths.contains(&image.path));
        info!(target: "media", count = paths.len(), "deleted");
        Ok(())
      })
      .await
  }

  pub fn image_url(&self, path: &str) -> Result<String> {
    self.storage.public_url(&self.bucket(), path)
  }

  pub async fn signed_url(&self, path: &str, expires_in_secs: Option<u64>) -> Result<String> {
    self
      .storage
      .signed_url(
        &self.bucket(),
        path,
        expires_in_secs.unwrap_or(DEFAULT_SIGNED_URL_SECS),
      )
      .await
  }

  /// Held images whose name contains `term`, ignoring case. An empty term
  /// matches everything.
  pub fn search(&self, term: &str) -> Vec<MediaImage> {
    let term = term.to_lowercase();
    self
      .images()
      .into_iter()
      .filter(|image| term.is_empty() || image.name.to_lowercase().contains(&term))
      .collect()
  }

  pub fn in_folder(&self, folder: &str) -> Vec<MediaImage> {
    self
      .images()
      .into_iter()
      .filter(|image| image.folder == folder)
      .collect()
  }

  pub fn total_size(&self) -> u64 {
    self.images().iter().map(|image| image.size).sum()
  }

  async fn upload_one(
    &self,
    file: &UploadFile,
    folder: &str,
    file_name: Option<&str>,
    batch_index: Option<usize>,
  ) -> Result<UploadOutcome> {
    if !file.content_type.starts_with("image/") {
      return Err(Error::validation("Please select a valid image file"));
    }
    if file.bytes.len() > self.max_upload_bytes {
      let limit = format_file_size(self.max_upload_bytes as u64).replace(' ', "");
      return Err(Error::validation(format!(
        "Image file size must be less than {}",
        limit
      )));
    }

    let file_name = match file_name {
      Some(name) => name.to_string(),
      None => {
        let extension = file.name.rsplit('.').next().unwrap_or_default();
        let millis = self.clock.now().timestamp_millis();
        match batch_index {
          Some(index) => format!("image_{}_{}.{}", millis, index, extension),
          None => format!("image_{}.{}", millis, extension),
        }
      }
    };
    let path = join_path(folder, &file_name);

    let stored = self
      .storage
      .upload(
        &self.bucket(),
        &path,
        file.bytes.clone(),
        &file.content_type,
        &UploadOptions::default(),
      )
      .await?;
    info!(target: "media", path = %stored, size = file.bytes.len(), "uploaded");

    Ok(UploadOutcome {
      path: stored,
      file_name,
    })
  }

  /// Refresh the listing after an upload. A failed refresh shows up on
  /// [`Self::status`]; the upload result stands.
  async fn reload_after_write(&self, folder: &str) {
    if let Err(e) = self.fetch_images(folder).await {
      warn!(target: "media", folder, error = %e, "refresh after upload failed");
    }
  }

  async fn load(&self, folder: &str) -> Result<Vec<MediaImage>> {
    let bucket = self.bucket();
    let entries = self
      .storage
      .list(&bucket, folder, &ListOptions::default())
      .await?;

    let mut images = Vec::new();
    for entry in entries {
      if entry.name == FOLDER_PLACEHOLDER || !IMAGE_NAME.is_match(&entry.name) {
        continue;
      }
      let path = join_path(folder, &entry.name);
      images.push(MediaImage {
        size: entry.size(),
        url: self.storage.public_url(&bucket, &path)?,
        id: entry.id,
        name: entry.name,
        created_at: entry.created_at,
        updated_at: entry.updated_at,
        path,
        bucket: bucket.clone(),
        folder: folder.to_string(),
      });
    }

    debug!(target: "media", bucket = %bucket, folder, count = images.len(), "listed");
    self.set_images(images.clone());
    Ok(images)
  }

  fn set_images(&self, images: Vec<MediaImage>) {
    *self.images.lock().unwrap_or_else(|p| p.into_inner()) = images;
  }
}

fn join_path(folder: &str, name: &str) -> String {
  if folder.is_empty() {
    name.to_string()
  } else {
    format!("{}/{}", folder, name)
  }
}

/// Human-readable size with up to two decimals, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
  if bytes == 0 {
    return "0 Bytes".to_string();
  }

  let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
  let exponent = exponent.min(UNITS.len() - 1);
  let value = bytes as f64 / 1024f64.powi(exponent as i32);
  let formatted = format!("{:.2}", value);
  let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
  format!("{} {}", trimmed, UNITS[exponent])
}
