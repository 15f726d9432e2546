//! In-process bucket storage, for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{BlobStorage, ListOptions, ObjectInfo, ObjectMetadata, UploadOptions};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct MemoryStorage {
  /// (bucket, path) -> (content type, size, upload sequence)
  objects: Mutex<BTreeMap<(String, String), (String, u64, u64)>>,
  uploads: Mutex<u64>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn put(&self, bucket: &str, path: &str, size: u64) {
    let mut seq = self.uploads.lock().unwrap();
    *seq += 1;
    self.objects.lock().unwrap().insert(
      (bucket.to_string(), path.to_string()),
      ("application/octet-stream".to_string(), size, *seq),
    );
  }

  pub fn paths(&self, bucket: &str) -> Vec<String> {
    self
      .objects
      .lock()
      .unwrap()
      .keys()
      .filter(|(b, _)| b == bucket)
      .map(|(_, p)| p.clone())
      .collect()
  }
}

#[async_trait]
impl BlobStorage for MemoryStorage {
  async fn list(
    &self,
    bucket: &str,
    folder: &str,
    options: &ListOptions,
  ) -> Result<Vec<ObjectInfo>> {
    let prefix = if folder.is_empty() {
      String::new()
    } else {
      format!("{}/", folder)
    };
    let objects = self.objects.lock().unwrap();
    let mut entries: Vec<(u64, ObjectInfo)> = objects
      .iter()
      .filter(|((b, path), _)| b == bucket && path.starts_with(&prefix))
      .filter_map(|((_, path), (mimetype, size, seq))| {
        let name = &path[prefix.len()..];
        (!name.contains('/')).then(|| {
          (
            *seq,
            ObjectInfo {
              id: Some(format!("obj-{}", seq)),
              name: name.to_string(),
              created_at: None,
              updated_at: None,
              metadata: Some(ObjectMetadata {
                size: *size,
                mimetype: Some(mimetype.clone()),
              }),
            },
          )
        })
      })
      .collect();

    entries.sort_by_key(|(seq, _)| *seq);
    if options.descending {
      entries.reverse();
    }
    Ok(
      entries
        .into_iter()
        .skip(options.offset)
        .take(options.limit)
        .map(|(_, info)| info)
        .collect(),
    )
  }

  async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
    options: &UploadOptions,
  ) -> Result<String> {
    let key = (bucket.to_string(), path.to_string());
    let mut objects = self.objects.lock().unwrap();
    if objects.contains_key(&key) && !options.upsert {
      return Err(Error::backend(409, "The resource already exists"));
    }
    let mut seq = self.uploads.lock().unwrap();
    *seq += 1;
    objects.insert(key, (content_type.to_string(), bytes.len() as u64, *seq));
    Ok(path.to_string())
  }

  async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
    let mut objects = self.objects.lock().unwrap();
    for path in paths {
      objects.remove(&(bucket.to_string(), path.clone()));
    }
    Ok(())
  }

  fn public_url(&self, bucket: &str, path: &str) -> Result<String> {
    Ok(format!("memory://public/{}/{}", bucket, path))
  }

  async fn signed_url(&self, bucket: &str, path: &str, expires_in_secs: u64) -> Result<String> {
    Ok(format!("memory://sign/{}/{}?expires={}", bucket, path, expires_in_secs))
  }
}
