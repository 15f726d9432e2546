//! Bucket storage over the project's `/storage/v1` endpoints.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{BlobStorage, ListOptions, ObjectInfo, UploadOptions};
use crate::backend::Project;
use crate::error::{check_response, Error, Result};

#[derive(Clone)]
pub struct RestStorage {
  project: Project,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
  #[serde(rename = "signedURL")]
  signed_url: String,
}

impl RestStorage {
  pub fn new(project: Project) -> Self {
    Self { project }
  }
}

#[async_trait]
impl BlobStorage for RestStorage {
  async fn list(
    &self,
    bucket: &str,
    folder: &str,
    options: &ListOptions,
  ) -> Result<Vec<ObjectInfo>> {
    let url = self.project.url(&format!("storage/v1/object/list/{}", bucket))?;
    debug!(target: "storage", bucket, folder, limit = options.limit, "list");

    let body = json!({
      "prefix": folder,
      "limit": options.limit,
      "offset": options.offset,
      "sortBy": {
        "column": options.sort_column,
        "order": if options.descending { "desc" } else { "asc" },
      },
    });
    let response = self.project.request(Method::POST, url).json(&body).send().await?;
    Ok(check_response(response).await?.json().await?)
  }

  async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
    options: &UploadOptions,
  ) -> Result<String> {
    let url = self.project.url(&format!("storage/v1/object/{}/{}", bucket, path))?;
    debug!(target: "storage", bucket, path, size = bytes.len(), content_type, "upload");

    let response = self
      .project
      .request(Method::POST, url)
      .header("Content-Type", content_type)
      .header("Cache-Control", format!("max-age={}", options.cache_control))
      .header("x-upsert", options.upsert.to_string())
      .body(bytes)
      .send()
      .await?;
    check_response(response).await?;
    Ok(path.to_string())
  }

  async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
    let url = self.project.url(&format!("storage/v1/object/{}", bucket))?;
    debug!(target: "storage", bucket, count = paths.len(), "remove");

    let response = self
      .project
      .request(Method::DELETE, url)
      .json(&json!({ "prefixes": paths }))
      .send()
      .await?;
    check_response(response).await?;
    Ok(())
  }

  fn public_url(&self, bucket: &str, path: &str) -> Result<String> {
    Ok(
      self
        .project
        .url(&format!("storage/v1/object/public/{}/{}", bucket, path))?
        .to_string(),
    )
  }

  async fn signed_url(&self, bucket: &str, path: &str, expires_in_secs: u64) -> Result<String> {
    let url = self.project.url(&format!("storage/v1/object/sign/{}/{}", bucket, path))?;
    debug!(target: "storage", bucket, path, expires_in_secs, "sign");

    let response = self
      .project
      .request(Method::POST, url)
      .json(&json!({ "expiresIn": expires_in_secs }))
      .send()
      .await?;
    let signed: SignedUrlResponse = check_response(response).await?.json().await?;

    // The service answers with a path relative to the storage root.
    let relative = signed.signed_url.trim_start_matches('/');
    self
      .project
      .url(&format!("storage/v1/{}", relative))
      .map(|url| url.to_string())
      .map_err(|_| Error::UnexpectedResponse(format!("bad signed URL: {}", signed.signed_url)))
  }
}
