//! Trigger the automation webhook and keep the rows it answers with.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::state::StatusHandle;

pub struct WebhookStore {
  http: Client,
  url: String,
  data: Mutex<Option<Vec<Value>>>,
  status: StatusHandle,
}

impl WebhookStore {
  pub fn new(http: Client, url: impl Into<String>) -> Self {
    Self {
      http,
      url: url.into(),
      data: Mutex::new(None),
      status: StatusHandle::new(),
    }
  }

  pub fn data(&self) -> Option<Vec<Value>> {
    self.data.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  pub fn status(&self) -> &StatusHandle {
    &self.status
  }

  /// POST to the webhook. Anything but a JSON array is an error.
  pub async fn fetch_webhook_data(&self) -> Result<Vec<Value>> {
    let rows = self.status.track(self.call()).await?;
    *self.data.lock().unwrap_or_else(|p| p.into_inner()) = Some(rows.clone());
    Ok(rows)
  }

  async fn call(&self) -> Result<Vec<Value>> {
    debug!(target: "webhook", url = %self.url, "sending request");
    let response = self
      .http
      .post(&self.url)
      .header(CONTENT_TYPE, "application/json")
      .header(ACCEPT, "application/json")
      .send()
      .await?;

    let status = response.status();
    let body = response.text().await?;
    let parsed = serde_json::from_str::<Value>(&body);

    if !status.is_success() {
      let message = parsed
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
      return Err(Error::backend(status.as_u16(), message));
    }

    match parsed? {
      Value::Array(rows) => {
        info!(target: "webhook", rows = rows.len(), "webhook answered");
        Ok(rows)
      }
      _ => Err(Error::UnexpectedResponse(
        "Expected an array from webhook".to_string(),
      )),
    }
  }
}
