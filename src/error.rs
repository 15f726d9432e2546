//! Error type shared by every boundary call (tables, storage, Notion, auth).

use std::time::Duration;
use thiserror::Error;

/// Failure of a remote call, a local validation, or the local cache.
#[derive(Debug, Error)]
pub enum Error {
  /// The remote service answered with a non-success status.
  #[error("backend returned {status}: {message}")]
  Backend { status: u16, message: String },

  /// Input rejected locally before any network call.
  #[error("{0}")]
  Validation(String),

  /// The durable local storage could not be read or written.
  #[error("cache storage error: {0}")]
  Cache(String),

  /// A single-row fetch found nothing.
  #[error("not found: {0}")]
  NotFound(String),

  #[error("request timed out after {0:?}")]
  Timeout(Duration),

  /// A newer request for the same key started while this one was in flight.
  #[error("request for '{0}' was superseded by a newer one")]
  Superseded(String),

  #[error("unexpected response: {0}")]
  UnexpectedResponse(String),

  #[error(transparent)]
  Http(#[from] reqwest::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn backend(status: u16, message: impl Into<String>) -> Self {
    Self::Backend {
      status,
      message: message.into(),
    }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  pub fn is_validation(&self) -> bool {
    matches!(self, Self::Validation(_))
  }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    Self::Cache(e.to_string())
  }
}

/// Turn a non-success HTTP response into [`Error::Backend`], keeping the body
/// text as the message. Services in this crate report errors as JSON with a
/// `message`, `msg` or `error_description` field; the first one found wins.
pub async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let body = response.text().await.unwrap_or_default();
  let message = serde_json::from_str::<serde_json::Value>(&body)
    .ok()
    .and_then(|v| {
      ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|field| v.get(*field).and_then(|m| m.as_str()).map(String::from))
    })
    .unwrap_or_else(|| {
      if body.is_empty() {
        status
          .canonical_reason()
          .unwrap_or("request failed")
          .to_string()
      } else {
        body
      }
    });

  Err(Error::backend(status.as_u16(), message))
}
