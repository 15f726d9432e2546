//! Connection details shared by the table, storage and auth endpoints of one
//! hosted project.

use reqwest::{Client, Method, RequestBuilder};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Base URL, API key and the signed-in user's access token.
///
/// Cloning is cheap and clones share the access token, so signing in through
/// one client authorizes every other client built from the same project.
#[derive(Clone)]
pub struct Project {
  http: Client,
  base_url: Url,
  api_key: String,
  access_token: Arc<RwLock<Option<String>>>,
}

impl Project {
  pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(30))
      .user_agent(concat!("quire/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Self::with_client(http, base_url, api_key)
  }

  pub fn with_client(http: Client, base_url: &str, api_key: impl Into<String>) -> Result<Self> {
    // Url::join drops the last path segment unless it ends in a slash.
    let normalized = if base_url.ends_with('/') {
      base_url.to_string()
    } else {
      format!("{}/", base_url)
    };
    let base_url = Url::parse(&normalized)
      .map_err(|e| Error::validation(format!("Invalid backend URL '{}': {}", base_url, e)))?;

    Ok(Self {
      http,
      base_url,
      api_key: api_key.into(),
      access_token: Arc::new(RwLock::new(None)),
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Resolve `path` (no leading slash) against the project URL.
  pub fn url(&self, path: &str) -> Result<Url> {
    self
      .base_url
      .join(path)
      .map_err(|e| Error::validation(format!("Invalid path '{}': {}", path, e)))
  }

  pub fn set_access_token(&self, token: Option<String>) {
    *self
      .access_token
      .write()
      .unwrap_or_else(|p| p.into_inner()) = token;
  }

  pub fn access_token(&self) -> Option<String> {
    self
      .access_token
      .read()
      .unwrap_or_else(|p| p.into_inner())
      .clone()
  }

  /// Start a request carrying the API key and the best available bearer token.
  pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let bearer = self.access_token().unwrap_or_else(|| self.api_key.clone());
    self
      .http
      .request(method, url)
      .header("apikey", &self.api_key)
      .bearer_auth(bearer)
  }
}
