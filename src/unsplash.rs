//! Random landscape photo, refreshed at most once a day.

use chrono::Duration;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::cache::CacheResult;
use crate::error::{Error, Result};
use crate::refresh::Refresher;
use crate::state::StatusHandle;

pub const DEFAULT_API_URL: &str = "https://api.unsplash.com";
pub const DEFAULT_QUERY: &str = "nature,landscape";
pub const CACHE_KEY: &str = "unsplash_image";
const FALLBACK_ALT: &str = "Nature landscape";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyImage {
  pub url: String,
  pub alt: String,
  pub photographer: String,
  pub photographer_url: String,
}

#[derive(Deserialize)]
struct ApiPhoto {
  urls: ApiUrls,
  alt_description: Option<String>,
  user: ApiUser,
}

#[derive(Deserialize)]
struct ApiUrls {
  regular: String,
}

#[derive(Deserialize)]
struct ApiUser {
  name: String,
  links: ApiUserLinks,
}

#[derive(Deserialize)]
struct ApiUserLinks {
  html: String,
}

impl From<ApiPhoto> for DailyImage {
  fn from(photo: ApiPhoto) -> Self {
    Self {
      url: photo.urls.regular,
      alt: photo
        .alt_description
        .filter(|alt| !alt.is_empty())
        .unwrap_or_else(|| FALLBACK_ALT.to_string()),
      photographer: photo.user.name,
      photographer_url: photo.user.links.html,
    }
  }
}

pub struct ImageOfTheDay {
  http: Client,
  api_url: String,
  access_key: String,
  query: String,
  refresher: Refresher,
  current: Mutex<Option<DailyImage>>,
  status: StatusHandle,
}

impl ImageOfTheDay {
  pub fn new(
    http: Client,
    api_url: &str,
    access_key: impl Into<String>,
    refresher: Refresher,
  ) -> Self {
    Self {
      http,
      api_url: api_url.trim_end_matches('/').to_string(),
      access_key: access_key.into(),
      query: DEFAULT_QUERY.to_string(),
      refresher,
      current: Mutex::new(None),
      status: StatusHandle::new(),
    }
  }

  pub fn with_query(mut self, query: impl Into<String>) -> Self {
    self.query = query.into();
    self
  }

  pub fn current(&self) -> Option<DailyImage> {
    self.current.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  pub fn status(&self) -> &StatusHandle {
    &self.status
  }

  /// Today's image, from the cache when fetched less than a day ago.
  pub async fn fetch_random_image(&self) -> Result<CacheResult<DailyImage>> {
    let result = self
      .status
      .track(
        self
          .refresher
          .get_or_refresh(CACHE_KEY, Duration::hours(24), || self.fetch()),
      )
      .await?;

    debug!(target: "unsplash", source = ?result.source, "served");
    *self.current.lock().unwrap_or_else(|p| p.into_inner()) = Some(result.data.clone());
    Ok(result)
  }

  async fn fetch(&self) -> Result<DailyImage> {
    let response = self
      .http
      .get(format!("{}/photos/random", self.api_url))
      .query(&[("query", self.query.as_str()), ("orientation", "landscape")])
      .header("Accept-Version", "v1")
      .header("Authorization", format!("Client-ID {}", self.access_key))
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(Error::backend(
        status.as_u16(),
        "Failed to fetch image from Unsplash",
      ));
    }

    let image = DailyImage::from(response.json::<ApiPhoto>().await?);
    info!(target: "unsplash", photographer = %image.photographer, "fetched new image");
    Ok(image)
  }
}
