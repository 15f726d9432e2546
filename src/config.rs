use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::media::{DEFAULT_BUCKET, MAX_UPLOAD_BYTES};
use crate::notion::{DEFAULT_API_URL as NOTION_API_URL, DEFAULT_SECTION_PREFIX};
use crate::unsplash::{DEFAULT_API_URL as UNSPLASH_API_URL, DEFAULT_QUERY};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  #[serde(default)]
  pub notion: NotionConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub media: MediaConfig,
  #[serde(default)]
  pub webhook: WebhookConfig,
  #[serde(default)]
  pub unsplash: UnsplashConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Project URL, e.g. https://xyz.supabase.co
  pub url: String,
  /// Environment variable holding the anon key, checked before the defaults
  pub anon_key_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
  pub main_page_id: Option<String>,
  pub preface_page_id: Option<String>,
  pub api_url: String,
  /// Titles starting with this get their child pages listed
  pub child_prefix: String,
}

impl Default for NotionConfig {
  fn default() -> Self {
    Self {
      main_page_id: None,
      preface_page_id: None,
      api_url: NOTION_API_URL.to_string(),
      child_prefix: DEFAULT_SECTION_PREFIX.to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// When false, cached data only lives for the current run
  pub enabled: bool,
  pub max_age_secs: i64,
  /// SQLite file (defaults to $XDG_DATA_HOME/quire/cache.db)
  pub path: Option<PathBuf>,
  /// Upper bound for a single refresh
  pub timeout_secs: Option<u64>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      max_age_secs: 3600,
      path: None,
      timeout_secs: Some(30),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
  pub bucket: String,
  pub max_upload_bytes: usize,
}

impl Default for MediaConfig {
  fn default() -> Self {
    Self {
      bucket: DEFAULT_BUCKET.to_string(),
      max_upload_bytes: MAX_UPLOAD_BYTES,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
  pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnsplashConfig {
  pub api_url: String,
  pub query: String,
}

impl Default for UnsplashConfig {
  fn default() -> Self {
    Self {
      api_url: UNSPLASH_API_URL.to_string(),
      query: DEFAULT_QUERY.to_string(),
    }
  }
}

impl CacheConfig {
  pub fn max_age(&self) -> Result<chrono::Duration> {
    chrono::Duration::try_seconds(self.max_age_secs)
      .filter(|age| *age >= chrono::Duration::zero())
      .ok_or_else(|| eyre!("cache.max_age_secs out of range: {}", self.max_age_secs))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./quire.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/quire/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/quire/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("quire.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("quire").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// The project's anon key.
  ///
  /// Checks `backend.anon_key_env` if set, then QUIRE_SUPABASE_KEY, then
  /// SUPABASE_ANON_KEY.
  pub fn anon_key(&self) -> Result<String> {
    self
      .backend
      .anon_key_env
      .iter()
      .map(String::as_str)
      .chain(["QUIRE_SUPABASE_KEY", "SUPABASE_ANON_KEY"])
      .find_map(|name| std::env::var(name).ok())
      .ok_or_else(|| {
        eyre!(
          "Anon key not found. \
           Set QUIRE_SUPABASE_KEY or SUPABASE_ANON_KEY environment variable."
        )
      })
  }

  /// Checks QUIRE_NOTION_TOKEN first, then NOTION_API_KEY as fallback.
  pub fn notion_token() -> Result<String> {
    std::env::var("QUIRE_NOTION_TOKEN")
      .or_else(|_| std::env::var("NOTION_API_KEY"))
      .map_err(|_| {
        eyre!(
          "Notion token not found. \
           Set QUIRE_NOTION_TOKEN or NOTION_API_KEY environment variable."
        )
      })
  }

  pub fn unsplash_key() -> Result<String> {
    std::env::var("QUIRE_UNSPLASH_KEY").map_err(|_| {
      eyre!("Unsplash access key not found. Set QUIRE_UNSPLASH_KEY environment variable.")
    })
  }
}
