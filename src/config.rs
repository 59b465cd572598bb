use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_EXPIRE_AFTER_SECS;
use crate::transport::{
  RetryPolicy, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_SECS,
};
use crate::weather::Granularity;

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub source: SourceConfig,
  pub location: LocationConfig,
  pub store: StoreConfig,
  pub cache: CacheConfig,
  pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
  /// `api`, `live` or `mock`
  pub kind: String,
  pub base_url: Option<String>,
  pub granularity: Granularity,
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      kind: "api".to_string(),
      base_url: Some(DEFAULT_BASE_URL.to_string()),
      granularity: Granularity::Daily,
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
  pub latitude: f64,
  pub longitude: f64,
}

impl Default for LocationConfig {
  // Berlin
  fn default() -> Self {
    Self {
      latitude: 52.52,
      longitude: 13.41,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// Database file (defaults to the platform data directory)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  /// Cache database file (defaults to the platform cache directory)
  pub path: Option<PathBuf>,
  /// Seconds a cached response stays fresh
  pub expire_after_secs: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
      expire_after_secs: DEFAULT_EXPIRE_AFTER_SECS,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub max_attempts: u32,
  pub backoff_factor: f64,
  pub max_backoff_secs: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: DEFAULT_MAX_ATTEMPTS,
      backoff_factor: DEFAULT_BACKOFF_FACTOR,
      max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
    }
  }
}

impl CacheConfig {
  /// Freshness window as a duration. Fails when it does not fit in a `TimeDelta`.
  pub fn expire_after(&self) -> Result<chrono::Duration> {
    chrono::Duration::try_seconds(self.expire_after_secs).ok_or_else(|| {
      eyre!(
        "cache.expire_after_secs {} is out of range",
        self.expire_after_secs
      )
    })
  }
}

impl RetryConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.max_attempts,
      backoff_factor: self.backoff_factor,
      max_backoff: Duration::from_secs(self.max_backoff_secs),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./weather-ingest.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/weather-ingest/config.yaml
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
        "No configuration file found. Create one at ~/.config/weather-ingest/config.yaml"
      )),
    }
  }

  /// Like [`Config::load`], but fall back to defaults when no file is found.
  pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
    if explicit_path.is_none() && Self::find_config_file().is_none() {
      tracing::debug!("No config file found, using defaults");
      return Ok(Self::default());
    }
    Self::load(explicit_path)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("weather-ingest.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("weather-ingest").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::from_yaml(&contents)
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    let LocationConfig {
      latitude,
      longitude,
    } = self.location;
    if !(-90.0..=90.0).contains(&latitude) {
      return Err(eyre!("latitude {} is outside [-90, 90]", latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
      return Err(eyre!("longitude {} is outside [-180, 180]", longitude));
    }
    if self.retry.max_attempts == 0 {
      return Err(eyre!("retry.max_attempts must be at least 1"));
    }
    if self.retry.backoff_factor.is_nan() || self.retry.backoff_factor < 0.0 {
      return Err(eyre!("retry.backoff_factor must not be negative"));
    }
    if self.cache.expire_after_secs < 0 {
      return Err(eyre!("cache.expire_after_secs must not be negative"));
    }
    self.cache.expire_after()?;
    Ok(())
  }
}
