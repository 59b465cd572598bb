//! Source construction from a configuration tag.

use std::sync::Arc;
use url::Url;

use crate::error::FactoryError;
use crate::transport::ResilientTransport;

use super::source::{LiveSource, MockSource, WeatherSource};
use super::types::Granularity;

/// Builds a [`WeatherSource`] from a configuration tag.
///
/// Accepted tags: `api` / `live` (requires a base URL) and `mock`.
pub struct SourceFactory {
  granularity: Granularity,
  transport: Arc<ResilientTransport>,
}

impl SourceFactory {
  pub fn new(granularity: Granularity, transport: Arc<ResilientTransport>) -> Self {
    Self {
      granularity,
      transport,
    }
  }

  pub fn create(
    &self,
    kind: &str,
    base_url: Option<&str>,
  ) -> Result<Box<dyn WeatherSource>, FactoryError> {
    match kind.trim() {
      "api" | "live" => {
        let base_url = parse_base_url(kind, base_url)?;
        Ok(Box::new(LiveSource::new(
          base_url,
          self.granularity,
          Arc::clone(&self.transport),
        )))
      }
      "mock" => Ok(Box::new(MockSource::new(self.granularity))),
      _ => Err(FactoryError::UnknownServiceKind {
        kind: kind.to_string(),
      }),
    }
  }
}

fn parse_base_url(kind: &str, base_url: Option<&str>) -> Result<Url, FactoryError> {
  let raw = base_url
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or_else(|| FactoryError::MissingBaseUrl {
      kind: kind.to_string(),
    })?;

  let url = Url::parse(raw).map_err(|source| FactoryError::InvalidBaseUrl {
    url: raw.to_string(),
    source,
  })?;

  if !matches!(url.scheme(), "http" | "https") {
    return Err(FactoryError::UnsupportedScheme {
      url: raw.to_string(),
    });
  }

  Ok(url)
}
