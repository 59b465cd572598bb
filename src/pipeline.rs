//! Fetch-then-persist orchestration.

use color_eyre::{eyre::WrapErr, Result};
use std::sync::Arc;
use tracing::instrument;

use crate::cache::{CacheLayer, SqliteResponseCache};
use crate::config::Config;
use crate::error::{PipelineError, SourceError};
use crate::store::{ObservationStore, SqliteStore};
use crate::transport::{ReqwestExecutor, ResilientTransport};
use crate::weather::{Observation, SourceFactory, WeatherSource};

/// Where a run currently is. `Failed` only follows a store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
  Idle,
  Fetching,
  Persisting,
  Done,
  Failed,
}

/// Summary of one completed run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
  /// Observations returned by the source
  pub fetched: usize,
  /// Rows upserted into the store
  pub written: usize,
  /// The fetch failed and was treated as empty
  pub degraded: bool,
  pub failure: Option<SourceError>,
  /// Full store contents read back after the write, when confirmation is on
  pub stored: Option<Vec<Observation>>,
}

pub struct Pipeline {
  source: Box<dyn WeatherSource>,
  store: Arc<dyn ObservationStore>,
  confirm: bool,
  state: PipelineState,
}

impl Pipeline {
  pub fn new(source: Box<dyn WeatherSource>, store: Arc<dyn ObservationStore>) -> Self {
    Self {
      source,
      store,
      confirm: false,
      state: PipelineState::Idle,
    }
  }

  /// Read the whole store back at the end of every run that did not fail,
  /// including runs that had nothing to write.
  pub fn with_confirmation(mut self, confirm: bool) -> Self {
    self.confirm = confirm;
    self
  }

  pub fn state(&self) -> PipelineState {
    self.state
  }

  pub fn store(&self) -> &Arc<dyn ObservationStore> {
    &self.store
  }

  /// Build the live pipeline described by `config`.
  pub fn from_config(config: &Config) -> Result<Self> {
    config.validate()?;

    let executor = ReqwestExecutor::new().wrap_err("Failed to build HTTP client")?;
    let mut transport =
      ResilientTransport::new(Arc::new(executor)).with_retry(config.retry.policy());

    if config.cache.enabled {
      let storage = match &config.cache.path {
        Some(path) => SqliteResponseCache::open(path)?,
        None => SqliteResponseCache::open_default()?,
      };
      let layer =
        CacheLayer::new(Arc::new(storage)).with_expire_after(config.cache.expire_after()?);
      transport = transport.with_cache(layer);
    }

    let factory = SourceFactory::new(config.source.granularity, Arc::new(transport));
    let source = factory.create(&config.source.kind, config.source.base_url.as_deref())?;

    let store = match &config.store.path {
      Some(path) => SqliteStore::open(path)?,
      None => SqliteStore::open_default()?,
    };

    Ok(Self::new(source, Arc::new(store)))
  }

  /// Fetch observations for a coordinate and upsert them.
  ///
  /// A failed fetch is not an error: it is logged, nothing is written and
  /// the report is marked degraded. Store failures abort the run.
  #[instrument(skip(self))]
  pub async fn run(&mut self, latitude: f64, longitude: f64) -> Result<PipelineReport, PipelineError> {
    self.state = PipelineState::Fetching;
    let result = self.source.fetch(latitude, longitude).await;

    let mut report = PipelineReport {
      fetched: result.len(),
      degraded: result.is_degraded(),
      failure: result.failure().cloned(),
      ..PipelineReport::default()
    };

    if let Some(failure) = result.failure() {
      tracing::warn!("Fetch failed, nothing to persist: {}", failure);
    } else {
      tracing::info!("Fetched {} observations", report.fetched);
    }

    let observations = result.into_observations();
    if !observations.is_empty() {
      self.state = PipelineState::Persisting;
      report.written = match self.store.upsert(&observations) {
        Ok(n) => n,
        Err(e) => {
          self.state = PipelineState::Failed;
          tracing::error!("Failed to persist observations: {}", e);
          return Err(e.into());
        }
      };
      tracing::info!("Stored {} observations", report.written);
    }

    if self.confirm {
      match self.store.read_all() {
        Ok(stored) => report.stored = Some(stored),
        Err(e) => {
          self.state = PipelineState::Failed;
          return Err(e.into());
        }
      }
    }

    self.state = PipelineState::Done;
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{StoreError, TransportError};
  use crate::store::MemoryStore;
  use crate::transport::testing::ScriptedExecutor;
  use crate::transport::{RetryPolicy, TransportResponse};
  use crate::weather::{DailyObservation, Granularity, MockSource};

  fn factory(executor: Arc<ScriptedExecutor>, granularity: Granularity) -> SourceFactory {
    let transport = ResilientTransport::new(executor).with_retry(RetryPolicy::new(5, 0.0));
    SourceFactory::new(granularity, Arc::new(transport))
  }

  fn offline_factory(granularity: Granularity) -> SourceFactory {
    factory(
      Arc::new(ScriptedExecutor::always(Err(TransportError::Network(
        "unreachable".into(),
      )))),
      granularity,
    )
  }

  #[tokio::test]
  async fn test_mock_end_to_end() {
    let source = offline_factory(Granularity::Hourly).create("mock", None).unwrap();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let mut pipeline = Pipeline::new(source, store.clone()).with_confirmation(true);

    assert_eq!(pipeline.state(), PipelineState::Idle);
    let report = pipeline.run(52.52, 13.41).await.unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(report.fetched, 4);
    assert_eq!(report.written, 4);
    assert!(!report.degraded);

    let mut stored = store.read_all().unwrap();
    stored.sort_by_key(Observation::natural_key);
    assert_eq!(stored, MockSource::new(Granularity::Hourly).observations());
    assert_eq!(report.stored.map(|s| s.len()), Some(4));
  }

  #[tokio::test]
  async fn test_rerun_does_not_duplicate() {
    let source = offline_factory(Granularity::Daily).create("mock", None).unwrap();
    let store = Arc::new(MemoryStore::new());
    let mut pipeline = Pipeline::new(source, store.clone());

    pipeline.run(1.0, 2.0).await.unwrap();
    pipeline.run(1.0, 2.0).await.unwrap();

    assert_eq!(store.read_all().unwrap().len(), 4);
  }

  #[tokio::test]
  async fn test_transport_failure_leaves_store_unchanged() {
    let executor = Arc::new(ScriptedExecutor::always(Err(TransportError::Network(
      "unreachable".into(),
    ))));
    let source = factory(executor.clone(), Granularity::Daily)
      .create("api", Some("https://api.open-meteo.com/v1/forecast"))
      .unwrap();
    let store = Arc::new(MemoryStore::new());
    let existing = DailyObservation::from_date_str("2024-07-01", 10.0, 20.0).unwrap();
    store.upsert(&[existing.into()]).unwrap();

    let mut pipeline = Pipeline::new(source, store.clone());
    let report = pipeline.run(52.52, 13.41).await.unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert!(report.degraded);
    assert_eq!(report.written, 0);
    assert!(matches!(report.failure, Some(SourceError::Transport(_))));
    assert_eq!(store.read_all().unwrap(), vec![Observation::Daily(existing)]);
    assert_eq!(executor.calls(), 5);
  }

  #[tokio::test]
  async fn test_live_source_end_to_end() {
    let body = serde_json::json!({
      "daily": {
        "time": ["2024-08-01", "2024-08-02"],
        "temperature_2m_max": [25.0, 26.0],
        "temperature_2m_min": [15.0, 16.0]
      }
    });
    let executor = Arc::new(ScriptedExecutor::always(Ok(TransportResponse::new(
      200,
      serde_json::to_vec(&body).unwrap(),
    ))));
    let source = factory(executor, Granularity::Daily)
      .create("live", Some("https://api.open-meteo.com/v1/forecast"))
      .unwrap();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());

    let report = Pipeline::new(source, store.clone())
      .run(52.52, 13.41)
      .await
      .unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(store.read_all().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_confirmation_reads_back_when_nothing_fetched() {
    let body = serde_json::json!({
      "daily": {"time": [], "temperature_2m_max": [], "temperature_2m_min": []}
    });
    let executor = Arc::new(ScriptedExecutor::always(Ok(TransportResponse::new(
      200,
      serde_json::to_vec(&body).unwrap(),
    ))));
    let source = factory(executor, Granularity::Daily)
      .create("api", Some("https://api.open-meteo.com/v1/forecast"))
      .unwrap();
    let store = Arc::new(MemoryStore::new());
    let existing = DailyObservation::from_date_str("2024-07-01", 10.0, 20.0).unwrap();
    store.upsert(&[existing.into()]).unwrap();

    let mut pipeline = Pipeline::new(source, store).with_confirmation(true);
    let report = pipeline.run(52.52, 13.41).await.unwrap();

    assert!(!report.degraded);
    assert_eq!(report.written, 0);
    assert_eq!(report.stored, Some(vec![Observation::Daily(existing)]));
    assert_eq!(pipeline.state(), PipelineState::Done);
  }

  #[tokio::test]
  async fn test_closed_store_fails_run() {
    let source = offline_factory(Granularity::Hourly).create("mock", None).unwrap();
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    store.close().unwrap();

    let mut pipeline = Pipeline::new(source, store);
    let err = pipeline.run(0.0, 0.0).await.unwrap_err();

    assert!(matches!(err, PipelineError::Store(StoreError::Closed)));
    assert_eq!(pipeline.state(), PipelineState::Failed);
  }

  #[tokio::test]
  async fn test_from_config_with_mock_source() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::from_yaml(&format!(
      "source:\n  kind: mock\n  granularity: hourly\nstore:\n  path: {}\ncache:\n  path: {}\n",
      dir.path().join("weather.db").display(),
      dir.path().join("cache.sqlite").display(),
    ))
    .unwrap();

    let mut pipeline = Pipeline::from_config(&config).unwrap();
    let report = pipeline
      .run(config.location.latitude, config.location.longitude)
      .await
      .unwrap();

    assert_eq!(report.written, 4);
    assert!(dir.path().join("weather.db").exists());
  }

  #[test]
  fn test_from_config_rejects_out_of_range_expiry() {
    let mut config = Config::default();
    config.source.kind = "mock".to_string();
    config.cache.expire_after_secs = 10_000_000_000_000_000;

    let err = Pipeline::from_config(&config).err().unwrap();
    assert!(format!("{:#}", err).contains("expire_after_secs"));
  }

  #[test]
  fn test_from_config_rejects_unknown_kind() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.source.kind = "bogus".to_string();
    config.store.path = Some(dir.path().join("weather.db"));
    config.cache.enabled = false;

    let err = Pipeline::from_config(&config).err().unwrap();
    assert!(format!("{:#}", err).contains("bogus"));
  }
}
