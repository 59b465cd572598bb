//! Live and mock weather sources.

use chrono::{NaiveDate, NaiveTime};
use futures::future::BoxFuture;
use std::sync::Arc;
use url::Url;

use crate::error::SourceError;
use crate::transport::{ResilientTransport, TransportRequest};

use super::api_types::{parse_forecast, DAILY_VARIABLES, HOURLY_VARIABLE};
use super::types::{DailyObservation, FetchResult, Granularity, HourlyObservation, Observation};

/// Days of history requested for the daily series.
pub const DAILY_LOOKBACK_DAYS: u32 = 92;

/// Anything that can produce temperature observations for a coordinate.
pub trait WeatherSource: Send + Sync {
  /// Fetch the observation window for a coordinate.
  ///
  /// Never fails outright: on error the result is empty and
  /// [`FetchResult::is_degraded`] is set.
  fn fetch(&self, latitude: f64, longitude: f64) -> BoxFuture<'_, FetchResult>;

  fn granularity(&self) -> Granularity;
}

/// Source backed by the Open-Meteo forecast API.
pub struct LiveSource {
  base_url: Url,
  granularity: Granularity,
  transport: Arc<ResilientTransport>,
}

impl LiveSource {
  pub fn new(base_url: Url, granularity: Granularity, transport: Arc<ResilientTransport>) -> Self {
    Self {
      base_url,
      granularity,
      transport,
    }
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// The single request issued for one fetch.
  pub fn request_for(&self, latitude: f64, longitude: f64) -> TransportRequest {
    let request = TransportRequest::get(self.base_url.clone())
      .param("latitude", latitude)
      .param("longitude", longitude);

    match self.granularity {
      Granularity::Daily => request
        .param("daily", DAILY_VARIABLES)
        .param("past_days", DAILY_LOOKBACK_DAYS),
      Granularity::Hourly => request.param("hourly", HOURLY_VARIABLE),
    }
  }

  async fn try_fetch(&self, latitude: f64, longitude: f64) -> Result<Vec<Observation>, SourceError> {
    let request = self.request_for(latitude, longitude);
    let response = self.transport.execute(&request).await?;
    parse_forecast(&response.data.body, self.granularity)
  }
}

impl WeatherSource for LiveSource {
  fn fetch(&self, latitude: f64, longitude: f64) -> BoxFuture<'_, FetchResult> {
    Box::pin(async move { FetchResult::from_outcome(self.try_fetch(latitude, longitude).await) })
  }

  fn granularity(&self) -> Granularity {
    self.granularity
  }
}

/// Canned, coordinate-independent data for tests and offline runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockSource {
  granularity: Granularity,
}

impl MockSource {
  pub fn new(granularity: Granularity) -> Self {
    Self { granularity }
  }

  /// The fixed sequence returned for this granularity.
  pub fn observations(&self) -> Vec<Observation> {
    match self.granularity {
      Granularity::Hourly => mock_hourly(),
      Granularity::Daily => mock_daily(),
    }
  }
}

impl WeatherSource for MockSource {
  fn fetch(&self, _latitude: f64, _longitude: f64) -> BoxFuture<'_, FetchResult> {
    let observations = self.observations();
    Box::pin(async move { FetchResult::ok(observations) })
  }

  fn granularity(&self) -> Granularity {
    self.granularity
  }
}

fn mock_day() -> NaiveDate {
  NaiveDate::from_ymd_opt(2024, 8, 1).unwrap_or_default()
}

fn mock_hourly() -> Vec<Observation> {
  [(0, 20.0), (1, 21.0), (2, 19.0), (3, 18.0)]
    .into_iter()
    .map(|(hour, temperature)| {
      let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default();
      HourlyObservation::new(mock_day().and_time(time).and_utc(), temperature).into()
    })
    .collect()
}

fn mock_daily() -> Vec<Observation> {
  [(14.2, 25.1), (15.0, 27.3), (13.8, 22.4), (12.9, 21.0)]
    .into_iter()
    .zip(mock_day().iter_days())
    .map(|((min, max), date)| DailyObservation::new(date, min, max).into())
    .collect()
}
