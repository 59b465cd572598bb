//! Open-Meteo response types and their conversion into observations.
//!
//! The provider returns each series as parallel arrays keyed by variable
//! name. Some proxies and recorded fixtures flip that into an array of row
//! objects, so both shapes are accepted.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use crate::error::SourceError;

use super::types::{
  parse_date, parse_timestamp, DailyObservation, Granularity, HourlyObservation, Observation,
};

/// Variables requested for the daily series.
pub const DAILY_VARIABLES: &str = "temperature_2m_max,temperature_2m_min";
/// Variable requested for the hourly series.
pub const HOURLY_VARIABLE: &str = "temperature_2m";

#[derive(Debug, Deserialize)]
pub struct ApiForecastResponse {
  #[serde(default)]
  pub daily: Option<ApiDailySeries>,
  #[serde(default)]
  pub hourly: Option<ApiHourlySeries>,
  /// Set by the provider on rejected requests
  #[serde(default)]
  pub error: bool,
  #[serde(default)]
  pub reason: Option<String>,
}

/// Time axis value: ISO text by default, unix seconds with `timeformat=unixtime`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiTime {
  Unix(i64),
  Text(String),
}

impl ApiTime {
  fn to_date(&self) -> Option<NaiveDate> {
    match self {
      Self::Unix(secs) => Utc.timestamp_opt(*secs, 0).single().map(|ts| ts.date_naive()),
      Self::Text(s) => parse_date(s),
    }
  }

  fn to_instant(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Unix(secs) => Utc.timestamp_opt(*secs, 0).single(),
      Self::Text(s) => parse_timestamp(s),
    }
  }

  fn describe(&self) -> String {
    match self {
      Self::Unix(secs) => secs.to_string(),
      Self::Text(s) => s.clone(),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiDailyColumns {
  pub time: Vec<ApiTime>,
  pub temperature_2m_max: Vec<Option<f64>>,
  pub temperature_2m_min: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiDailyRow {
  pub time: ApiTime,
  pub temperature_2m_max: Option<f64>,
  pub temperature_2m_min: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiDailySeries {
  Columns(ApiDailyColumns),
  Rows(Vec<ApiDailyRow>),
}

#[derive(Debug, Deserialize)]
pub struct ApiHourlyColumns {
  pub time: Vec<ApiTime>,
  pub temperature_2m: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiHourlyRow {
  pub time: ApiTime,
  pub temperature_2m: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiHourlySeries {
  Columns(ApiHourlyColumns),
  Rows(Vec<ApiHourlyRow>),
}

impl ApiDailySeries {
  fn into_rows(self) -> Result<Vec<ApiDailyRow>, SourceError> {
    match self {
      Self::Rows(rows) => Ok(rows),
      Self::Columns(cols) => {
        let n = cols.time.len();
        if cols.temperature_2m_max.len() != n || cols.temperature_2m_min.len() != n {
          return Err(SourceError::MalformedResponse(format!(
            "daily arrays differ in length: time={}, max={}, min={}",
            n,
            cols.temperature_2m_max.len(),
            cols.temperature_2m_min.len()
          )));
        }
        Ok(
          cols
            .time
            .into_iter()
            .zip(cols.temperature_2m_max)
            .zip(cols.temperature_2m_min)
            .map(|((time, max), min)| ApiDailyRow {
              time,
              temperature_2m_max: max,
              temperature_2m_min: min,
            })
            .collect(),
        )
      }
    }
  }

  pub fn into_observations(self) -> Result<Vec<Observation>, SourceError> {
    let mut observations = Vec::new();
    for row in self.into_rows()? {
      let date = row.time.to_date().ok_or_else(|| {
        SourceError::MalformedResponse(format!("invalid daily time '{}'", row.time.describe()))
      })?;
      // Gaps in the provider data come through as nulls
      if let (Some(max), Some(min)) = (row.temperature_2m_max, row.temperature_2m_min) {
        observations.push(DailyObservation::new(date, min, max).into());
      }
    }
    Ok(observations)
  }
}

impl ApiHourlySeries {
  fn into_rows(self) -> Result<Vec<ApiHourlyRow>, SourceError> {
    match self {
      Self::Rows(rows) => Ok(rows),
      Self::Columns(cols) => {
        if cols.temperature_2m.len() != cols.time.len() {
          return Err(SourceError::MalformedResponse(format!(
            "hourly arrays differ in length: time={}, temperature={}",
            cols.time.len(),
            cols.temperature_2m.len()
          )));
        }
        Ok(
          cols
            .time
            .into_iter()
            .zip(cols.temperature_2m)
            .map(|(time, temperature_2m)| ApiHourlyRow {
              time,
              temperature_2m,
            })
            .collect(),
        )
      }
    }
  }

  pub fn into_observations(self) -> Result<Vec<Observation>, SourceError> {
    let mut observations = Vec::new();
    for row in self.into_rows()? {
      let timestamp = row.time.to_instant().ok_or_else(|| {
        SourceError::MalformedResponse(format!("invalid hourly time '{}'", row.time.describe()))
      })?;
      if let Some(temperature) = row.temperature_2m {
        observations.push(HourlyObservation::new(timestamp, temperature).into());
      }
    }
    Ok(observations)
  }
}

/// Decode a forecast body and normalize the series for `granularity`.
pub fn parse_forecast(body: &[u8], granularity: Granularity) -> Result<Vec<Observation>, SourceError> {
  let response: ApiForecastResponse = serde_json::from_slice(body)
    .map_err(|e| SourceError::MalformedResponse(format!("failed to decode body: {}", e)))?;

  if response.error {
    return Err(SourceError::MalformedResponse(format!(
      "provider returned an error: {}",
      response.reason.as_deref().unwrap_or("no reason given")
    )));
  }

  match granularity {
    Granularity::Daily => response
      .daily
      .ok_or_else(|| SourceError::MalformedResponse("missing 'daily' series".into()))?
      .into_observations(),
    Granularity::Hourly => response
      .hourly
      .ok_or_else(|| SourceError::MalformedResponse("missing 'hourly' series".into()))?
      .into_observations(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn bytes(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
  }

  #[test]
  fn test_daily_columns() {
    let body = bytes(json!({
      "latitude": 52.52,
      "daily": {
        "time": ["2024-08-01", "2024-08-02"],
        "temperature_2m_max": [25.1, 27.3],
        "temperature_2m_min": [14.0, 15.2]
      }
    }));
    let obs = parse_forecast(&body, Granularity::Daily).unwrap();
    assert_eq!(obs.len(), 2);
    let first = obs[0].as_daily().unwrap();
    assert_eq!(first.natural_key(), "2024-08-01");
    assert_eq!(first.min_temperature, 14.0);
    assert_eq!(first.max_temperature, 25.1);
    assert_eq!(obs[1].natural_key(), "2024-08-02");
  }

  #[test]
  fn test_daily_unix_time() {
    let body = bytes(json!({
      "daily": {
        "time": [1722470400, 1722556800],
        "temperature_2m_max": [20.0, 21.0],
        "temperature_2m_min": [10.0, 11.0]
      }
    }));
    let obs = parse_forecast(&body, Granularity::Daily).unwrap();
    let keys: Vec<_> = obs.iter().map(Observation::natural_key).collect();
    assert_eq!(keys, ["2024-08-01", "2024-08-02"]);
  }

  #[test]
  fn test_hourly_rows_shape() {
    let body = bytes(json!({
      "hourly": [
        {"time": "2024-08-01T00:00", "temperature_2m": 20.0},
        {"time": "2024-08-01T01:00", "temperature_2m": 21.0}
      ]
    }));
    let obs = parse_forecast(&body, Granularity::Hourly).unwrap();
    assert_eq!(obs.len(), 2);
    let second = obs[1].as_hourly().unwrap();
    assert_eq!(second.natural_key(), "2024-08-01T01:00:00Z");
    assert_eq!(second.temperature, 21.0);
  }

  #[test]
  fn test_null_values_skipped() {
    let body = bytes(json!({
      "hourly": {
        "time": ["2024-08-01T00:00", "2024-08-01T01:00", "2024-08-01T02:00"],
        "temperature_2m": [15.0, null, 17.0]
      }
    }));
    let obs = parse_forecast(&body, Granularity::Hourly).unwrap();
    assert_eq!(obs.len(), 2);
    assert_eq!(obs[1].natural_key(), "2024-08-01T02:00:00Z");
  }

  #[test]
  fn test_length_mismatch_is_malformed() {
    let body = bytes(json!({
      "daily": {
        "time": ["2024-08-01", "2024-08-02"],
        "temperature_2m_max": [25.1],
        "temperature_2m_min": [14.0, 15.2]
      }
    }));
    let err = parse_forecast(&body, Granularity::Daily).unwrap_err();
    assert!(matches!(err, SourceError::MalformedResponse(_)));
  }

  #[test]
  fn test_missing_series_is_malformed() {
    let body = bytes(json!({"hourly": {"time": [], "temperature_2m": []}}));
    let err = parse_forecast(&body, Granularity::Daily).unwrap_err();
    assert!(matches!(err, SourceError::MalformedResponse(ref m) if m.contains("daily")));
  }

  #[test]
  fn test_hourly_without_time_is_malformed() {
    let body = bytes(json!({"hourly": {"temperature_2m": [15.0, 16.0, 17.0]}}));
    assert!(parse_forecast(&body, Granularity::Hourly).is_err());
  }

  #[test]
  fn test_provider_error_body() {
    let body = bytes(json!({"error": true, "reason": "Latitude must be in range"}));
    let err = parse_forecast(&body, Granularity::Daily).unwrap_err();
    assert!(err.to_string().contains("Latitude must be in range"));
  }

  #[test]
  fn test_not_json() {
    assert!(parse_forecast(b"<html>", Granularity::Daily).is_err());
  }
}
