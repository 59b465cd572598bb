//! Normalized observation records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Key format for hourly observations.
const HOURLY_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Resolution of the series requested from a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
  /// Min/max per day over the lookback window
  #[default]
  Daily,
  /// One value per hour over the forecast horizon
  Hourly,
}

/// Min and max temperature for one UTC calendar day.
///
/// `min_temperature <= max_temperature` is not enforced; upstream data can
/// violate it and such rows are stored as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyObservation {
  pub date: NaiveDate,
  pub min_temperature: f64,
  pub max_temperature: f64,
}

impl DailyObservation {
  pub fn new(date: NaiveDate, min_temperature: f64, max_temperature: f64) -> Self {
    Self {
      date,
      min_temperature,
      max_temperature,
    }
  }

  /// Build from any supported textual date form. Returns `None` when the
  /// text is not a recognizable date.
  pub fn from_date_str(date: &str, min_temperature: f64, max_temperature: f64) -> Option<Self> {
    parse_date(date).map(|date| Self::new(date, min_temperature, max_temperature))
  }

  /// ISO calendar date, e.g. `2024-08-01`.
  pub fn natural_key(&self) -> String {
    self.date.format("%Y-%m-%d").to_string()
  }
}

/// Temperature at one UTC instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyObservation {
  pub timestamp: DateTime<Utc>,
  pub temperature: f64,
}

impl HourlyObservation {
  pub fn new(timestamp: DateTime<Utc>, temperature: f64) -> Self {
    Self {
      timestamp,
      temperature,
    }
  }

  pub fn from_timestamp_str(timestamp: &str, temperature: f64) -> Option<Self> {
    parse_timestamp(timestamp).map(|timestamp| Self::new(timestamp, temperature))
  }

  /// RFC 3339 instant with second precision, e.g. `2024-08-01T13:00:00Z`.
  pub fn natural_key(&self) -> String {
    self.timestamp.format(HOURLY_KEY_FORMAT).to_string()
  }
}

/// A single normalized record of either granularity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "granularity", rename_all = "lowercase")]
pub enum Observation {
  Daily(DailyObservation),
  Hourly(HourlyObservation),
}

impl Observation {
  /// Canonical text key the store deduplicates on.
  pub fn natural_key(&self) -> String {
    match self {
      Self::Daily(d) => d.natural_key(),
      Self::Hourly(h) => h.natural_key(),
    }
  }

  pub fn granularity(&self) -> Granularity {
    match self {
      Self::Daily(_) => Granularity::Daily,
      Self::Hourly(_) => Granularity::Hourly,
    }
  }

  pub fn as_daily(&self) -> Option<&DailyObservation> {
    match self {
      Self::Daily(d) => Some(d),
      Self::Hourly(_) => None,
    }
  }

  pub fn as_hourly(&self) -> Option<&HourlyObservation> {
    match self {
      Self::Hourly(h) => Some(h),
      Self::Daily(_) => None,
    }
  }
}

impl From<DailyObservation> for Observation {
  fn from(value: DailyObservation) -> Self {
    Self::Daily(value)
  }
}

impl From<HourlyObservation> for Observation {
  fn from(value: HourlyObservation) -> Self {
    Self::Hourly(value)
  }
}

/// Outcome of one `WeatherSource::fetch` call.
///
/// A failed fetch still yields an (empty) observation sequence. The failure
/// is kept alongside so callers that care can tell "no data" from "degraded".
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
  observations: Vec<Observation>,
  failure: Option<SourceError>,
}

impl FetchResult {
  pub fn ok(observations: Vec<Observation>) -> Self {
    Self {
      observations,
      failure: None,
    }
  }

  pub fn degraded(failure: SourceError) -> Self {
    Self {
      observations: Vec::new(),
      failure: Some(failure),
    }
  }

  pub fn from_outcome(outcome: Result<Vec<Observation>, SourceError>) -> Self {
    match outcome {
      Ok(observations) => Self::ok(observations),
      Err(e) => Self::degraded(e),
    }
  }

  pub fn observations(&self) -> &[Observation] {
    &self.observations
  }

  pub fn into_observations(self) -> Vec<Observation> {
    self.observations
  }

  pub fn is_degraded(&self) -> bool {
    self.failure.is_some()
  }

  pub fn failure(&self) -> Option<&SourceError> {
    self.failure.as_ref()
  }

  pub fn len(&self) -> usize {
    self.observations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.observations.is_empty()
  }
}

/// Parse a calendar date from any of the accepted spellings.
///
/// Instants carrying an offset are converted to UTC before the day is taken.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
  let s = s.trim();
  if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
    return Some(date);
  }
  parse_timestamp(s).map(|ts| ts.date_naive())
}

/// Parse a UTC instant. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS+HH:MM`,
/// offset-less date-times (taken as UTC), bare dates (midnight) and unix
/// seconds.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();
  if s.is_empty() {
    return None;
  }

  if s.bytes().all(|b| b.is_ascii_digit()) || (s.starts_with('-') && s.len() > 1) {
    if let Ok(secs) = s.parse::<i64>() {
      return Utc.timestamp_opt(secs, 0).single();
    }
  }

  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }

  for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%dT%H:%M%:z"] {
    if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
      return Some(dt.with_timezone(&Utc));
    }
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
  ] {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
      return Some(dt.and_utc());
    }
  }

  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn test_daily_key_is_iso_date() {
    let obs = DailyObservation::new(day(2024, 8, 1), 12.5, 24.0);
    assert_eq!(obs.natural_key(), "2024-08-01");
  }

  #[test]
  fn test_different_spellings_share_daily_key() {
    let inputs = [
      "2024-08-01",
      " 2024-08-01 ",
      "2024-08-01T00:00:00Z",
      "2024-08-01 00:00:00+00:00",
      "2024-08-01T00:00",
      "1722470400",
    ];
    for input in inputs {
      let obs = DailyObservation::from_date_str(input, 10.0, 20.0)
        .unwrap_or_else(|| panic!("failed to parse {input}"));
      assert_eq!(obs.natural_key(), "2024-08-01", "input {input}");
    }
  }

  #[test]
  fn test_offset_converted_to_utc_day() {
    let obs = DailyObservation::from_date_str("2024-07-31T22:00:00-04:00", 1.0, 2.0).unwrap();
    assert_eq!(obs.date, day(2024, 8, 1));
  }

  #[test]
  fn test_hourly_key_normalizes_precision() {
    let a = HourlyObservation::from_timestamp_str("2024-08-01T13:00", 20.0).unwrap();
    let b = HourlyObservation::from_timestamp_str("2024-08-01T15:00:00+02:00", 20.0).unwrap();
    assert_eq!(a.natural_key(), "2024-08-01T13:00:00Z");
    assert_eq!(a.natural_key(), b.natural_key());
  }

  #[test]
  fn test_unparseable_date_rejected() {
    assert!(DailyObservation::from_date_str("yesterday", 0.0, 0.0).is_none());
    assert!(parse_timestamp("").is_none());
    assert!(parse_date("2024-13-01").is_none());
  }

  #[test]
  fn test_min_above_max_is_representable() {
    let obs = DailyObservation::new(day(2024, 8, 1), 30.0, 10.0);
    assert!(obs.min_temperature > obs.max_temperature);
  }

  #[test]
  fn test_degraded_result_is_empty() {
    let result = FetchResult::degraded(SourceError::MalformedResponse("missing daily".into()));
    assert!(result.is_degraded());
    assert!(result.is_empty());
    assert!(result.into_observations().is_empty());
  }
}
