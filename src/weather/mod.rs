//! Weather sources and the observation records they produce.

pub mod api_types;
mod factory;
mod source;
mod types;

pub use factory::SourceFactory;
pub use source::{LiveSource, MockSource, WeatherSource, DAILY_LOOKBACK_DAYS};
pub use types::{
  parse_date, parse_timestamp, DailyObservation, FetchResult, Granularity, HourlyObservation,
  Observation,
};
