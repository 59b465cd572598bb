//! Fetch temperature observations from Open-Meteo and keep them in SQLite.
//!
//! A [`WeatherSource`] (live API or mock) produces observations, a
//! [`ResilientTransport`] adds response caching and retry to the live
//! source, and an [`ObservationStore`] upserts them keyed by date. The
//! [`Pipeline`] ties one fetch to one write.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod store;
pub mod transport;
pub mod weather;

pub use config::Config;
pub use error::{FactoryError, PipelineError, SourceError, StoreError, TransportError};
pub use pipeline::{Pipeline, PipelineReport, PipelineState};
pub use store::{MemoryStore, ObservationStore, SqliteStore};
pub use transport::{ResilientTransport, RetryPolicy};
pub use weather::{
  DailyObservation, FetchResult, Granularity, HourlyObservation, LiveSource, MockSource,
  Observation, SourceFactory, WeatherSource,
};
