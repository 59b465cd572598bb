//! Error types for the fetch-and-store pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of an outbound request after the transport gave up on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
  #[error("network error: {0}")]
  Network(String),

  #[error("unexpected HTTP status {status}")]
  Status { status: u16 },

  #[error("request failed after {attempts} attempts")]
  RetriesExhausted {
    attempts: u32,
    #[source]
    source: Box<TransportError>,
  },
}

/// Why a live source could not produce observations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
  #[error(transparent)]
  Transport(#[from] TransportError),

  #[error("malformed weather response: {0}")]
  MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum FactoryError {
  #[error("unknown weather service kind '{kind}'")]
  UnknownServiceKind { kind: String },

  #[error("weather service kind '{kind}' requires a base URL")]
  MissingBaseUrl { kind: String },

  #[error("invalid base URL '{url}'")]
  InvalidBaseUrl {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("base URL '{url}' must use http or https")]
  UnsupportedScheme { url: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("failed to open observation store at '{}'", .path.display())]
  Open {
    path: PathBuf,
    #[source]
    source: rusqlite::Error,
  },

  #[error("failed to create store directory '{}'", .path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not determine a data directory for the observation store")]
  NoDataDir,

  #[error("observation store is closed")]
  Closed,

  #[error("failed to ensure store schema")]
  Schema(#[source] rusqlite::Error),

  #[error("failed to write observations")]
  Write(#[source] rusqlite::Error),

  #[error("failed to read observations")]
  Read(#[source] rusqlite::Error),

  #[error("failed to close observation store")]
  Close(#[source] rusqlite::Error),

  #[error("observation store lock poisoned")]
  LockPoisoned,
}

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("persisting observations failed")]
  Store(#[from] StoreError),
}
