//! Cache storage trait and its backends.

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::CachedResponse;

/// Trait for response cache backends.
///
/// Backends only store and return entries; freshness is decided by the
/// [`CacheLayer`](super::CacheLayer).
pub trait ResponseCache: Send + Sync {
  /// Get the entry stored for a request signature.
  fn get(&self, signature: &str) -> Result<Option<CachedResponse>>;

  /// Store (or replace) the entry for a request signature.
  fn put(&self, signature: &str, url: &str, response: &CachedResponse) -> Result<()>;

  /// Drop entries cached before `cutoff`. Returns how many were removed.
  fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Storage implementation that doesn't cache anything.
pub struct NoopResponseCache;

impl ResponseCache for NoopResponseCache {
  fn get(&self, _signature: &str) -> Result<Option<CachedResponse>> {
    Ok(None) // Always miss
  }

  fn put(&self, _signature: &str, _url: &str, _response: &CachedResponse) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove_older_than(&self, _cutoff: DateTime<Utc>) -> Result<usize> {
    Ok(0)
  }
}

/// Process-local cache, lost on exit.
#[derive(Default)]
pub struct MemoryResponseCache {
  entries: Mutex<HashMap<String, CachedResponse>>,
}

impl MemoryResponseCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().map(|e| e.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl ResponseCache for MemoryResponseCache {
  fn get(&self, signature: &str) -> Result<Option<CachedResponse>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(signature).cloned())
  }

  fn put(&self, signature: &str, _url: &str, response: &CachedResponse) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(signature.to_string(), response.clone());
    Ok(())
  }

  fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let before = entries.len();
    entries.retain(|_, r| r.cached_at >= cutoff);
    Ok(before - entries.len())
  }
}

/// SQLite-based cache storage, persisted across runs.
pub struct SqliteResponseCache {
  conn: Mutex<Connection>,
}

impl SqliteResponseCache {
  /// Open the cache at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .ok_or_else(|| eyre!("Could not determine cache directory"))?;

    Ok(cache_dir.join("weather-ingest").join("http_cache.sqlite"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    signature TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_response_cache_cached_at
    ON response_cache(cached_at);
"#;

impl ResponseCache for SqliteResponseCache {
  fn get(&self, signature: &str) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(u16, Vec<u8>, String)> = conn
      .query_row(
        "SELECT status, body, cached_at FROM response_cache WHERE signature = ?",
        params![signature],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))?;

    match row {
      Some((status, body, cached_at)) => Ok(Some(CachedResponse {
        status,
        body,
        cached_at: parse_datetime(&cached_at)?,
      })),
      None => Ok(None),
    }
  }

  fn put(&self, signature: &str, url: &str, response: &CachedResponse) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache (signature, url, status, body, cached_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
          signature,
          url,
          response.status,
          response.body,
          format_datetime(response.cached_at)
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn remove_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // Fixed-width UTC timestamps sort chronologically
    let removed = conn
      .execute(
        "DELETE FROM response_cache WHERE cached_at < ?",
        params![format_datetime(cutoff)],
      )
      .map_err(|e| eyre!("Failed to purge cache: {}", e))?;

    Ok(removed)
  }
}

fn format_datetime(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a datetime string as written by `put`.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
