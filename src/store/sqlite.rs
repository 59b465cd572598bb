//! SQLite observation store.

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::weather::{parse_date, parse_timestamp, DailyObservation, HourlyObservation, Observation};

use super::schema;
use super::ObservationStore;

/// SQLite-backed observation store.
pub struct SqliteStore {
  /// `None` once closed
  conn: Mutex<Option<Connection>>,
  path: Option<PathBuf>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open_default() -> Result<Self, StoreError> {
    Self::open(&Self::default_path()?)
  }

  /// Open or create the store at `path` and ensure its schema.
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    let conn = Connection::open(path).map_err(|source| StoreError::Open {
      path: path.to_path_buf(),
      source,
    })?;

    Self::with_connection(conn, Some(path.to_path_buf()))
  }

  /// Store that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self, StoreError> {
    let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
      path: PathBuf::from(":memory:"),
      source,
    })?;
    Self::with_connection(conn, None)
  }

  fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
    let store = Self {
      conn: Mutex::new(Some(conn)),
      path,
    };
    store.ensure_schema()?;
    Ok(store)
  }

  /// Get the default database path
  pub fn default_path() -> Result<PathBuf, StoreError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StoreError::NoDataDir)?;

    Ok(data_dir.join("weather-ingest").join("weather_data_storage.db"))
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  fn with_conn<T>(
    &self,
    f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
  ) -> Result<T, StoreError> {
    let mut guard = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
    let conn = guard.as_mut().ok_or(StoreError::Closed)?;
    f(conn)
  }
}

impl ObservationStore for SqliteStore {
  fn ensure_schema(&self) -> Result<(), StoreError> {
    self.with_conn(|conn| {
      conn
        .execute_batch(schema::SCHEMA)
        .map_err(StoreError::Schema)
    })
  }

  fn upsert(&self, observations: &[Observation]) -> Result<usize, StoreError> {
    self.with_conn(|conn| {
      let tx = conn.transaction().map_err(StoreError::Write)?;
      {
        let mut daily = tx
          .prepare_cached(schema::UPSERT_DAILY)
          .map_err(StoreError::Write)?;
        let mut hourly = tx
          .prepare_cached(schema::UPSERT_HOURLY)
          .map_err(StoreError::Write)?;

        for observation in observations {
          let written = match observation {
            Observation::Daily(d) => daily.execute(params![
              d.natural_key(),
              d.min_temperature,
              d.max_temperature
            ]),
            Observation::Hourly(h) => hourly.execute(params![h.natural_key(), h.temperature]),
          };
          written.map_err(StoreError::Write)?;
        }
      }
      // Dropping the transaction on an early return rolls the batch back
      tx.commit().map_err(StoreError::Write)?;

      tracing::debug!("Upserted {} observations", observations.len());
      Ok(observations.len())
    })
  }

  fn read_all(&self) -> Result<Vec<Observation>, StoreError> {
    self.with_conn(|conn| {
      let mut observations = Vec::new();

      let mut stmt = conn.prepare(schema::SELECT_DAILY).map_err(StoreError::Read)?;
      let rows = stmt
        .query_map([], |row| {
          Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<f64>>(1)?,
            row.get::<_, Option<f64>>(2)?,
          ))
        })
        .map_err(StoreError::Read)?;
      for row in rows {
        let (key, min, max) = row.map_err(StoreError::Read)?;
        match parse_date(&key) {
          // SQLite stores NaN as NULL
          Some(date) => observations.push(
            DailyObservation::new(date, min.unwrap_or(f64::NAN), max.unwrap_or(f64::NAN)).into(),
          ),
          None => tracing::warn!("Skipping daily row with unreadable key '{}'", key),
        }
      }

      let mut stmt = conn.prepare(schema::SELECT_HOURLY).map_err(StoreError::Read)?;
      let rows = stmt
        .query_map([], |row| {
          Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?))
        })
        .map_err(StoreError::Read)?;
      for row in rows {
        let (key, temperature) = row.map_err(StoreError::Read)?;
        match parse_timestamp(&key) {
          Some(ts) => observations
            .push(HourlyObservation::new(ts, temperature.unwrap_or(f64::NAN)).into()),
          None => tracing::warn!("Skipping hourly row with unreadable key '{}'", key),
        }
      }

      Ok(observations)
    })
  }

  fn close(&self) -> Result<(), StoreError> {
    let mut guard = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
    match guard.take() {
      Some(conn) => conn.close().map_err(|(_, e)| StoreError::Close(e)),
      None => Ok(()),
    }
  }
}
