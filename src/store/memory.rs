//! In-memory observation store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::weather::{DailyObservation, HourlyObservation, Observation};

use super::ObservationStore;

#[derive(Default)]
struct Tables {
  daily: BTreeMap<String, DailyObservation>,
  hourly: BTreeMap<String, HourlyObservation>,
}

/// In-process store with the same keying and close semantics as
/// [`SqliteStore`](super::SqliteStore).
pub struct MemoryStore {
  tables: Mutex<Option<Tables>>,
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self {
      tables: Mutex::new(Some(Tables::default())),
    }
  }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T, StoreError> {
    let mut guard = self.tables.lock().map_err(|_| StoreError::LockPoisoned)?;
    let tables = guard.as_mut().ok_or(StoreError::Closed)?;
    Ok(f(tables))
  }
}

impl ObservationStore for MemoryStore {
  fn ensure_schema(&self) -> Result<(), StoreError> {
    self.with_tables(|_| ())
  }

  fn upsert(&self, observations: &[Observation]) -> Result<usize, StoreError> {
    // Holding the lock for the whole batch keeps it atomic for readers
    self.with_tables(|tables| {
      for observation in observations {
        match observation {
          Observation::Daily(d) => {
            tables.daily.insert(d.natural_key(), *d);
          }
          Observation::Hourly(h) => {
            tables.hourly.insert(h.natural_key(), *h);
          }
        }
      }
      observations.len()
    })
  }

  fn read_all(&self) -> Result<Vec<Observation>, StoreError> {
    self.with_tables(|tables| {
      tables
        .daily
        .values()
        .copied()
        .map(Observation::from)
        .chain(tables.hourly.values().copied().map(Observation::from))
        .collect()
    })
  }

  fn close(&self) -> Result<(), StoreError> {
    let mut guard = self.tables.lock().map_err(|_| StoreError::LockPoisoned)?;
    guard.take();
    Ok(())
  }
}
