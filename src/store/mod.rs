//! Durable, keyed storage for observations.

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::weather::Observation;

/// Keyed observation storage with last-write-wins upserts.
pub trait ObservationStore: Send + Sync {
  /// Create the tables if they do not exist yet. Safe to call repeatedly.
  fn ensure_schema(&self) -> Result<(), StoreError>;

  /// Insert or replace every observation by its natural key.
  ///
  /// The batch is applied atomically. Returns the number of rows written.
  fn upsert(&self, observations: &[Observation]) -> Result<usize, StoreError>;

  /// Everything stored so far, in no particular order.
  fn read_all(&self) -> Result<Vec<Observation>, StoreError>;

  /// Release the underlying resource. Later calls fail with [`StoreError::Closed`].
  fn close(&self) -> Result<(), StoreError>;
}
