//! Cache layer that decides freshness and coordinates network fetches.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::TransportError;
use crate::transport::TransportResponse;

use super::storage::ResponseCache;
use super::traits::{CacheResult, CachedResponse};

pub const DEFAULT_EXPIRE_AFTER_SECS: i64 = 3600;

/// Cache layer that manages freshness and network fetching.
///
/// Fresh entries are served without calling the fetcher. On a miss, only
/// one fetch per signature runs at a time; callers queued behind it pick up
/// the entry it stored.
pub struct CacheLayer {
  storage: Arc<dyn ResponseCache>,
  /// How long a stored response stays fresh
  expire_after: Duration,
  in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: Arc<dyn ResponseCache>) -> Self {
    Self {
      storage,
      expire_after: Duration::seconds(DEFAULT_EXPIRE_AFTER_SECS),
      in_flight: Mutex::new(HashMap::new()),
    }
  }

  /// Set the freshness window for cached responses.
  pub fn with_expire_after(mut self, expire_after: Duration) -> Self {
    self.expire_after = expire_after;
    self
  }

  pub fn expire_after(&self) -> Duration {
    self.expire_after
  }

  fn is_fresh(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at < self.expire_after
  }

  /// Look up a fresh entry. Storage failures count as a miss.
  fn lookup_fresh(&self, signature: &str) -> Option<CacheResult<TransportResponse>> {
    match self.storage.get(signature) {
      Ok(Some(cached)) if self.is_fresh(cached.cached_at) => Some(CacheResult::from_cache(
        TransportResponse::new(cached.status, cached.body),
        cached.cached_at,
      )),
      Ok(_) => None,
      Err(e) => {
        tracing::warn!("Response cache read failed, treating as miss: {:#}", e);
        None
      }
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Fresh entry - return immediately
  /// 2. Otherwise take the per-signature gate and check again
  /// 3. Still missing or expired - run the fetcher
  /// 4. Store successful responses
  pub async fn fetch<F, Fut>(
    &self,
    signature: &str,
    url: &str,
    fetcher: F,
  ) -> Result<CacheResult<TransportResponse>, TransportError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<TransportResponse, TransportError>>,
  {
    if let Some(hit) = self.lookup_fresh(signature) {
      tracing::debug!("Response cache hit for {}", url);
      return Ok(hit);
    }

    let in_flight = InFlight::enter(self, signature);
    let _guard = in_flight.gate.lock().await;

    // Another caller may have populated the entry while we waited
    if let Some(hit) = self.lookup_fresh(signature) {
      return Ok(hit);
    }

    let response = fetcher().await?;
    if response.is_success() {
      self.store(signature, url, &response);
    }
    Ok(CacheResult::from_network(response))
  }

  fn store(&self, signature: &str, url: &str, response: &TransportResponse) {
    let entry = CachedResponse {
      status: response.status,
      body: response.body.clone(),
      cached_at: Utc::now(),
    };
    if let Err(e) = self.storage.put(signature, url, &entry) {
      tracing::warn!("Failed to store response in cache: {:#}", e);
    }
  }

  /// Remove entries that can no longer be served.
  pub fn purge_expired(&self) -> usize {
    // A window reaching past the representable range expires nothing
    let Some(cutoff) = Utc::now().checked_sub_signed(self.expire_after) else {
      return 0;
    };
    match self.storage.remove_older_than(cutoff) {
      Ok(n) => n,
      Err(e) => {
        tracing::warn!("Failed to purge response cache: {:#}", e);
        0
      }
    }
  }

  fn gates(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
    match self.in_flight.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  #[cfg(test)]
  fn in_flight_len(&self) -> usize {
    self.gates().len()
  }
}

/// Holds a signature's gate for one `fetch` call. Dropping it, also on
/// cancellation, removes the map entry once no other caller shares it.
struct InFlight<'a> {
  layer: &'a CacheLayer,
  signature: &'a str,
  gate: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> InFlight<'a> {
  fn enter(layer: &'a CacheLayer, signature: &'a str) -> Self {
    let gate = Arc::clone(layer.gates().entry(signature.to_string()).or_default());
    Self {
      layer,
      signature,
      gate,
    }
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    let mut gates = self.layer.gates();
    // Held only by the map and this guard: nobody else is waiting
    if gates
      .get(self.signature)
      .is_some_and(|g| Arc::strong_count(g) == 2)
    {
      gates.remove(self.signature);
    }
  }
}
