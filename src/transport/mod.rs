//! Resilient outbound transport: response caching plus bounded retry.

mod executor;
mod request;
mod retry;

pub use executor::{HttpExecutor, ReqwestExecutor};
pub use request::{TransportRequest, TransportResponse};
pub use retry::{
  RetryPolicy, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_SECS,
};

use std::sync::Arc;

use crate::cache::{CacheLayer, CacheResult};
use crate::error::TransportError;

/// Wraps an [`HttpExecutor`] with an optional response cache and a retry policy.
///
/// A fresh cache hit returns before any attempt is made. On a miss the retry
/// loop runs to completion and only a successful response is cached.
pub struct ResilientTransport {
  executor: Arc<dyn HttpExecutor>,
  cache: Option<CacheLayer>,
  retry: RetryPolicy,
}

impl ResilientTransport {
  /// Transport with the default retry policy and no cache.
  pub fn new(executor: Arc<dyn HttpExecutor>) -> Self {
    Self {
      executor,
      cache: None,
      retry: RetryPolicy::default(),
    }
  }

  pub fn with_cache(mut self, cache: CacheLayer) -> Self {
    self.cache = Some(cache);
    self
  }

  pub fn without_cache(mut self) -> Self {
    self.cache = None;
    self
  }

  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn retry_policy(&self) -> &RetryPolicy {
    &self.retry
  }

  pub fn cache(&self) -> Option<&CacheLayer> {
    self.cache.as_ref()
  }

  /// Execute `request`, serving from cache when possible.
  pub async fn execute(
    &self,
    request: &TransportRequest,
  ) -> Result<CacheResult<TransportResponse>, TransportError> {
    match &self.cache {
      Some(cache) => {
        let url = request.url();
        cache
          .fetch(&request.signature(), url.as_str(), || self.attempt(request))
          .await
      }
      None => self.attempt(request).await.map(CacheResult::from_network),
    }
  }

  async fn attempt(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
    tracing::debug!("GET {}", request.url());
    self.retry.run(|| self.executor.execute(request)).await
  }
}


#[cfg(test)]
mod tests {
  use super::testing::ScriptedExecutor;
  use super::*;
  use crate::cache::MemoryResponseCache;
  use url::Url;

  fn request(lat: f64) -> TransportRequest {
    TransportRequest::get(Url::parse("https://api.open-meteo.com/v1/forecast").unwrap())
      .param("latitude", lat)
      .param("longitude", 13.41)
  }

  fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(DEFAULT_MAX_ATTEMPTS, 0.0)
  }

  fn cached(executor: Arc<ScriptedExecutor>) -> ResilientTransport {
    ResilientTransport::new(executor)
      .with_retry(fast_retry())
      .with_cache(CacheLayer::new(Arc::new(MemoryResponseCache::new())))
  }

  #[tokio::test]
  async fn test_identical_requests_hit_network_once() {
    let executor = Arc::new(ScriptedExecutor::always(Ok(TransportResponse::new(200, "{}"))));
    let transport = cached(executor.clone());

    let first = transport.execute(&request(52.52)).await.unwrap();
    let second = transport.execute(&request(52.52)).await.unwrap();

    assert!(!first.is_cached());
    assert!(second.is_cached());
    assert_eq!(executor.calls(), 1);
  }

  #[tokio::test]
  async fn test_different_requests_not_shared() {
    let executor = Arc::new(ScriptedExecutor::always(Ok(TransportResponse::new(200, "{}"))));
    let transport = cached(executor.clone());

    transport.execute(&request(52.52)).await.unwrap();
    transport.execute(&request(48.85)).await.unwrap();

    assert_eq!(executor.calls(), 2);
  }

  #[tokio::test]
  async fn test_four_failures_then_success() {
    let mut script: Vec<_> = (0..4)
      .map(|_| Err(TransportError::Network("reset".into())))
      .collect();
    script.push(Ok(TransportResponse::new(200, "ok")));
    let executor = Arc::new(ScriptedExecutor::new(script));
    let transport = cached(executor.clone());

    let result = transport.execute(&request(1.0)).await.unwrap();
    assert_eq!(result.data.body, b"ok");
    assert_eq!(executor.calls(), 5);
  }

  #[tokio::test]
  async fn test_five_failures_surface_transport_error() {
    let executor = Arc::new(ScriptedExecutor::always(Ok(TransportResponse::new(500, ""))));
    let transport = cached(executor.clone());

    let err = transport.execute(&request(1.0)).await.unwrap_err();
    assert!(matches!(err, TransportError::RetriesExhausted { attempts: 5, .. }));
    assert_eq!(executor.calls(), 5);
  }

  #[tokio::test]
  async fn test_cache_hit_skips_retry_loop() {
    let executor = Arc::new(ScriptedExecutor::new(vec![
      Ok(TransportResponse::new(200, "first")),
      Err(TransportError::Network("down".into())),
    ]));
    let transport = cached(executor.clone());

    transport.execute(&request(1.0)).await.unwrap();
    let again = transport.execute(&request(1.0)).await.unwrap();

    assert_eq!(again.data.body, b"first");
    assert_eq!(executor.calls(), 1);
  }

  #[tokio::test]
  async fn test_without_cache_always_calls_network() {
    let executor = Arc::new(ScriptedExecutor::always(Ok(TransportResponse::new(200, "{}"))));
    let transport = ResilientTransport::new(executor.clone())
      .with_retry(fast_retry())
      .without_cache();

    transport.execute(&request(1.0)).await.unwrap();
    transport.execute(&request(1.0)).await.unwrap();

    assert_eq!(executor.calls(), 2);
  }
}
