//! Bounded retry with exponential backoff.
//!
//! Every failure is treated as transient:
//! - Network errors (connect, timeout, reset, body read)
//! - Any non-2xx status
//!
//! The operation is attempted at most `max_attempts` times in total.

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

use super::request::TransportResponse;

/// Default retry configuration
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 0.2;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  /// Total attempts including the first one
  pub max_attempts: u32,
  /// Seconds to wait before the first retry (doubles each retry)
  pub backoff_factor: f64,
  /// Upper bound for a single wait
  pub max_backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: DEFAULT_MAX_ATTEMPTS,
      backoff_factor: DEFAULT_BACKOFF_FACTOR,
      max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
    }
  }
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, backoff_factor: f64) -> Self {
    Self {
      max_attempts: max_attempts.max(1),
      backoff_factor,
      ..Self::default()
    }
  }

  /// A policy that makes exactly one attempt.
  pub fn no_retry() -> Self {
    Self::new(1, 0.0)
  }

  /// Delay before retry number `retry` (1-based):
  /// `backoff_factor * 2^(retry - 1)` seconds, capped at `max_backoff`.
  pub fn delay_for_retry(&self, retry: u32) -> Duration {
    if retry == 0 || self.backoff_factor <= 0.0 {
      return Duration::ZERO;
    }
    let factor = 2f64.powi(retry.saturating_sub(1).min(62) as i32);
    let secs = self.backoff_factor * factor;
    if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
      return self.max_backoff;
    }
    Duration::from_secs_f64(secs)
  }

  /// Run `operation` until it yields a 2xx response or attempts run out.
  pub async fn run<F, Fut>(&self, operation: F) -> Result<TransportResponse, TransportError>
  where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<TransportResponse, TransportError>>,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut last_error = TransportError::Network("no attempt made".into());

    for attempt in 1..=max_attempts {
      if attempt > 1 {
        let delay = self.delay_for_retry(attempt - 1);
        tracing::info!(
          "Retry attempt {} of {}, waiting {:?}",
          attempt,
          max_attempts,
          delay
        );
        tokio::time::sleep(delay).await;
      }

      match operation().await {
        Ok(response) if response.is_success() => {
          if attempt > 1 {
            tracing::info!("Request succeeded after {} retries", attempt - 1);
          }
          return Ok(response);
        }
        Ok(response) => {
          tracing::warn!(
            "Request returned status {}, attempt {} of {}",
            response.status,
            attempt,
            max_attempts
          );
          last_error = TransportError::Status {
            status: response.status,
          };
        }
        Err(e) => {
          tracing::warn!(
            "Request failed on attempt {} of {}: {}",
            attempt,
            max_attempts,
            e
          );
          last_error = e;
        }
      }
    }

    tracing::error!("All {} attempts exhausted", max_attempts);
    Err(TransportError::RetriesExhausted {
      attempts: max_attempts,
      source: Box::new(last_error),
    })
  }
}
