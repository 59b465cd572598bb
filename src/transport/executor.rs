//! Single-attempt HTTP execution.

use futures::future::BoxFuture;
use std::time::Duration;

use crate::error::TransportError;

use super::request::{TransportRequest, TransportResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs a single network attempt.
///
/// Any status code is a successful exchange at this level; classifying
/// statuses is left to the retry policy.
pub trait HttpExecutor: Send + Sync {
  fn execute<'a>(
    &'a self,
    request: &'a TransportRequest,
  ) -> BoxFuture<'a, Result<TransportResponse, TransportError>>;
}

/// reqwest-backed executor
#[derive(Clone)]
pub struct ReqwestExecutor {
  client: reqwest::Client,
}

impl ReqwestExecutor {
  pub fn new() -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {}", e)))?;

    Ok(Self { client })
  }

  pub fn with_client(client: reqwest::Client) -> Self {
    Self { client }
  }
}

impl HttpExecutor for ReqwestExecutor {
  fn execute<'a>(
    &'a self,
    request: &'a TransportRequest,
  ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
    Box::pin(async move {
      let response = self
        .client
        .get(request.url())
        .send()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;

      let status = response.status().as_u16();
      let body = response
        .bytes()
        .await
        .map_err(|e| TransportError::Network(format!("failed to read body: {}", e)))?;

      Ok(TransportResponse::new(status, body.to_vec()))
    })
  }
}
