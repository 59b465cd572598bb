//! Outbound request description and its cache signature.

use sha2::{Digest, Sha256};
use url::{form_urlencoded, Url};

/// A GET request against the weather provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
  base_url: Url,
  params: Vec<(String, String)>,
}

impl TransportRequest {
  pub fn get(base_url: Url) -> Self {
    Self {
      base_url,
      params: Vec::new(),
    }
  }

  /// Append a query parameter.
  pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
    self.params.push((key.into(), value.to_string()));
    self
  }

  pub fn params(&self) -> &[(String, String)] {
    &self.params
  }

  /// Full URL with every parameter appended, in insertion order.
  pub fn url(&self) -> Url {
    let mut url = self.base_url.clone();
    if !self.params.is_empty() {
      url
        .query_pairs_mut()
        .extend_pairs(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    url
  }

  /// Stable key for the response cache.
  ///
  /// Parameter order does not matter: pairs (including any already on the
  /// base URL) are sorted before hashing.
  pub fn signature(&self) -> String {
    let url = self.url();

    let mut pairs: Vec<(String, String)> = url
      .query_pairs()
      .map(|(k, v)| (k.into_owned(), v.into_owned()))
      .collect();
    pairs.sort();

    let mut without_query = url.clone();
    without_query.set_query(None);
    without_query.set_fragment(None);

    let query = form_urlencoded::Serializer::new(String::new())
      .extend_pairs(pairs)
      .finish();
    let input = format!("GET {}?{}", without_query, query);

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

impl TransportResponse {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      body: body.into(),
    }
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}
