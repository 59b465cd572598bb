//! Response cache for outbound weather requests.
//!
//! This module provides a time-bounded cache of HTTP responses that:
//! - Keys entries by request signature (SHA-256 of the canonical request)
//! - Serves entries younger than the freshness window without touching the network
//! - Allows a single in-flight fetch per signature
//! - Never fails a request because the cache itself misbehaved

mod layer;
mod storage;
mod traits;

pub use layer::{CacheLayer, DEFAULT_EXPIRE_AFTER_SECS};
pub use storage::{MemoryResponseCache, NoopResponseCache, ResponseCache, SqliteResponseCache};
pub use traits::{CacheResult, CacheSource, CachedResponse};
