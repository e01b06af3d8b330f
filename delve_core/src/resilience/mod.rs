//! Resilience primitives used around every provider call.
//!
//! - `Cache`: TTL + LRU with a stale grace window
//! - `RequestDeduplicator`: one in-flight fetch per key
//! - `CircuitBreaker` / `CircuitBreakers`: per-backend failure isolation
//! - `RetryPolicy`: exponential backoff with jitter for transient errors
//! - `Revalidator`: bounded background refresh of stale entries
//!
//! None of these know about providers or classification.

mod cache;
mod circuit;
mod dedup;
mod retry;
mod revalidate;

pub use cache::{Cache, CacheEntry, CacheHit, CacheStats};
pub use circuit::{BreakerSettings, CircuitBreaker, CircuitBreakers, CircuitError, CircuitState};
pub use dedup::RequestDeduplicator;
pub use retry::{RetryPolicy, Retryable};
pub use revalidate::Revalidator;
