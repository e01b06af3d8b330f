//! TTL + LRU cache with a stale grace window.
//!
//! An entry is fresh until `expires_at`, then servable as stale for
//! `stale_grace` more, then dropped on the next access. Capacity overflow evicts
//! the least recently accessed entry.

use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: Instant,
    pub expires_at: Instant,
    pub hit_count: u64,
}

/// A cache lookup that found a servable entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    pub value: T,
    /// Past `expires_at` but inside the grace window
    pub stale: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
}

/// Longest TTL or grace period a cache honours. Longer values are cut to this
/// so expiry deadlines stay representable.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub struct Cache<T> {
    inner: Mutex<LruCache<String, CacheEntry<T>>>,
    default_ttl: Duration,
    stale_grace: Duration,
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone> Cache<T> {
    pub fn new(max_size: usize, default_ttl: Duration, stale_grace: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            default_ttl: default_ttl.min(MAX_TTL),
            stale_grace: stale_grace.min(MAX_TTL),
            hits: AtomicU64::new(0),
            stale_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up `key`, promoting it in LRU order when found.
    pub fn get(&self, key: &str) -> Option<CacheHit<T>> {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let lookup = inner.get_mut(key).map(|entry| {
            if now < entry.expires_at + self.stale_grace {
                entry.hit_count += 1;
                Some(CacheHit {
                    value: entry.value.clone(),
                    stale: now >= entry.expires_at,
                })
            } else {
                None
            }
        });
        let hit = match lookup {
            Some(Some(hit)) => Some(hit),
            Some(None) => {
                inner.pop(key);
                debug!(target: "delve.cache", key, "expired entry evicted");
                None
            }
            None => None,
        };
        drop(inner);

        match &hit {
            Some(h) if h.stale => self.stale_hits.fetch_add(1, Ordering::Relaxed),
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }

    /// Store `value`, using the cache's default TTL when `ttl` is `None`.
    pub fn set(&self, key: impl Into<String>, value: T, ttl: Option<Duration>) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            stored_at: now,
            expires_at: now + ttl.unwrap_or(self.default_ttl).min(MAX_TTL),
            hit_count: 0,
        };
        let key = key.into();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((evicted, _)) = inner.push(key.clone(), entry) {
            if evicted != key {
                debug!(target: "delve.cache", key = %evicted, "lru eviction");
            }
        }
    }

    /// Copy of the raw entry, without touching LRU order or counters.
    pub fn peek_entry(&self, key: &str) -> Option<CacheEntry<T>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.peek(key).cloned()
    }

    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pop(key).is_some()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            size: inner.len(),
            capacity: inner.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max: usize) -> Cache<String> {
        Cache::new(max, Duration::from_millis(100), Duration::from_millis(200))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_then_stale_then_gone() {
        let cache = cache(10);
        cache.set("q", "v".to_string(), Some(Duration::from_millis(100)));

        tokio::time::advance(Duration::from_millis(50)).await;
        let hit = cache.get("q").unwrap();
        assert!(!hit.stale);
        assert_eq!(hit.value, "v");

        tokio::time::advance(Duration::from_millis(100)).await; // t = 150ms
        let hit = cache.get("q").unwrap();
        assert!(hit.stale);

        tokio::time::advance(Duration::from_millis(201)).await; // t = 150 + grace + 1
        assert!(cache.get("q").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_boundary_is_exclusive() {
        let cache = cache(10);
        cache.set("q", "v".to_string(), None);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(cache.get("q").unwrap().stale);

        tokio::time::advance(Duration::from_millis(200)).await; // exactly expires + grace
        assert!(cache.get("q").is_none());
    }

    #[test]
    fn test_lru_eviction_follows_access_order() {
        let cache = cache(2);
        cache.set("a", "1".to_string(), None);
        cache.set("b", "2".to_string(), None);

        // Touch "a" so "b" becomes least recently used
        assert!(cache.get("a").is_some());
        cache.set("c", "3".to_string(), None);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_hit_count_and_stats() {
        let cache = cache(4);
        cache.set("k", "v".to_string(), None);
        cache.get("k");
        cache.get("k");
        cache.get("missing");

        assert_eq!(cache.peek_entry("k").unwrap().hit_count, 2);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.capacity, 4);
    }

    #[test]
    fn test_overwrite_resets_entry() {
        let cache = cache(4);
        cache.set("k", "old".to_string(), None);
        cache.get("k");
        cache.set("k", "new".to_string(), None);

        let entry = cache.peek_entry("k").unwrap();
        assert_eq!(entry.value, "new");
        assert_eq!(entry.hit_count, 0);
        assert!(cache.invalidate("k"));
        assert!(!cache.invalidate("k"));
    }

    #[tokio::test]
    async fn test_oversized_ttl_is_capped() {
        let cache: Cache<String> = Cache::new(4, Duration::MAX, Duration::MAX);
        cache.set("k", "v".to_string(), None);
        cache.set("j", "w".to_string(), Some(Duration::from_secs(u64::MAX)));

        let hit = cache.get("k").unwrap();
        assert!(!hit.stale);
        let entry = cache.peek_entry("j").unwrap();
        assert!(entry.expires_at - entry.stored_at <= MAX_TTL);
    }
}
