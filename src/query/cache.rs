//! TTL result cache keyed by normalized query text and graph scope.
//!
//! Entries live in a [`DashMap`], so the cache is synchronized independently of
//! the triple-store lock. Only successful outcomes are cached. When the cache is
//! full the entry with the oldest `cached_at` is evicted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::QueryOutcome;

/// Cache key: whitespace-normalized query text plus the include-inferred flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    include_inferred: bool,
}

impl CacheKey {
    pub fn new(query: &str, include_inferred: bool) -> Self {
        Self {
            query: query.split_whitespace().collect::<Vec<_>>().join(" "),
            include_inferred,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Debug)]
struct CachedQuery {
    outcome: Arc<QueryOutcome>,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedQuery {
    fn is_fresh(&self) -> bool {
        self.cached_at.elapsed() < self.ttl
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Queries actually evaluated (cache misses plus uncached calls).
    pub executions: u64,
}

#[derive(Debug)]
pub struct QueryCache {
    entries: DashMap<CacheKey, CachedQuery>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A fresh cached outcome. An expired entry is evicted and counts as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<QueryOutcome>> {
        let lookup = self
            .entries
            .get(key)
            .map(|entry| entry.is_fresh().then(|| Arc::clone(&entry.outcome)));
        match lookup {
            Some(Some(outcome)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(query = key.query(), "query cache hit");
                Some(outcome)
            }
            Some(None) => {
                self.entries.remove_if(key, |_, entry| !entry.is_fresh());
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(query = key.query(), "evicted expired cache entry");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a successful outcome. A zero TTL disables caching for the call.
    pub fn insert(&self, key: CacheKey, outcome: Arc<QueryOutcome>, ttl: Duration) {
        if ttl.is_zero() || !outcome.success {
            return;
        }
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CachedQuery {
                outcome,
                cached_at: Instant::now(),
                ttl,
            },
        );
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.cached_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            tracing::debug!(query = key.query(), "evicted oldest cache entry");
        }
    }

    /// When the entry for `key` was cached, if present.
    pub fn cached_at(&self, key: &CacheKey) -> Option<Instant> {
        self.entries.get(key).map(|entry| entry.cached_at)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(super) fn counters(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(count: usize) -> Arc<QueryOutcome> {
        Arc::new(QueryOutcome {
            success: true,
            rows: Vec::new(),
            count,
            elapsed_ms: 0,
            error: None,
        })
    }

    #[test]
    fn key_normalizes_whitespace() {
        assert_eq!(
            CacheKey::new("SELECT  ?x\n WHERE { ?x ?p ?o }", true),
            CacheKey::new("SELECT ?x WHERE { ?x ?p ?o }", true)
        );
        assert_ne!(
            CacheKey::new("SELECT ?x WHERE {}", true),
            CacheKey::new("SELECT ?x WHERE {}", false)
        );
    }

    #[test]
    fn hit_returns_same_object() {
        let cache = QueryCache::new(8);
        let key = CacheKey::new("q", true);
        let stored = outcome(3);
        cache.insert(key.clone(), Arc::clone(&stored), Duration::from_secs(60));
        let hit = cache.get(&key).unwrap();
        assert!(Arc::ptr_eq(&hit, &stored));
        assert_eq!(cache.counters(), (1, 0));
    }

    #[test]
    fn expired_entry_is_evicted() {
        let cache = QueryCache::new(8);
        let key = CacheKey::new("q", true);
        cache.insert(key.clone(), outcome(1), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = QueryCache::new(8);
        let failed = Arc::new(QueryOutcome::failure("boom".into(), 0));
        cache.insert(CacheKey::new("q", true), failed, Duration::from_secs(60));
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_evicts_oldest() {
        let cache = QueryCache::new(2);
        cache.insert(CacheKey::new("a", true), outcome(1), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(CacheKey::new("b", true), outcome(2), Duration::from_secs(60));
        cache.insert(CacheKey::new("c", true), outcome(3), Duration::from_secs(60));
        assert_eq!(cache.len(), 2);
        assert!(cache.cached_at(&CacheKey::new("a", true)).is_none());
        assert!(cache.cached_at(&CacheKey::new("c", true)).is_some());
    }
}
