//! Read-only query execution with a TTL result cache.
//!
//! Caller-supplied SPARQL text is trusted to be read-only (mutation forms are
//! rejected upstream) and is evaluated against an oxigraph snapshot of the
//! store. Execution never fails outward: a malformed query yields a
//! [`QueryOutcome`] with `success = false`.

pub mod cache;
pub mod templates;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::index::TripleStore;
use crate::graph::sparql::{Row, SparqlSnapshot};

pub use cache::{CacheKey, CacheStats, QueryCache};
pub use templates::Position;

/// Default cache TTL (five minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Per-call query options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub use_cache: bool,
    /// Evaluate against base ∪ inferred (`true`) or the base graph only.
    pub include_inferred: bool,
    pub ttl: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            include_inferred: true,
            ttl: DEFAULT_TTL,
        }
    }
}

impl QueryOptions {
    pub fn with_ttl_secs(mut self, secs: u64) -> Self {
        self.ttl = Duration::from_secs(secs);
        self
    }

    pub fn base_only(mut self) -> Self {
        self.include_inferred = false;
        self
    }

    pub fn uncached(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

/// Structured result of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub success: bool,
    pub rows: Vec<Row>,
    pub count: usize,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn failure(error: String, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            count: 0,
            elapsed_ms,
            error: Some(error),
        }
    }
}

/// A query outcome and whether it was served from the cache.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub outcome: Arc<QueryOutcome>,
    pub from_cache: bool,
}

impl QueryResponse {
    pub(crate) fn failed(error: impl ToString) -> Self {
        Self {
            outcome: Arc::new(QueryOutcome::failure(error.to_string(), 0)),
            from_cache: false,
        }
    }
}

/// Executes SPARQL text over a lazily rebuilt snapshot, with result caching.
#[derive(Debug)]
pub struct QueryEngine {
    cache: QueryCache,
    snapshot: Mutex<Option<Arc<SparqlSnapshot>>>,
    executions: AtomicU64,
}

impl QueryEngine {
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: QueryCache::new(max_entries),
            snapshot: Mutex::new(None),
            executions: AtomicU64::new(0),
        }
    }

    /// Execute `query`, serving a fresh cached outcome when allowed.
    pub fn execute(
        &self,
        store: &TripleStore,
        query: &str,
        options: &QueryOptions,
    ) -> QueryResponse {
        let key = CacheKey::new(query, options.include_inferred);
        if options.use_cache {
            if let Some(outcome) = self.cache.get(&key) {
                return QueryResponse {
                    outcome,
                    from_cache: true,
                };
            }
        }

        let outcome = Arc::new(self.evaluate(store, query, options.include_inferred));
        if options.use_cache {
            self.cache.insert(key, Arc::clone(&outcome), options.ttl);
        }
        QueryResponse {
            outcome,
            from_cache: false,
        }
    }

    fn evaluate(&self, store: &TripleStore, query: &str, include_inferred: bool) -> QueryOutcome {
        self.executions.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();
        let result = self
            .snapshot_for(store)
            .and_then(|snapshot| snapshot.select(query, include_inferred));
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(rows) => QueryOutcome {
                success: true,
                count: rows.len(),
                rows,
                elapsed_ms,
                error: None,
            },
            Err(e) => {
                tracing::debug!(error = %e, "query failed");
                QueryOutcome::failure(e.to_string(), elapsed_ms)
            }
        }
    }

    /// The snapshot for the store's current generation, rebuilt if stale.
    fn snapshot_for(&self, store: &TripleStore) -> Result<Arc<SparqlSnapshot>, GraphError> {
        let mut slot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(snapshot) = slot.as_ref().filter(|s| s.generation() == store.generation()) {
            return Ok(Arc::clone(snapshot));
        }
        let snapshot = Arc::new(SparqlSnapshot::build(store)?);
        tracing::debug!(
            generation = snapshot.generation(),
            triples = store.len(),
            "rebuilt query snapshot"
        );
        *slot = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        let (hits, misses) = self.cache.counters();
        CacheStats {
            entries: self.cache.len(),
            hits,
            misses,
            executions: self.executions.load(Ordering::Relaxed),
        }
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::sparql::Value;
    use crate::graph::{GraphKind, Literal, Triple};
    use crate::vocab;

    fn store() -> TripleStore {
        let mut store = TripleStore::new();
        for id in 1..=3 {
            let p = vocab::player(id);
            store.add(GraphKind::Base, Triple::type_assertion(p.clone(), vocab::sp("Player")));
            let minutes = Literal::Integer(90 * i64::from(id));
            store.add(GraphKind::Base, Triple::new(p, vocab::sp("minutes"), minutes));
        }
        let top = Triple::type_assertion(vocab::player(1), vocab::sp("TopPlayer"));
        store.add(GraphKind::Inferred, top);
        store
    }

    fn players_query() -> String {
        format!("{}SELECT ?p WHERE {{ ?p a sp:Player }}", vocab::sparql_prefixes())
    }

    #[test]
    fn repeated_query_is_served_from_cache() {
        let store = store();
        let engine = QueryEngine::default();
        let options = QueryOptions::default();
        let first = engine.execute(&store, &players_query(), &options);
        let second = engine.execute(&store, &players_query(), &options);

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert!(Arc::ptr_eq(&first.outcome, &second.outcome));
        assert_eq!(first.outcome.count, 3);
        assert_eq!(engine.cache_stats().executions, 1);
    }

    #[test]
    fn scope_is_part_of_the_key() {
        let store = store();
        let engine = QueryEngine::default();
        let query = format!("{}SELECT ?p WHERE {{ ?p a sp:TopPlayer }}", vocab::sparql_prefixes());
        let union = engine.execute(&store, &query, &QueryOptions::default());
        let base = engine.execute(&store, &query, &QueryOptions::default().base_only());
        assert_eq!(union.outcome.count, 1);
        assert_eq!(base.outcome.count, 0);
        assert!(!base.from_cache);
    }

    #[test]
    fn malformed_query_reports_failure() {
        let store = store();
        let engine = QueryEngine::default();
        let response = engine.execute(&store, "SELEC nonsense", &QueryOptions::default());
        assert!(!response.outcome.success);
        assert!(response.outcome.error.is_some());
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn snapshot_follows_store_generation() {
        let mut store = store();
        let engine = QueryEngine::default();
        let options = QueryOptions::default().uncached();
        assert_eq!(engine.execute(&store, &players_query(), &options).outcome.count, 3);
        store.add(GraphKind::Base, Triple::type_assertion(vocab::player(4), vocab::sp("Player")));
        assert_eq!(engine.execute(&store, &players_query(), &options).outcome.count, 4);
    }

    #[test]
    fn literal_values_are_native() {
        let store = store();
        let engine = QueryEngine::default();
        let query = format!(
            "{}SELECT ?m WHERE {{ <{}> sp:minutes ?m }}",
            vocab::sparql_prefixes(),
            vocab::player(2).as_str()
        );
        let response = engine.execute(&store, &query, &QueryOptions::default());
        assert_eq!(response.outcome.rows[0]["m"], Value::Integer(180));
    }
}
