//! TTL result cache for executors.
//!
//! Caches row sets per `(backend_id, statement)` for the `cache_ttl` of the
//! call that filled the entry. A zero TTL bypasses the cache entirely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use querybench_core::{Clock, ExecutionError, Executor, MonotonicClock, RowSet};

/// Cache key: backend id and statement text.
type CacheKey = (String, String);

/// A cached row set, when it was stored, and for how long it stays fresh.
#[derive(Debug, Clone)]
struct CachedRows {
    rows: RowSet,
    stored_at: Instant,
    ttl: Duration,
}

impl CachedRows {
    fn is_fresh(&self, clock: &dyn Clock) -> bool {
        clock.since(self.stored_at) < self.ttl
    }
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    bypassed: AtomicU64,
}

impl CacheStats {
    /// Get hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get the number of zero-TTL calls that skipped the cache.
    pub fn bypassed(&self) -> u64 {
        self.bypassed.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0) over cacheable calls.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Executor wrapper that serves repeated queries from memory.
///
/// Failures are never cached.
pub struct CachingExecutor<E> {
    inner: E,
    entries: DashMap<CacheKey, CachedRows>,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl<E: Executor> CachingExecutor<E> {
    /// Wrap an executor.
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            clock: Arc::new(MonotonicClock),
            stats: CacheStats::default(),
        }
    }

    /// Replace the clock used to age entries.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of cached entries, including expired ones not yet looked up.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// The wrapped executor.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Fresh rows for `key`. A stale entry is evicted.
    fn lookup(&self, key: &CacheKey) -> Option<RowSet> {
        {
            let entry = self.entries.get(key)?;
            if entry.is_fresh(self.clock.as_ref()) {
                return Some(entry.rows.clone());
            }
        }

        // The read guard must be released before removing.
        self.entries
            .remove_if(key, |_, entry| !entry.is_fresh(self.clock.as_ref()));
        None
    }
}

impl<E: Executor> Executor for CachingExecutor<E> {
    fn execute(
        &self,
        backend_id: &str,
        statement: &str,
        ttl: Duration,
    ) -> Result<RowSet, ExecutionError> {
        if ttl.is_zero() {
            self.stats.bypassed.fetch_add(1, Ordering::Relaxed);
            return self.inner.execute(backend_id, statement, ttl);
        }

        let key = (backend_id.to_string(), statement.to_string());
        if let Some(rows) = self.lookup(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(backend = backend_id, "result cache hit");
            return Ok(rows);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let rows = self.inner.execute(backend_id, statement, ttl)?;
        self.entries.insert(
            key,
            CachedRows {
                rows: rows.clone(),
                stored_at: self.clock.now(),
                ttl,
            },
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querybench_core::clock::ManualClock;
    use querybench_core::Row;
    use std::sync::atomic::AtomicUsize;

    /// Counts calls and fails on statements starting with "FAIL".
    #[derive(Default)]
    struct CountingExecutor {
        calls: AtomicUsize,
    }

    impl CountingExecutor {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Executor for CountingExecutor {
        fn execute(
            &self,
            _backend_id: &str,
            statement: &str,
            _ttl: Duration,
        ) -> Result<RowSet, ExecutionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if statement.starts_with("FAIL") {
                return Err(ExecutionError::Statement("boom".to_string()));
            }
            Ok(vec![Row::new().with("call", n as i64)])
        }
    }

    #[test]
    fn test_zero_ttl_bypasses_cache() {
        let cache = CachingExecutor::new(CountingExecutor::default());
        cache.execute("A", "SELECT 1", Duration::ZERO).unwrap();
        cache.execute("A", "SELECT 1", Duration::ZERO).unwrap();

        assert_eq!(cache.inner().calls(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().bypassed(), 2);
        assert_eq!(cache.stats().hits(), 0);
    }

    #[test]
    fn test_hit_within_ttl_and_expiry() {
        let clock = Arc::new(ManualClock::new());
        let cache = CachingExecutor::new(CountingExecutor::default()).with_clock(clock.clone());
        let ttl = Duration::from_secs(60);

        let first = cache.execute("A", "SELECT 1", ttl).unwrap();
        clock.advance(Duration::from_secs(30));
        let second = cache.execute("A", "SELECT 1", ttl).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.inner().calls(), 1);

        clock.advance(Duration::from_secs(31));
        let third = cache.execute("A", "SELECT 1", ttl).unwrap();
        assert_ne!(first, third);
        assert_eq!(cache.inner().calls(), 2);

        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 2);
        assert!((cache.stats().hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_expiry_uses_fill_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = CachingExecutor::new(CountingExecutor::default()).with_clock(clock.clone());

        cache.execute("A", "S", Duration::from_secs(1)).unwrap();
        clock.advance(Duration::from_secs(30));
        cache.execute("A", "S", Duration::from_secs(3600)).unwrap();

        assert_eq!(cache.stats().hits(), 0);
        assert_eq!(cache.stats().misses(), 2);
        assert_eq!(cache.inner().calls(), 2);
    }

    #[test]
    fn test_stale_entries_evicted() {
        let clock = Arc::new(ManualClock::new());
        let cache = CachingExecutor::new(CountingExecutor::default()).with_clock(clock.clone());
        let ttl = Duration::from_secs(10);

        cache.execute("A", "SELECT 1", ttl).unwrap();
        clock.advance(Duration::from_secs(11));
        assert_eq!(cache.lookup(&("A".to_string(), "SELECT 1".to_string())), None);
        assert!(cache.is_empty());

        cache.execute("A", "SELECT 1", ttl).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_include_backend() {
        let cache = CachingExecutor::new(CountingExecutor::default());
        let ttl = Duration::from_secs(60);
        cache.execute("A", "SELECT 1", ttl).unwrap();
        cache.execute("B", "SELECT 1", ttl).unwrap();
        assert_eq!(cache.inner().calls(), 2);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failures_not_cached() {
        let cache = CachingExecutor::new(CountingExecutor::default());
        let ttl = Duration::from_secs(60);
        assert!(cache.execute("A", "FAIL", ttl).is_err());
        assert!(cache.execute("A", "FAIL", ttl).is_err());
        assert_eq!(cache.inner().calls(), 2);
        assert!(cache.is_empty());
    }
}
