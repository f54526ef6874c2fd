//! In-process query cache backed by DashMap for lock-free concurrent access.
//! Sits in front of a tabular store so repeated filter states skip the
//! round trip.

use dashmap::DashMap;
use insight_core::config::CacheConfig;
use insight_core::InsightResult;
use insight_query::{AggregationQuery, OptionSource, RawRow, TabularStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry {
    rows: Arc<Vec<RawRow>>,
    inserted_at: Instant,
}

/// Memoizing [`TabularStore`] wrapper keyed on the bound query.
///
/// Option lists are not cached; they are cheap and read once per session.
pub struct CachedStore<S> {
    inner: S,
    store: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl<S: TabularStore> CachedStore<S> {
    pub fn new(inner: S, ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            inner,
            store: Arc::new(DashMap::with_capacity(max_entries.min(1024))),
            ttl: Duration::from_secs(ttl_secs),
            max_entries,
        }
    }

    pub fn from_config(inner: S, config: &CacheConfig) -> Self {
        Self::new(inner, config.ttl_secs, config.max_entries)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn get(&self, key: &str) -> Option<Arc<Vec<RawRow>>> {
        let entry = self.store.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.store.remove(key);
            return None;
        }
        Some(Arc::clone(&entry.rows))
    }

    fn put(&self, key: String, rows: Arc<Vec<RawRow>>) {
        // Full cache: skip the insert, evict_expired reclaims space.
        if self.store.len() >= self.max_entries && !self.store.contains_key(&key) {
            return;
        }
        self.store.insert(
            key,
            CacheEntry {
                rows,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Remove expired entries.
    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        self.store
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before - self.store.len()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl<S: TabularStore> TabularStore for CachedStore<S> {
    fn execute(&self, query: &AggregationQuery) -> InsightResult<Vec<RawRow>> {
        let key = query.cache_key();
        if let Some(rows) = self.get(&key) {
            metrics::counter!("cache.hit").increment(1);
            debug!(template = %query.template, "Query served from cache");
            return Ok(rows.as_ref().clone());
        }

        metrics::counter!("cache.miss").increment(1);
        let rows = self.inner.execute(query)?;
        self.put(key, Arc::new(rows.clone()));
        Ok(rows)
    }

    fn distinct_values(&self, source: OptionSource) -> InsightResult<Vec<String>> {
        self.inner.distinct_values(source)
    }
}
