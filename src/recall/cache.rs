//! Small LRU+TTL query cache keyed by a hash of `(query, filters)`
//! (spec.md §4.6), built on the teacher's `lru` crate dependency.

use crate::models::SearchFilter;
use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<T> {
    value: T,
    inserted_at: Instant,
}

/// Caches search results keyed by a hash of the query text and filters,
/// evicting both by LRU capacity and by TTL.
pub struct QueryCache<T: Clone> {
    inner: Mutex<LruCache<u64, Entry<T>>>,
    ttl: Duration,
}

impl<T: Clone> QueryCache<T> {
    /// Builds a cache holding at most `capacity` entries, each valid for
    /// `ttl`.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped to at least 1 above");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Computes the cache key for a query/filter pair.
    #[must_use]
    pub fn key(query: &str, filters: &SearchFilter) -> u64 {
        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        filters.repo_path.hash(&mut hasher);
        for ns in &filters.namespaces {
            ns.as_str().hash(&mut hasher);
        }
        filters.spec.hash(&mut hasher);
        for status in &filters.statuses {
            status.as_str().hash(&mut hasher);
        }
        filters.since.map(|t| t.timestamp()).hash(&mut hasher);
        filters.until.map(|t| t.timestamp()).hash(&mut hasher);
        for tag in &filters.tags_any {
            tag.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Returns the cached value for `key`, if present and not expired.
    pub fn get(&self, key: u64) -> Option<T> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let expired = guard.peek(&key).is_some_and(|e| e.inserted_at.elapsed() > self.ttl);
        if expired {
            guard.pop(&key);
            return None;
        }
        guard.get(&key).map(|e| e.value.clone())
    }

    /// Inserts `value` under `key`.
    pub fn put(&self, key: u64, value: T) {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }
}
