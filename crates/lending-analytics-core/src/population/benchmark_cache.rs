//! Time-boxed cache for benchmark data that is expensive to fetch.
//!
//! The caller supplies both the TTL and the clock, so expiry is
//! deterministic under test.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BenchmarkCache<V> {
    ttl: Duration,
    entries: HashMap<String, CacheEntry<V>>,
}

impl<V> BenchmarkCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.stored_at) < self.ttl
    }

    /// The cached value, unless it is missing or older than the TTL.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|e| self.is_fresh(e, now))
            .map(|e| &e.value)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V, now: DateTime<Utc>) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: now,
            },
        );
    }

    /// Return the fresh value for `key`, fetching and storing it otherwise.
    ///
    /// A failed fetch leaves any stale entry in place.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: &str,
        now: DateTime<Utc>,
        fetch: impl FnOnce() -> Result<V, E>,
    ) -> Result<&V, E> {
        if self.get(key, now).is_none() {
            tracing::debug!(key, "benchmark cache miss");
            let value = fetch()?;
            self.insert(key, value, now);
        }
        Ok(&self.entries[key].value)
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, e| now.signed_duration_since(e.stored_at) < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let mut cache = BenchmarkCache::new(Duration::hours(1));
        cache.insert("us", 42u64, t0());
        assert_eq!(cache.get("us", t0() + Duration::minutes(59)), Some(&42));
        assert_eq!(cache.get("us", t0() + Duration::hours(1)), None);
    }

    #[test]
    fn test_get_or_try_insert_fetches_once_while_fresh() {
        let mut cache = BenchmarkCache::new(Duration::hours(1));
        let mut calls = 0;
        for _ in 0..3 {
            let v = cache
                .get_or_try_insert_with("us", t0(), || {
                    calls += 1;
                    Ok::<_, String>(7u64)
                })
                .unwrap();
            assert_eq!(*v, 7);
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_failed_fetch_propagates() {
        let mut cache: BenchmarkCache<u64> = BenchmarkCache::new(Duration::hours(1));
        let r = cache.get_or_try_insert_with("us", t0(), || Err("offline"));
        assert_eq!(r, Err("offline"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let mut cache = BenchmarkCache::new(Duration::hours(1));
        cache.insert("old", 1u64, t0());
        cache.insert("new", 2u64, t0() + Duration::minutes(90));
        assert_eq!(cache.purge_expired(t0() + Duration::minutes(100)), 1);
        assert_eq!(cache.len(), 1);
    }
}
