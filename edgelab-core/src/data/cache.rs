//! Time-to-live cache in front of any `BarSeriesProvider`.
//!
//! Entries are keyed by `(instrument, start, end)` and owned by the cache
//! instance, never by global state. An entry older than the TTL is refetched;
//! `refresh` and `invalidate` drop entries explicitly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use super::provider::{BarSeriesProvider, DataError};
use crate::domain::BarSeries;

type CacheKey = (String, NaiveDate, NaiveDate);

#[derive(Debug, Clone)]
struct CacheEntry {
    series: BarSeries,
    fetched_at: Instant,
}

/// Hit/miss counters, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct CachedProvider<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: BarSeriesProvider> CachedProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A poisoned lock only means another fetch panicked; the map itself is intact.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop every cached range for `instrument`.
    pub fn invalidate(&self, instrument: &str) {
        self.lock().retain(|(name, _, _), _| name != instrument);
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Refetch one range from the underlying provider, replacing any cached copy.
    pub fn refresh(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Result<BarSeries, DataError> {
        self.lock().remove(&(instrument.to_string(), start, end));
        self.fetch(instrument, start, end)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<P: BarSeriesProvider> BarSeriesProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Result<BarSeries, DataError> {
        let key = (instrument.to_string(), start, end);
        if let Some(entry) = self.lock().get(&key) {
            if entry.fetched_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(instrument, %start, %end, "bar cache hit");
                return Ok(entry.series.clone());
            }
        }

        // Fetch without holding the lock; two threads racing on one key both
        // fetch and the later insert wins.
        self.misses.fetch_add(1, Ordering::Relaxed);
        let series = self.inner.fetch(instrument, start, end)?;
        tracing::debug!(instrument, %start, %end, bars = series.len(), "bar cache fill");
        self.lock().insert(
            key,
            CacheEntry {
                series: series.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticProvider;
    use std::sync::atomic::AtomicUsize;

    /// Wraps a provider and counts underlying fetches.
    struct Counting {
        inner: SyntheticProvider,
        calls: AtomicUsize,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                inner: SyntheticProvider::default(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl BarSeriesProvider for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn fetch(&self, instrument: &str, start: NaiveDate, end: NaiveDate) -> Result<BarSeries, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(instrument, start, end)
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn second_fetch_is_served_from_cache() {
        let cache = CachedProvider::new(Counting::new(), Duration::from_secs(3600));
        let a = cache.fetch("SPY", d(1), d(31)).unwrap();
        let b = cache.fetch("SPY", d(1), d(31)).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn different_range_is_a_different_key() {
        let cache = CachedProvider::new(Counting::new(), Duration::from_secs(3600));
        cache.fetch("SPY", d(1), d(31)).unwrap();
        cache.fetch("SPY", d(2), d(31)).unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_ttl_always_refetches() {
        let cache = CachedProvider::new(Counting::new(), Duration::ZERO);
        cache.fetch("SPY", d(1), d(31)).unwrap();
        cache.fetch("SPY", d(1), d(31)).unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalidate_and_refresh() {
        let cache = CachedProvider::new(Counting::new(), Duration::from_secs(3600));
        cache.fetch("SPY", d(1), d(31)).unwrap();
        cache.fetch("QQQ", d(1), d(31)).unwrap();
        cache.invalidate("SPY");
        assert_eq!(cache.len(), 1);

        cache.refresh("QQQ", d(1), d(31)).unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = CachedProvider::new(Counting::new(), Duration::from_secs(3600));
        assert!(cache.fetch("SPY", d(6), d(7)).is_err());
        assert!(cache.is_empty());
    }
}
