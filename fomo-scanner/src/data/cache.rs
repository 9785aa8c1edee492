//! TTL cache in front of a data source.
//!
//! Scoring stages ask for overlapping history windows and the same ticker
//! book; wrapping the source in [`CachedSource`] turns the repeats into hits.
//! Market pages and errors are never cached. Expired entries are swept on
//! the store path at most once per TTL, so ids that drop out of the
//! candidate set do not accumulate.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use super::provider::{DataSource, ProviderError};
use super::{MarketHistory, RawRecord, TickerBook};

const TRENDING_KEY: &str = "trending";

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

impl<T: Clone> CacheEntry<T> {
    fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

type Table<T> = RwLock<HashMap<String, CacheEntry<T>>>;

fn lookup<T: Clone>(table: &Table<T>, key: &str) -> Option<T> {
    let guard = table.read().ok()?;
    guard
        .get(key)
        .filter(|entry| !entry.is_expired())
        .map(|entry| entry.data.clone())
}

fn store<T: Clone>(table: &Table<T>, key: String, data: T, ttl: Duration) {
    if let Ok(mut guard) = table.write() {
        guard.insert(key, CacheEntry::new(data, ttl));
    }
}

/// Data source decorator caching history, tickers, and trending lookups.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    /// key = "id:days"
    history: Table<Option<MarketHistory>>,
    tickers: Table<Option<TickerBook>>,
    trending: Table<Vec<String>>,
    hits: AtomicU64,
    misses: AtomicU64,
    last_sweep: Mutex<Instant>,
}

impl<S: DataSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            history: RwLock::new(HashMap::new()),
            tickers: RwLock::new(HashMap::new()),
            trending: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn record<T>(&self, cached: Option<T>) -> Option<T> {
        let counter = if cached.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        cached
    }

    /// Sweep expired entries once the last sweep is a TTL old.
    fn sweep_if_due(&self) {
        let due = match self.last_sweep.lock() {
            Ok(mut last) if last.elapsed() >= self.ttl => {
                *last = Instant::now();
                true
            }
            _ => false,
        };
        if due {
            self.clear_expired();
        }
    }

    /// Drop every expired entry.
    pub fn clear_expired(&self) {
        if let Ok(mut t) = self.history.write() {
            t.retain(|_, e| !e.is_expired());
        }
        if let Ok(mut t) = self.tickers.write() {
            t.retain(|_, e| !e.is_expired());
        }
        if let Ok(mut t) = self.trending.write() {
            t.retain(|_, e| !e.is_expired());
        }
    }

    pub fn stats(&self) -> CacheStats {
        let count = |n: Option<usize>| n.unwrap_or(0);
        let entries = count(self.history.read().ok().map(|t| t.len()))
            + count(self.tickers.read().ok().map(|t| t.len()))
            + count(self.trending.read().ok().map(|t| t.len()));

        CacheStats {
            total_entries: entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[async_trait]
impl<S: DataSource> DataSource for CachedSource<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<RawRecord>, ProviderError> {
        self.inner.fetch_page(page, per_page).await
    }

    async fn fetch_history(
        &self,
        id: &str,
        days: u32,
    ) -> Result<Option<MarketHistory>, ProviderError> {
        let key = format!("{}:{}", id, days);
        if let Some(cached) = self.record(lookup(&self.history, &key)) {
            return Ok(cached);
        }

        let fetched = self.inner.fetch_history(id, days).await?;
        self.sweep_if_due();
        store(&self.history, key, fetched.clone(), self.ttl);
        Ok(fetched)
    }

    async fn fetch_tickers(&self, id: &str) -> Result<Option<TickerBook>, ProviderError> {
        if let Some(cached) = self.record(lookup(&self.tickers, id)) {
            return Ok(cached);
        }

        let fetched = self.inner.fetch_tickers(id).await?;
        self.sweep_if_due();
        store(&self.tickers, id.to_string(), fetched.clone(), self.ttl);
        Ok(fetched)
    }

    async fn fetch_trending(&self) -> Result<Vec<String>, ProviderError> {
        if let Some(cached) = self.record(lookup(&self.trending, TRENDING_KEY)) {
            return Ok(cached);
        }

        let fetched = self.inner.fetch_trending().await?;
        self.sweep_if_due();
        store(&self.trending, TRENDING_KEY.to_string(), fetched.clone(), self.ttl);
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct CountingSource {
        history_calls: AtomicU32,
        ticker_calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl DataSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_page(&self, _: u32, _: u32) -> Result<Vec<RawRecord>, ProviderError> {
            Ok(Vec::new())
        }

        async fn fetch_history(
            &self,
            _id: &str,
            days: u32,
        ) -> Result<Option<MarketHistory>, ProviderError> {
            self.history_calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(ProviderError::Timeout);
            }
            Ok(Some(MarketHistory {
                prices: vec![(0, days as f64)],
                volumes: Vec::new(),
            }))
        }

        async fn fetch_tickers(&self, _: &str) -> Result<Option<TickerBook>, ProviderError> {
            self.ticker_calls.fetch_add(1, Ordering::Relaxed);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_history_hit_after_miss() {
        let source = CachedSource::new(CountingSource::default(), Duration::from_secs(60));

        let first = source.fetch_history("foo", 7).await.unwrap();
        let second = source.fetch_history("foo", 7).await.unwrap();
        let other_window = source.fetch_history("foo", 14).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(other_window.unwrap().prices[0].1, 14.0);
        assert_eq!(source.inner().history_calls.load(Ordering::Relaxed), 2);

        let stats = source.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.total_entries, 2);
    }

    #[tokio::test]
    async fn test_absent_tickers_are_cached() {
        let source = CachedSource::new(CountingSource::default(), Duration::from_secs(60));
        assert!(source.fetch_tickers("foo").await.unwrap().is_none());
        assert!(source.fetch_tickers("foo").await.unwrap().is_none());
        assert_eq!(source.inner().ticker_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let inner = CountingSource {
            fail: true,
            ..Default::default()
        };
        let source = CachedSource::new(inner, Duration::from_secs(60));

        assert!(source.fetch_history("foo", 7).await.is_err());
        assert!(source.fetch_history("foo", 7).await.is_err());
        assert_eq!(source.inner().history_calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let source = CachedSource::new(CountingSource::default(), Duration::ZERO);
        source.fetch_history("foo", 7).await.unwrap();
        source.fetch_history("foo", 7).await.unwrap();
        assert_eq!(source.inner().history_calls.load(Ordering::Relaxed), 2);

        source.clear_expired();
        assert_eq!(source.stats().total_entries, 0);
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept_on_store() {
        let source = CachedSource::new(CountingSource::default(), Duration::ZERO);
        for i in 0..500 {
            let id = format!("coin-{}", i);
            source.fetch_history(&id, 7).await.unwrap();
            source.fetch_tickers(&id).await.unwrap();
        }

        // Only the entries stored since the last sweep remain
        assert!(source.stats().total_entries <= 2);
        assert_eq!(source.stats().misses, 1000);
    }

    #[tokio::test]
    async fn test_entry_count_drops_after_ttl() {
        let ttl = Duration::from_millis(50);
        let source = CachedSource::new(CountingSource::default(), ttl);
        for id in ["a", "b", "c"] {
            source.fetch_history(id, 7).await.unwrap();
        }
        assert_eq!(source.stats().total_entries, 3);

        std::thread::sleep(ttl * 2);
        source.fetch_history("d", 7).await.unwrap();

        assert_eq!(source.stats().total_entries, 1);
        assert_eq!(source.inner().history_calls.load(Ordering::Relaxed), 4);
    }
}
