//! Shared mocks for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fomo_common::config::{Config, ScoringStrategy};
use fomo_scanner::data::{DataSource, MarketHistory, ProviderError, RawRecord, TickerBook};

/// Average daily volume in every mock history.
pub const BASELINE_VOLUME: f64 = 1_000_000.0;

/// Configurable market source with call counters.
#[derive(Default)]
pub struct MockSource {
    records: Mutex<Vec<RawRecord>>,
    fail_pages: AtomicBool,
    page_delay: Mutex<Option<Duration>>,
    pub page_calls: AtomicU32,
    pub history_calls: AtomicU32,
    pub ticker_calls: AtomicU32,
    pub trending_calls: AtomicU32,
}

impl MockSource {
    pub fn with_records(records: Vec<RawRecord>) -> Arc<Self> {
        let source = Self::default();
        source.set_records(records);
        Arc::new(source)
    }

    pub fn set_records(&self, records: Vec<RawRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_pages.store(failing, Ordering::SeqCst);
    }

    pub fn set_page_delay(&self, delay: Duration) {
        *self.page_delay.lock().unwrap() = Some(delay);
    }

    pub fn pages(&self) -> u32 {
        self.page_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_page(&self, page: u32, _: u32) -> Result<Vec<RawRecord>, ProviderError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.page_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_pages.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("HTTP 503".into()));
        }
        if page != 1 {
            return Ok(Vec::new());
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn fetch_history(
        &self,
        _: &str,
        days: u32,
    ) -> Result<Option<MarketHistory>, ProviderError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);

        let points = days as i64 + 1;
        Ok(Some(MarketHistory {
            prices: (0..points).map(|i| (i * 86_400_000, 0.5)).collect(),
            volumes: (0..points).map(|i| (i * 86_400_000, BASELINE_VOLUME)).collect(),
        }))
    }

    async fn fetch_tickers(&self, _: &str) -> Result<Option<TickerBook>, ProviderError> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn fetch_trending(&self) -> Result<Vec<String>, ProviderError> {
        self.trending_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// A small-cap record that passes the default filter thresholds.
pub fn record(id: &str, volume: f64) -> RawRecord {
    RawRecord {
        id: id.to_string(),
        symbol: id.to_string(),
        name: id.to_uppercase(),
        price: Some(0.5),
        volume: Some(volume),
        market_cap: Some(20_000_000.0),
        market_cap_rank: Some(900),
        pct_change_1h: Some(0.5),
        pct_change_24h: Some(4.0),
        ..Default::default()
    }
}

/// Reactive scoring over a single page, keeping every scored candidate.
pub fn test_config() -> Config {
    let mut config = Config::default();
    let scanner = &mut config.scanner;
    scanner.refresh_interval_secs = 180;
    scanner.error_backoff_secs = 60;
    scanner.initial_delay_secs = 7;
    scanner.cycle_timeout_secs = 30;
    scanner.filter.page_count = 1;
    scanner.filter.top_n_exclude = 0;
    scanner.batch.min_keep_score = 0;
    scanner.scoring.strategy = ScoringStrategy::Reactive;
    config
}
