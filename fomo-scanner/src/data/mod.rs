//! Market data layer.
//!
//! Everything the pipeline knows about the outside world arrives through the
//! [`DataSource`] trait. The CoinGecko adapter is the production source;
//! [`CachedSource`] wraps any source with a TTL cache for history and ticker
//! lookups so overlapping scoring stages share one request.

mod cache;
mod coingecko;
mod provider;
mod rate_limiter;

pub use cache::{CacheStats as SourceCacheStats, CachedSource};
pub use coingecko::CoinGeckoAdapter;
pub use provider::{DataSource, ProviderError};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};

use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Rank assumed for records the feed did not rank.
pub const UNRANKED: u32 = 999_999;

// ============================================================================
// Raw Market Records
// ============================================================================

/// One asset from a market snapshot page.
///
/// Fields the upstream omitted stay `None`; the accessor methods apply the
/// documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: Option<f64>,
    /// 24h traded volume in USD
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub pct_change_1h: Option<f64>,
    pub pct_change_24h: Option<f64>,
    pub pct_change_7d: Option<f64>,
    pub image_url: Option<String>,
}

impl RawRecord {
    /// Market cap, 0 when absent.
    pub fn market_cap_or_zero(&self) -> f64 {
        finite_or_zero(self.market_cap)
    }

    /// Volume, 0 when absent.
    pub fn volume_or_zero(&self) -> f64 {
        finite_or_zero(self.volume)
    }

    pub fn change_1h(&self) -> f64 {
        finite_or_zero(self.pct_change_1h)
    }

    pub fn change_24h(&self) -> f64 {
        finite_or_zero(self.pct_change_24h)
    }

    pub fn rank(&self) -> u32 {
        self.market_cap_rank.unwrap_or(UNRANKED)
    }

    /// Public page for this asset.
    pub fn source_url(&self) -> String {
        format!("https://www.coingecko.com/en/coins/{}", self.id)
    }
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// A record that passed candidate filtering.
///
/// Lives only for the duration of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate(RawRecord);

impl Candidate {
    pub fn into_record(self) -> RawRecord {
        self.0
    }
}

impl From<RawRecord> for Candidate {
    fn from(record: RawRecord) -> Self {
        Self(record)
    }
}

impl Deref for Candidate {
    type Target = RawRecord;

    fn deref(&self) -> &RawRecord {
        &self.0
    }
}

// ============================================================================
// History and Tickers
// ============================================================================

/// Historical price and volume series, oldest first.
///
/// Points are `(timestamp_ms, value)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketHistory {
    pub prices: Vec<(i64, f64)>,
    pub volumes: Vec<(i64, f64)>,
}

impl MarketHistory {
    pub fn price_values(&self) -> Vec<f64> {
        self.prices.iter().map(|(_, v)| *v).collect()
    }

    pub fn volume_values(&self) -> Vec<f64> {
        self.volumes.iter().map(|(_, v)| *v).collect()
    }
}

/// Volume reported by one exchange market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTicker {
    pub exchange_name: String,
    pub usd_volume: f64,
}

/// Per-exchange breakdown for one asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerBook {
    pub tickers: Vec<ExchangeTicker>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults() {
        let record = RawRecord {
            id: "foo".into(),
            pct_change_24h: Some(f64::NAN),
            ..Default::default()
        };
        assert_eq!(record.market_cap_or_zero(), 0.0);
        assert_eq!(record.change_24h(), 0.0);
        assert_eq!(record.rank(), UNRANKED);
        assert_eq!(record.source_url(), "https://www.coingecko.com/en/coins/foo");
    }

    #[test]
    fn test_candidate_derefs_to_record() {
        let candidate = Candidate::from(RawRecord {
            symbol: "abc".into(),
            volume: Some(10.0),
            ..Default::default()
        });
        assert_eq!(candidate.symbol, "abc");
        assert_eq!(candidate.volume_or_zero(), 10.0);
    }

    #[test]
    fn test_history_values() {
        let history = MarketHistory {
            prices: vec![(1, 1.0), (2, 2.0)],
            volumes: vec![(1, 10.0)],
        };
        assert_eq!(history.price_values(), vec![1.0, 2.0]);
        assert_eq!(history.volume_values(), vec![10.0]);
    }
}
