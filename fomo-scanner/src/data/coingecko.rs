//! CoinGecko API adapter.
//!
//! # Endpoints
//! - `/coins/markets`: paged snapshot ordered by market cap
//! - `/coins/{id}/market_chart`: price and volume history
//! - `/coins/{id}/tickers`: per-exchange volume
//! - `/search/trending`: currently trending assets
//!
//! # Rate Limits
//! - Pro plan: 500 calls/minute, shared across endpoints
//! - Calls pass the shared token bucket before hitting the network

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use fomo_common::config::CoinGeckoConfig;

use super::provider::{DataSource, ProviderError};
use super::rate_limiter::{shared_limiter, SharedRateLimiter};
use super::{ExchangeTicker, MarketHistory, RawRecord, TickerBook};

// ============================================================================
// Constants
// ============================================================================

const PRO_API_BASE: &str = "https://pro-api.coingecko.com/api/v3";

const PUBLIC_API_BASE: &str = "https://api.coingecko.com/api/v3";

/// Query parameter carrying the pro API key
const API_KEY_PARAM: &str = "x_cg_pro_api_key";

/// Upstream caps `per_page` at this value
const MAX_PER_PAGE: u32 = 250;

/// Retry delay hinted after a 429 (seconds)
const RATE_LIMIT_RETRY_SECS: u64 = 60;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MarketItem {
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    symbol: String,
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    image: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    current_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u32")]
    market_cap_rank: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total_volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_percentage_1h_in_currency: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_percentage_24h_in_currency: Option<f64>,
    /// Present even when the `_in_currency` variant is not requested
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_percentage_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_percentage_7d_in_currency: Option<f64>,
}

// Malformed market fields read as absent instead of failing the record.

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(d)?;
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()))
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(lenient_f64(d)?
        .filter(|n| *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32))
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(d)?.unwrap_or_default())
}

/// Decode a markets page item by item, skipping records without an id.
fn parse_market_page(items: Vec<Value>) -> Vec<RawRecord> {
    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<MarketItem>(item) {
            Ok(item) => Some(RawRecord::from(item)),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable market record");
                None
            }
        })
        .collect();

    if records.len() < total {
        debug!(total, kept = records.len(), "Market page had unreadable records");
    }
    records
}

impl From<MarketItem> for RawRecord {
    fn from(item: MarketItem) -> Self {
        Self {
            id: item.id,
            symbol: item.symbol.to_lowercase(),
            name: item.name,
            price: item.current_price,
            volume: item.total_volume,
            market_cap: item.market_cap,
            market_cap_rank: item.market_cap_rank,
            pct_change_1h: item.price_change_percentage_1h_in_currency,
            pct_change_24h: item
                .price_change_percentage_24h_in_currency
                .or(item.price_change_percentage_24h),
            pct_change_7d: item.price_change_percentage_7d_in_currency,
            image_url: item.image,
        }
    }
}

/// Series points arrive as `[timestamp_ms, value]`; values can be null.
type WirePoint = (f64, Option<f64>);

#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<WirePoint>,
    #[serde(default)]
    total_volumes: Vec<WirePoint>,
}

fn clean_series(points: Vec<WirePoint>) -> Vec<(i64, f64)> {
    points
        .into_iter()
        .filter_map(|(ts, v)| v.filter(|v| v.is_finite()).map(|v| (ts as i64, v)))
        .collect()
}

impl From<MarketChart> for MarketHistory {
    fn from(chart: MarketChart) -> Self {
        Self {
            prices: clean_series(chart.prices),
            volumes: clean_series(chart.total_volumes),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TickersResponse {
    #[serde(default)]
    tickers: Vec<WireTicker>,
}

#[derive(Debug, Deserialize)]
struct WireTicker {
    market: Option<WireMarket>,
    converted_volume: Option<WireConvertedVolume>,
}

#[derive(Debug, Deserialize)]
struct WireMarket {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireConvertedVolume {
    usd: Option<f64>,
}

impl From<TickersResponse> for TickerBook {
    fn from(resp: TickersResponse) -> Self {
        let tickers = resp
            .tickers
            .into_iter()
            .map(|t| ExchangeTicker {
                exchange_name: t
                    .market
                    .and_then(|m| m.name)
                    .unwrap_or_else(|| "Unknown".to_string()),
                usd_volume: t
                    .converted_volume
                    .and_then(|c| c.usd)
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .unwrap_or(0.0),
            })
            .collect();
        Self { tickers }
    }
}

#[derive(Debug, Deserialize)]
struct TrendingResponse {
    #[serde(default)]
    coins: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    item: TrendingItem,
}

#[derive(Debug, Deserialize)]
struct TrendingItem {
    id: String,
}

// ============================================================================
// CoinGecko Adapter
// ============================================================================

/// CoinGecko market data adapter.
pub struct CoinGeckoAdapter {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    rate_limiter: SharedRateLimiter,
}

impl CoinGeckoAdapter {
    /// Build from config. A configured API key selects the pro endpoint.
    pub fn from_config(config: &CoinGeckoConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());
        let base_url = config.base_url.clone().unwrap_or_else(|| {
            if api_key.is_some() {
                PRO_API_BASE.to_string()
            } else {
                PUBLIC_API_BASE.to_string()
            }
        });

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            rate_limiter: shared_limiter("coingecko", config.rate_limit_rpm),
        }
    }

    /// Share an existing limiter with other clients of the same quota.
    pub fn with_rate_limiter(mut self, limiter: SharedRateLimiter) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the body. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ProviderError> {
        let url = format!("{}{}", self.base_url, path);

        self.rate_limiter.acquire().await;
        debug!(url = %url, "Fetching from CoinGecko");

        let mut request = self.client.get(&url).header("accept", "application/json").query(query);
        if let Some(key) = &self.api_key {
            request = request.query(&[(API_KEY_PARAM, key.as_str())]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else if e.is_connect() {
                ProviderError::Network("Connection failed".into())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!("HTTP {}", status)));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .or(Some(RATE_LIMIT_RETRY_SECS));
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| ProviderError::Parse(format!("{}: {}", path, e)))
    }
}

// ============================================================================
// DataSource Implementation
// ============================================================================

#[async_trait]
impl DataSource for CoinGeckoAdapter {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<RawRecord>, ProviderError> {
        let query = [
            ("vs_currency", "usd".to_string()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", per_page.clamp(1, MAX_PER_PAGE).to_string()),
            ("page", page.max(1).to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", "1h,24h,7d".to_string()),
        ];

        let items: Vec<Value> = self
            .get_json("/coins/markets", &query)
            .await?
            .unwrap_or_default();

        Ok(parse_market_page(items))
    }

    async fn fetch_history(
        &self,
        id: &str,
        days: u32,
    ) -> Result<Option<MarketHistory>, ProviderError> {
        let interval = if days > 1 { "daily" } else { "hourly" };
        let query = [
            ("vs_currency", "usd".to_string()),
            ("days", days.to_string()),
            ("interval", interval.to_string()),
        ];

        let chart: Option<MarketChart> = self
            .get_json(&format!("/coins/{}/market_chart", id), &query)
            .await?;

        Ok(chart.map(MarketHistory::from))
    }

    async fn fetch_tickers(&self, id: &str) -> Result<Option<TickerBook>, ProviderError> {
        let resp: Option<TickersResponse> =
            self.get_json(&format!("/coins/{}/tickers", id), &[]).await?;

        Ok(resp.map(TickerBook::from))
    }

    async fn fetch_trending(&self) -> Result<Vec<String>, ProviderError> {
        let resp: Option<TrendingResponse> = self.get_json("/search/trending", &[]).await?;

        Ok(resp
            .map(|r| r.coins.into_iter().map(|c| c.item.id).collect())
            .unwrap_or_default())
    }
}
