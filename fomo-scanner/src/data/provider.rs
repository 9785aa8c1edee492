//! Data source abstraction.
//!
//! Defines the `DataSource` trait the pipeline fetches through, so the
//! scanner can run against CoinGecko in production and mocks in tests.

use async_trait::async_trait;
use std::fmt;

use super::{MarketHistory, RawRecord, TickerBook};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors raised by data sources.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Connection failed or the transport broke mid-request
    Network(String),
    /// The per-call deadline elapsed
    Timeout,
    /// Invalid or missing API key
    Auth(String),
    /// Upstream throttled us
    RateLimited { retry_after_secs: Option<u64> },
    /// Nothing exists for this request
    DataNotAvailable(String),
    /// Upstream returned a non-success status
    Unavailable(String),
    /// The response body did not have the expected shape
    Parse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Auth(msg) => write!(f, "Authentication error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::Unavailable(msg) => write!(f, "Provider unavailable: {}", msg),
            Self::Parse(msg) => write!(f, "Malformed response: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is worth retrying on a later cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }
}

// ============================================================================
// Data Source Trait
// ============================================================================

/// Upstream market data.
///
/// Every method may fail or time out; callers degrade rather than abort.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Source name for logs (e.g., "coingecko")
    fn name(&self) -> &'static str;

    /// Fetch one page of the market snapshot, ordered by market cap descending.
    ///
    /// Pages are 1-based and idempotent.
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<RawRecord>, ProviderError>;

    /// Fetch daily price and volume history. `Ok(None)` means the asset has none.
    async fn fetch_history(
        &self,
        id: &str,
        days: u32,
    ) -> Result<Option<MarketHistory>, ProviderError>;

    /// Fetch the per-exchange ticker breakdown.
    async fn fetch_tickers(&self, id: &str) -> Result<Option<TickerBook>, ProviderError>;

    /// Ids currently trending on the upstream.
    ///
    /// Sources without a sentiment feed report nothing trending.
    async fn fetch_trending(&self) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl<T: DataSource + ?Sized> DataSource for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<RawRecord>, ProviderError> {
        (**self).fetch_page(page, per_page).await
    }

    async fn fetch_history(
        &self,
        id: &str,
        days: u32,
    ) -> Result<Option<MarketHistory>, ProviderError> {
        (**self).fetch_history(id, days).await
    }

    async fn fetch_tickers(&self, id: &str) -> Result<Option<TickerBook>, ProviderError> {
        (**self).fetch_tickers(id).await
    }

    async fn fetch_trending(&self) -> Result<Vec<String>, ProviderError> {
        (**self).fetch_trending().await
    }
}
