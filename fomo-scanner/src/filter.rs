//! Candidate discovery.
//!
//! Pulls the market snapshot page by page and narrows it to small-cap,
//! liquid, not-yet-parabolic assets worth scoring.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use fomo_common::config::FilterConfig;
use fomo_common::{Error, Result};

use crate::data::{Candidate, DataSource, ProviderError, RawRecord};

/// Prices this close to $1 on a large asset look like a peg.
const PEG_TOLERANCE: f64 = 0.02;
const PEG_MIN_MARKET_CAP: f64 = 1_000_000_000.0;

pub struct CandidateFilter {
    source: Arc<dyn DataSource>,
    config: FilterConfig,
    call_timeout: Duration,
}

impl CandidateFilter {
    pub fn new(source: Arc<dyn DataSource>, config: FilterConfig, call_timeout: Duration) -> Self {
        Self {
            source,
            config,
            call_timeout,
        }
    }

    /// Fetch every page concurrently and select candidates.
    ///
    /// A failed or timed-out page counts as empty. Fails only when every
    /// page failed.
    pub async fn run(&self) -> Result<Vec<Candidate>> {
        let per_page = self.config.per_page;
        let pages = 1..=self.config.page_count;
        let call_timeout = self.call_timeout;

        let results = join_all(pages.map(|page| {
            let source = Arc::clone(&self.source);
            async move {
                let outcome = tokio::time::timeout(call_timeout, source.fetch_page(page, per_page))
                    .await
                    .unwrap_or(Err(ProviderError::Timeout));
                (page, outcome)
            }
        }))
        .await;

        let mut fetched = Vec::with_capacity(results.len());
        let mut failures = 0usize;
        let mut first_page = Vec::new();

        for (page, result) in results {
            match result {
                Ok(records) => {
                    debug!(page, count = records.len(), "Market page fetched");
                    if page == 1 {
                        first_page = records.clone();
                    }
                    fetched.push(records);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(page, error = %e, "Market page failed, treating as empty");
                    failures += 1;
                }
                Err(e) => {
                    error!(page, error = %e, "Market page rejected, treating as empty");
                    failures += 1;
                }
            }
        }

        if fetched.is_empty() && failures > 0 {
            return Err(Error::External(format!(
                "all {} market pages from {} failed",
                failures,
                self.source.name()
            )));
        }

        let exclusions = self.exclusion_set(&first_page);
        let records: Vec<RawRecord> = fetched.into_iter().flatten().collect();
        let scanned = records.len();
        let candidates = self.select(records, &exclusions);

        info!(
            scanned,
            failed_pages = failures,
            candidates = candidates.len(),
            "Candidate filter complete"
        );
        Ok(candidates)
    }

    /// Stablecoin symbols plus the symbols of the largest assets.
    pub fn exclusion_set(&self, first_page: &[RawRecord]) -> HashSet<String> {
        let mut set: HashSet<String> = self
            .config
            .stablecoins
            .iter()
            .map(|s| s.to_lowercase())
            .collect();

        let mut largest: Vec<&RawRecord> = first_page.iter().collect();
        largest.sort_by(|a, b| b.market_cap_or_zero().total_cmp(&a.market_cap_or_zero()));
        set.extend(
            largest
                .into_iter()
                .take(self.config.top_n_exclude)
                .map(|r| r.symbol.to_lowercase()),
        );

        set
    }

    fn keep(&self, record: &RawRecord, exclusions: &HashSet<String>) -> bool {
        let symbol = record.symbol.to_lowercase();
        if exclusions.contains(&symbol) || symbol.starts_with("usd") {
            return false;
        }

        let cap = record.market_cap_or_zero();
        let price = record.price.unwrap_or(0.0);
        if (price - 1.0).abs() <= PEG_TOLERANCE && cap > PEG_MIN_MARKET_CAP {
            return false;
        }

        cap > 0.0
            && cap <= self.config.cap_max
            && record.volume_or_zero() >= self.config.vol_min
            && record.change_24h().abs() <= self.config.pump_cap
    }

    /// Apply thresholds, de-duplicate, rank by volume, and truncate.
    pub fn select(&self, records: Vec<RawRecord>, exclusions: &HashSet<String>) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        let mut kept: Vec<RawRecord> = records
            .into_iter()
            .filter(|r| self.keep(r, exclusions))
            .filter(|r| seen.insert(r.id.clone()))
            .collect();

        kept.sort_by(|a, b| b.volume_or_zero().total_cmp(&a.volume_or_zero()));
        kept.truncate(self.config.top_k);
        kept.into_iter().map(Candidate::from).collect()
    }
}
