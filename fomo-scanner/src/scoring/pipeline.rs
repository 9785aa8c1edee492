//! Per-candidate scoring pipeline.
//!
//! The gather phase is the only place that touches the network. Every
//! lookup runs under a per-call deadline and degrades to `None`, so a dead
//! upstream turns the dependent stages neutral instead of dropping the
//! candidate.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use fomo_common::config::{ScoringConfig, ScoringStrategy};

use super::{
    base, evaluate, CandidateView, PredictiveBreakdown, PredictiveInputs, ProbabilityProfile,
    ScoringContext, StageRecord,
};
use crate::clock::Clock;
use crate::data::{Candidate, DataSource, ProviderError};

/// Days of history behind the volume spike and trend reads.
pub const PRIMARY_HISTORY_DAYS: u32 = 7;
/// Windows the predictive overlay reads.
pub const PREDICTIVE_WINDOWS: [u32; 3] = [14, 21, 30];

// ============================================================================
// Errors
// ============================================================================

/// Reasons a candidate produces no opportunity.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreError {
    #[error("Malformed candidate {id}: {reason}")]
    MalformedCandidate { id: String, reason: String },

    #[error("Scoring task for {id} panicked")]
    Panicked { id: String },
}

// ============================================================================
// Scored Opportunity
// ============================================================================

/// A fully scored candidate, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredOpportunity {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub volume: f64,
    pub market_cap: Option<f64>,
    pub market_cap_rank: u32,
    pub pct_change_1h: f64,
    pub pct_change_24h: f64,
    pub volume_spike: f64,
    pub fomo_score: u8,
    pub signal_label: String,
    pub trend_status: String,
    pub distribution_status: String,
    #[serde(default)]
    pub probability_profile: Option<ProbabilityProfile>,
    #[serde(default)]
    pub predictive: Option<PredictiveBreakdown>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breakdown: Vec<StageRecord>,
    pub logo_url: Option<String>,
    pub source_url: String,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Gathers data for one candidate and runs the configured stages over it.
pub struct ScoringPipeline {
    source: Arc<dyn DataSource>,
    config: ScoringConfig,
    call_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl ScoringPipeline {
    pub fn new(
        source: Arc<dyn DataSource>,
        config: ScoringConfig,
        call_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            config,
            call_timeout,
            clock,
        }
    }

    pub fn strategy(&self) -> ScoringStrategy {
        self.config.strategy
    }

    /// Check the fields every stage depends on.
    pub fn validate(candidate: &Candidate) -> Result<CandidateView, ScoreError> {
        let malformed = |reason: &str| ScoreError::MalformedCandidate {
            id: candidate.id.clone(),
            reason: reason.to_string(),
        };

        let price = candidate.price.ok_or_else(|| malformed("missing price"))?;
        if !price.is_finite() || price < 0.0 {
            return Err(malformed("invalid price"));
        }
        let volume = candidate.volume.ok_or_else(|| malformed("missing volume"))?;
        if !volume.is_finite() || volume < 0.0 {
            return Err(malformed("invalid volume"));
        }

        Ok(CandidateView {
            id: candidate.id.clone(),
            symbol: candidate.symbol.clone(),
            name: candidate.name.clone(),
            price,
            volume,
            market_cap: candidate.market_cap.filter(|c| c.is_finite()),
            market_cap_rank: candidate.rank(),
            change_1h: candidate.change_1h(),
            change_24h: candidate.change_24h(),
        })
    }

    /// Await a lookup under the per-call deadline, degrading to `None`.
    async fn soft<T, F>(&self, what: &'static str, id: &str, lookup: F) -> Option<T>
    where
        F: Future<Output = Result<Option<T>, ProviderError>>,
    {
        match tokio::time::timeout(self.call_timeout, lookup).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                debug!(id = %id, lookup = what, error = %e, "Lookup failed, stage degrades");
                None
            }
            Err(_) => {
                debug!(id = %id, lookup = what, "Lookup timed out, stage degrades");
                None
            }
        }
    }

    /// Fetch everything the enabled stages read.
    pub async fn gather(&self, view: CandidateView) -> ScoringContext {
        let strategy = self.config.strategy;
        let id = view.id.clone();
        let source = &self.source;

        let primary = self
            .soft("history", &id, source.fetch_history(&id, PRIMARY_HISTORY_DAYS))
            .await;
        let volume_spike = base::volume_spike(view.volume, primary.as_ref());

        let want_trending = strategy.research_enabled() && self.config.sentiment_enabled;
        let want_predictive = strategy.predictive_enabled();
        let [w14, w21, w30] = PREDICTIVE_WINDOWS;

        let (trend_history, tickers, trending, history_14d, history_21d, history_30d) = tokio::join!(
            self.soft("trend_history", &id, source.fetch_history(&id, PRIMARY_HISTORY_DAYS)),
            self.soft("tickers", &id, source.fetch_tickers(&id)),
            async {
                if !want_trending {
                    return None;
                }
                self.soft("trending", &id, async { source.fetch_trending().await.map(Some) })
                    .await
            },
            async {
                if !want_predictive {
                    return None;
                }
                self.soft("history_14d", &id, source.fetch_history(&id, w14)).await
            },
            async {
                if !want_predictive {
                    return None;
                }
                self.soft("history_21d", &id, source.fetch_history(&id, w21)).await
            },
            async {
                if !want_predictive {
                    return None;
                }
                self.soft("history_30d", &id, source.fetch_history(&id, w30)).await
            },
        );

        ScoringContext {
            candidate: view,
            volume_spike,
            trend_history,
            tickers,
            trending,
            predictive: PredictiveInputs {
                history_14d,
                history_21d,
                history_30d,
            },
            now: self.clock.now(),
        }
    }

    /// Score one candidate end to end.
    pub async fn score(&self, candidate: &Candidate) -> Result<ScoredOpportunity, ScoreError> {
        let view = Self::validate(candidate)?;
        let ctx = self.gather(view).await;
        let eval = evaluate(&ctx, &self.config);

        debug!(
            id = %candidate.id,
            score = eval.score,
            spike = ctx.volume_spike,
            signal = %eval.signal_label,
            "Candidate scored"
        );

        let c = ctx.candidate;
        Ok(ScoredOpportunity {
            source_url: candidate.source_url(),
            logo_url: candidate.image_url.clone(),
            id: c.id,
            symbol: c.symbol,
            name: c.name,
            price: c.price,
            volume: c.volume,
            market_cap: c.market_cap,
            market_cap_rank: c.market_cap_rank,
            pct_change_1h: c.change_1h,
            pct_change_24h: c.change_24h,
            volume_spike: ctx.volume_spike,
            fomo_score: eval.score,
            signal_label: eval.signal_label,
            trend_status: eval.trend_status,
            distribution_status: eval.distribution_status,
            probability_profile: eval.probability,
            predictive: eval.predictive,
            breakdown: eval.breakdown,
        })
    }
}
