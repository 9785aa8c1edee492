//! Multi-factor FOMO scoring.
//!
//! Scoring runs in two phases:
//!
//! 1. **Gather** ([`ScoringPipeline`]): fetch history, tickers, and the
//!    trending list for one candidate. Every fetch degrades to `None`.
//! 2. **Evaluate**: an ordered list of pure [`Stage`]s folds over a
//!    [`ScoringContext`]. Each stage sees the running total and returns a
//!    signed delta plus a diagnostic label.
//!
//! ```text
//! base → 24h → 1h → volume tier → illiquidity → trend → distribution
//!      → [calendar → sweet spot → market cap → classification → sentiment]
//!      → clamp → signal label → [predictive blend] → [probability profile]
//! ```
//!
//! Bracketed groups depend on the configured [`ScoringStrategy`].

pub mod base;
pub mod distribution;
pub mod pipeline;
pub mod predictive;
pub mod probability;
pub mod research;
pub mod signal;
pub mod trend;

pub use pipeline::{ScoreError, ScoredOpportunity, ScoringPipeline};
pub use predictive::PredictiveBreakdown;
pub use probability::{ConfidenceTier, MarketCondition, ProbabilityProfile};
pub use trend::TrendStatus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fomo_common::config::{ScoringConfig, ScoringStrategy};

use crate::data::{MarketHistory, TickerBook};

/// Scores are clamped to this range.
pub const MAX_SCORE: i32 = 100;

// ============================================================================
// Stage Contract
// ============================================================================

/// Result of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub delta: i32,
    pub label: String,
}

impl StageOutcome {
    pub fn new(delta: i32, label: impl Into<String>) -> Self {
        Self {
            delta,
            label: label.into(),
        }
    }

    /// No contribution.
    pub fn neutral(label: impl Into<String>) -> Self {
        Self::new(0, label)
    }
}

/// One independent scoring step.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, ctx: &ScoringContext, running_total: i32) -> StageOutcome;
}

/// A stage's contribution, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub delta: i32,
    pub label: String,
}

// ============================================================================
// Context
// ============================================================================

/// The validated candidate fields stages read.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateView {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub volume: f64,
    /// `None` when the feed did not report one
    pub market_cap: Option<f64>,
    pub market_cap_rank: u32,
    pub change_1h: f64,
    pub change_24h: f64,
}

impl CandidateView {
    pub fn abs_change_24h(&self) -> f64 {
        self.change_24h.abs()
    }

    pub fn market_cap_or_zero(&self) -> f64 {
        self.market_cap.unwrap_or(0.0)
    }
}

/// Extra history windows used by the predictive overlay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictiveInputs {
    pub history_14d: Option<MarketHistory>,
    pub history_21d: Option<MarketHistory>,
    pub history_30d: Option<MarketHistory>,
}

/// Everything the evaluation phase is allowed to look at.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub candidate: CandidateView,
    pub volume_spike: f64,
    pub trend_history: Option<MarketHistory>,
    pub tickers: Option<TickerBook>,
    /// `None` when sentiment is disabled or the lookup failed
    pub trending: Option<Vec<String>>,
    pub predictive: PredictiveInputs,
    pub now: DateTime<Utc>,
}

impl ScoringContext {
    /// A context with no fetched data; every network stage is neutral.
    pub fn bare(candidate: CandidateView, volume_spike: f64, now: DateTime<Utc>) -> Self {
        Self {
            candidate,
            volume_spike,
            trend_history: None,
            tickers: None,
            trending: None,
            predictive: PredictiveInputs::default(),
            now,
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Output of the pure evaluation phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: u8,
    /// Pre-blend reactive score
    pub reactive_score: u8,
    pub signal_label: String,
    pub trend_status: String,
    pub distribution_status: String,
    pub breakdown: Vec<StageRecord>,
    pub predictive: Option<PredictiveBreakdown>,
    pub probability: Option<ProbabilityProfile>,
}

/// Build the ordered stage list for a strategy.
pub fn stages_for(strategy: ScoringStrategy, config: &ScoringConfig) -> Vec<Box<dyn Stage>> {
    let mut stages: Vec<Box<dyn Stage>> = vec![
        Box::new(base::BaseScore),
        Box::new(base::PriceChangeModifier),
        Box::new(base::MomentumModifier),
        Box::new(base::VolumeTierModifier),
        Box::new(base::IlliquidityPenalty),
        Box::new(trend::TrendStage),
        Box::new(distribution::DistributionStage),
    ];

    if strategy.research_enabled() {
        // Calendar runs first so it sees the pre-research subtotal.
        stages.push(Box::new(research::CalendarAdjustment::from_config(config)));
        stages.push(Box::new(research::VolumeSweetSpot::from_config(config)));
        stages.push(Box::new(research::MarketCapTier::from_config(config)));
        stages.push(Box::new(research::AssetClassification));
        stages.push(Box::new(research::SentimentBoost));
    }

    stages
}

/// Fold stages left to right from zero.
pub fn run_stages(stages: &[Box<dyn Stage>], ctx: &ScoringContext) -> (i32, Vec<StageRecord>) {
    let mut total = 0;
    let mut breakdown = Vec::with_capacity(stages.len());

    for stage in stages {
        let outcome = stage.evaluate(ctx, total);
        total += outcome.delta;
        breakdown.push(StageRecord {
            stage: stage.name().to_string(),
            delta: outcome.delta,
            label: outcome.label,
        });
    }

    (total, breakdown)
}

pub fn clamp_score(total: i32) -> u8 {
    total.clamp(0, MAX_SCORE) as u8
}

fn label_of(breakdown: &[StageRecord], stage: &str) -> Option<String> {
    breakdown
        .iter()
        .find(|r| r.stage == stage)
        .map(|r| r.label.clone())
}

/// Run the full evaluation for a gathered context.
pub fn evaluate(ctx: &ScoringContext, config: &ScoringConfig) -> Evaluation {
    let strategy = config.strategy;
    let stages = stages_for(strategy, config);
    let (total, breakdown) = run_stages(&stages, ctx);

    let reactive_score = clamp_score(total);
    let trend_status =
        label_of(&breakdown, trend::STAGE_NAME).unwrap_or_else(|| TrendStatus::Unknown.to_string());
    let distribution_status = label_of(&breakdown, distribution::STAGE_NAME)
        .unwrap_or_else(|| distribution::NO_EXCHANGE_DATA.to_string());

    let mut score = reactive_score;
    let mut signal_label =
        signal::label_for(reactive_score, ctx.candidate.change_24h, &trend_status).to_string();

    let predictive = if strategy.predictive_enabled() {
        let breakdown = predictive::analyze(ctx);
        score = predictive::blend(reactive_score, breakdown.score, &config.blend);
        signal_label = predictive::decorate_label(&breakdown, &signal_label);
        Some(breakdown)
    } else {
        None
    };

    let probability = strategy.probability_enabled().then(|| {
        probability::profile(
            &probability::PatternInput {
                score,
                signal_label: &signal_label,
                volume_spike: ctx.volume_spike,
                market_cap: ctx.candidate.market_cap_or_zero(),
                change_24h: ctx.candidate.change_24h,
            },
            &config.patterns,
        )
    });

    Evaluation {
        score,
        reactive_score,
        signal_label,
        trend_status,
        distribution_status,
        breakdown,
        predictive,
        probability,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    /// Wednesday in a neutral month: every calendar weight is 1.0.
    pub fn neutral_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, 12, 0, 0).unwrap()
    }

    pub fn view() -> CandidateView {
        CandidateView {
            id: "plain-asset".into(),
            symbol: "pla".into(),
            name: "Plain Asset".into(),
            price: 1.0,
            volume: 2_000_000.0,
            market_cap: Some(20_000_000.0),
            market_cap_rank: 250,
            change_1h: 0.0,
            change_24h: 0.0,
        }
    }

    pub fn ctx(spike: f64) -> ScoringContext {
        ScoringContext::bare(view(), spike, neutral_now())
    }

    pub fn history(prices: &[f64], volumes: &[f64]) -> MarketHistory {
        MarketHistory {
            prices: prices.iter().enumerate().map(|(i, v)| (i as i64, *v)).collect(),
            volumes: volumes.iter().enumerate().map(|(i, v)| (i as i64, *v)).collect(),
        }
    }
}
