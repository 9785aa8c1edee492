//! Research-derived adjustments: calendar, volume sweet spot, market cap tier,
//! asset classification, and trending sentiment.

use chrono::Datelike;
use tracing::debug;

use fomo_common::config::{Bounds, ScoringConfig};

use super::{ScoringContext, Stage, StageOutcome};

/// Share of the subtotal the calendar multiplier may move.
const CALENDAR_SCALE: f64 = 0.1;

/// Daily volume is assumed to be about 5% of market cap.
const CAP_FROM_VOLUME: f64 = 20.0;

const OVER_WATCHED: [&str; 6] = ["bitcoin", "btc", "dogecoin", "doge", "shiba-inu", "shib"];

const PROVEN_WINNERS: [&str; 16] = [
    "cardano", "ada", "ethereum", "eth", "chainlink", "link", "cosmos", "atom", "solana", "sol",
    "polkadot", "dot", "avalanche", "avax", "polygon", "matic",
];

const UTILITY_KEYWORDS: [&str; 6] = ["chain", "network", "protocol", "finance", "defi", "layer"];

const SENTIMENT_BOOST: i32 = 10;

// ============================================================================
// Calendar
// ============================================================================

/// Day-of-week and month seasonality applied to the pre-research subtotal.
pub struct CalendarAdjustment {
    day_weights: Vec<f64>,
    month_weights: Vec<f64>,
    earnings_months: Vec<u32>,
    earnings_multiplier: f64,
}

impl CalendarAdjustment {
    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            day_weights: config.day_weights.clone(),
            month_weights: config.month_weights.clone(),
            earnings_months: config.earnings_months.clone(),
            earnings_multiplier: config.earnings_multiplier,
        }
    }

    pub fn multiplier(&self, weekday_from_monday: usize, month: u32) -> f64 {
        let day = self.day_weights.get(weekday_from_monday).copied().unwrap_or(1.0);
        let month_weight = month
            .checked_sub(1)
            .and_then(|i| self.month_weights.get(i as usize))
            .copied()
            .unwrap_or(1.0);
        let earnings = if self.earnings_months.contains(&month) {
            self.earnings_multiplier
        } else {
            1.0
        };

        day * month_weight * earnings
    }
}

impl Stage for CalendarAdjustment {
    fn name(&self) -> &'static str {
        "calendar"
    }

    fn evaluate(&self, ctx: &ScoringContext, running_total: i32) -> StageOutcome {
        let weekday = ctx.now.weekday().num_days_from_monday() as usize;
        let multiplier = self.multiplier(weekday, ctx.now.month());
        let delta = ((multiplier - 1.0) * running_total as f64 * CALENDAR_SCALE) as i32;

        StageOutcome::new(delta, format!("x{:.2} calendar", multiplier))
    }
}

// ============================================================================
// Volume Sweet Spot
// ============================================================================

pub struct VolumeSweetSpot {
    range: Bounds,
}

impl VolumeSweetSpot {
    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            range: config.volume_sweet_spot,
        }
    }
}

impl Stage for VolumeSweetSpot {
    fn name(&self) -> &'static str {
        "volume_sweet_spot"
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        let spike = ctx.volume_spike;

        if self.range.contains(spike) {
            StageOutcome::new(15, "Sweet spot spike")
        } else if spike > self.range.max {
            let penalty = (2.0 * (spike - self.range.max)).min(10.0) as i32;
            StageOutcome::new(-penalty, "Extreme spike")
        } else {
            StageOutcome::neutral("Below sweet spot")
        }
    }
}

// ============================================================================
// Market Cap Tier
// ============================================================================

pub struct MarketCapTier {
    sweet_spot: Bounds,
    mega_cap: f64,
}

impl MarketCapTier {
    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            sweet_spot: config.market_cap_sweet_spot,
            mega_cap: config.mega_cap_threshold,
        }
    }
}

/// Reported cap, or an estimate from volume when the feed omitted it.
pub fn effective_market_cap(ctx: &ScoringContext) -> f64 {
    let c = &ctx.candidate;
    match c.market_cap {
        Some(cap) if cap > 0.0 => cap,
        _ if c.price > 0.0 && c.volume > 0.0 => c.volume * CAP_FROM_VOLUME,
        _ => 0.0,
    }
}

impl Stage for MarketCapTier {
    fn name(&self) -> &'static str {
        "market_cap"
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        let cap = effective_market_cap(ctx);

        if cap <= 0.0 {
            StageOutcome::neutral("Unknown cap")
        } else if self.sweet_spot.contains(cap) {
            StageOutcome::new(12, "Mid-cap sweet spot")
        } else if cap < self.sweet_spot.min {
            StageOutcome::new(6, "Small cap")
        } else if cap > self.mega_cap {
            StageOutcome::new(-12, "Mega cap")
        } else {
            StageOutcome::neutral("Large cap")
        }
    }
}

// ============================================================================
// Asset Classification
// ============================================================================

/// Whole-word tokens of `"{id} {symbol}"`, with hyphenated ids also split.
fn asset_tokens(id: &str, symbol: &str) -> Vec<String> {
    let joined = format!("{} {}", id, symbol).to_lowercase();
    let mut tokens: Vec<String> = Vec::new();
    for word in joined.split_whitespace() {
        tokens.push(word.to_string());
        if word.contains('-') {
            tokens.extend(word.split('-').filter(|p| !p.is_empty()).map(str::to_string));
        }
    }
    tokens
}

pub struct AssetClassification;

impl Stage for AssetClassification {
    fn name(&self) -> &'static str {
        "classification"
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        let c = &ctx.candidate;
        let tokens = asset_tokens(&c.id, &c.symbol);
        let listed = |list: &[&str]| tokens.iter().any(|t| list.contains(&t.as_str()));

        if listed(&OVER_WATCHED) {
            debug!(id = %c.id, "Over-watched asset");
            StageOutcome::new(-10, "Over-watched")
        } else if listed(&PROVEN_WINNERS) {
            debug!(id = %c.id, "Proven winner");
            StageOutcome::new(10, "Proven winner")
        } else {
            let haystack = format!("{} {}", c.id, c.symbol).to_lowercase();
            if UTILITY_KEYWORDS.iter().any(|k| haystack.contains(k)) {
                StageOutcome::new(5, "Utility")
            } else {
                StageOutcome::neutral("Unclassified")
            }
        }
    }
}

// ============================================================================
// Sentiment
// ============================================================================

pub struct SentimentBoost;

impl Stage for SentimentBoost {
    fn name(&self) -> &'static str {
        "sentiment"
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        match &ctx.trending {
            Some(ids) if ids.iter().any(|id| id == &ctx.candidate.id) => {
                StageOutcome::new(SENTIMENT_BOOST, "Trending")
            }
            Some(_) => StageOutcome::neutral("Not trending"),
            None => StageOutcome::neutral("Sentiment unavailable"),
        }
    }
}
