//! Probability overlay.
//!
//! Matches a finished score against a table of historical outcome patterns
//! and turns the sample-weighted outcomes into a win rate, a risk/reward
//! ratio, an expected value, and a trading-desk style signal.

use serde::{Deserialize, Serialize};
use std::fmt;

use fomo_common::config::HistoricalPattern;

/// Outcome assumed when no pattern matches.
const BASELINE_WIN_RATE: f64 = 0.45;
const BASELINE_GAIN: f64 = 8.0;
const BASELINE_LOSS: f64 = 6.0;
const BASELINE_HORIZON_HOURS: u32 = 24;

/// Below this many samples the win rate is pulled toward a coin flip.
const SHRINK_BELOW_SAMPLES: u32 = 100;
/// Below this many samples the confidence tier drops one step.
const DOWNGRADE_BELOW_SAMPLES: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn from_win_rate(win_rate: f64) -> Self {
        if win_rate >= 0.75 {
            Self::High
        } else if win_rate >= 0.55 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn downgrade(self) -> Self {
        match self {
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketCondition {
    Bull,
    Bear,
    Sideways,
}

impl MarketCondition {
    pub fn from_change_24h(change_24h: f64) -> Self {
        if change_24h > 5.0 {
            Self::Bull
        } else if change_24h < -5.0 {
            Self::Bear
        } else {
            Self::Sideways
        }
    }

    pub fn risk_reward_multiplier(self) -> f64 {
        match self {
            Self::Bull => 1.2,
            Self::Bear => 0.8,
            Self::Sideways => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityProfile {
    pub win_rate: f64,
    pub risk_reward: f64,
    pub confidence_tier: ConfidenceTier,
    pub expected_value: f64,
    pub matched_patterns: Vec<String>,
    pub professional_signal: String,
    pub market_condition: MarketCondition,
    pub sample_size: u32,
    pub horizon_hours: u32,
}

/// What a pattern is matched against.
#[derive(Debug, Clone, Copy)]
pub struct PatternInput<'a> {
    pub score: u8,
    pub signal_label: &'a str,
    pub volume_spike: f64,
    pub market_cap: f64,
    pub change_24h: f64,
}

pub fn matches(pattern: &HistoricalPattern, input: &PatternInput<'_>) -> bool {
    let abs_change = input.change_24h.abs();

    pattern.min_score.map_or(true, |m| input.score >= m)
        && pattern.max_score.map_or(true, |m| input.score <= m)
        && pattern.min_spike.map_or(true, |m| input.volume_spike >= m)
        && pattern.max_market_cap.map_or(true, |m| input.market_cap <= m)
        && pattern.min_abs_change_24h.map_or(true, |m| abs_change >= m)
        && pattern.max_abs_change_24h.map_or(true, |m| abs_change <= m)
        && pattern
            .label_contains
            .as_deref()
            .map_or(true, |k| input.signal_label.contains(k))
}

pub fn professional_signal(expected_value: f64, tier: ConfidenceTier) -> &'static str {
    if expected_value >= 1.0 && tier == ConfidenceTier::High {
        "STRONG BUY"
    } else if expected_value >= 0.5 && tier >= ConfidenceTier::Medium {
        "BUY"
    } else if expected_value >= 0.2 {
        "SPECULATIVE BUY"
    } else if expected_value > 0.0 {
        "WATCH"
    } else {
        "AVOID"
    }
}

/// Sample-weighted aggregate of the matched patterns.
struct Aggregate {
    win_rate: f64,
    risk_reward: f64,
    sample_size: u32,
    horizon_hours: u32,
}

fn aggregate(matched: &[&HistoricalPattern]) -> Aggregate {
    let total: u64 = matched.iter().map(|p| u64::from(p.sample_size)).sum();
    if matched.is_empty() {
        return Aggregate {
            win_rate: BASELINE_WIN_RATE,
            risk_reward: BASELINE_GAIN / BASELINE_LOSS,
            sample_size: 0,
            horizon_hours: BASELINE_HORIZON_HOURS,
        };
    }

    // Zero-sample patterns still count, equally weighted.
    let weight = |p: &HistoricalPattern| {
        if total > 0 {
            p.sample_size as f64
        } else {
            1.0
        }
    };
    let weights: f64 = matched.iter().map(|&p| weight(p)).sum();
    let weighted = |f: fn(&HistoricalPattern) -> f64| {
        matched.iter().map(|&p| f(p) * weight(p)).sum::<f64>()
    };

    let gains = weighted(|p| p.avg_gain);
    let losses = weighted(|p| p.avg_loss);
    let horizon = weighted(|p| p.horizon_hours as f64) / weights;

    Aggregate {
        win_rate: weighted(|p| p.win_rate) / weights,
        risk_reward: if losses > 0.0 { gains / losses } else { 1.0 },
        sample_size: u32::try_from(total).unwrap_or(u32::MAX),
        horizon_hours: horizon.round() as u32,
    }
}

/// Build a probability profile from the pattern table.
pub fn profile(input: &PatternInput<'_>, patterns: &[HistoricalPattern]) -> ProbabilityProfile {
    let matched: Vec<&HistoricalPattern> = patterns.iter().filter(|p| matches(p, input)).collect();
    let agg = aggregate(&matched);

    let condition = MarketCondition::from_change_24h(input.change_24h);
    let risk_reward = agg.risk_reward * condition.risk_reward_multiplier();

    let mut win_rate = agg.win_rate;
    if agg.sample_size < SHRINK_BELOW_SAMPLES {
        win_rate = 0.5 + (win_rate - 0.5) * 2.0 / 3.0;
    }

    let mut tier = ConfidenceTier::from_win_rate(win_rate);
    if agg.sample_size < DOWNGRADE_BELOW_SAMPLES {
        tier = tier.downgrade();
    }

    let expected_value = win_rate * risk_reward - (1.0 - win_rate);

    ProbabilityProfile {
        win_rate,
        risk_reward,
        confidence_tier: tier,
        expected_value,
        matched_patterns: matched.iter().map(|p| p.name.clone()).collect(),
        professional_signal: professional_signal(expected_value, tier).to_string(),
        market_condition: condition,
        sample_size: agg.sample_size,
        horizon_hours: agg.horizon_hours,
    }
}
