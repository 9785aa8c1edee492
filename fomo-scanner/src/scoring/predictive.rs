//! Predictive overlay.
//!
//! An independent 0-100 score that looks for setups *before* the price
//! moves: volume building under a flat price, accelerating weekly volume,
//! DEX-led concentration, seasonal timing, tight consolidation, and small
//! unranked assets. It is blended with the reactive score.

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};

use fomo_common::config::BlendWeights;

use super::distribution::volume_by_exchange;
use super::{clamp_score, ScoringContext};
use crate::data::TickerBook;

const STEALTH_CAP: i32 = 30;
const ACCELERATION_CAP: i32 = 25;
const WHALE_CAP: i32 = 20;
const TIMING_CAP: i32 = 15;
const TECHNICAL_CAP: i32 = 10;
const DIP_BUYING_CAP: i32 = 7;

const WHALE_DEX_MARKERS: [&str; 4] = ["uniswap", "pancake", "dex", "aerodrome"];
const FRESH_NAME_MARKERS: [&str; 4] = ["2024", "v2", "new", "gen2"];

/// Per-signal contributions of the overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictiveBreakdown {
    pub score: u8,
    pub signal: String,
    pub stealth_accumulation: i32,
    pub volume_acceleration: i32,
    pub whale_concentration: i32,
    pub market_timing: i32,
    pub technical_setup: i32,
    pub outlier_bonus: i32,
    /// Names of the sub-signals that fired strongly
    pub signals: Vec<String>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        1.0
    }
}

// ============================================================================
// Sub-signals
// ============================================================================

/// Share of consecutive steps that went up.
fn trend_consistency(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let ups = values.windows(2).filter(|w| w[1] > w[0]).count();
    ups as f64 / (values.len() - 1) as f64
}

/// Volume jumps on down days.
fn dip_buying(volumes: &[f64], prices: &[f64]) -> i32 {
    if volumes.len() != prices.len() || volumes.len() < 7 {
        return 0;
    }

    let mut score = 0;
    for i in 3..prices.len() - 1 {
        if prices[i - 1] <= 0.0 || volumes[i - 1] <= 0.0 {
            continue;
        }
        let price_change = (prices[i] - prices[i - 1]) / prices[i - 1] * 100.0;
        let volume_change = (volumes[i] - volumes[i - 1]) / volumes[i - 1] * 100.0;

        if price_change < -2.0 && volume_change > 50.0 {
            score += 3;
        } else if price_change < 0.0 && volume_change > 20.0 {
            score += 1;
        }
    }
    score.min(DIP_BUYING_CAP)
}

pub fn stealth_accumulation(prices: &[f64], volumes: &[f64]) -> i32 {
    let n = volumes.len();
    if n < 7 || prices.len() < 7 {
        return 0;
    }

    let recent = mean(&volumes[n - 3..]).unwrap_or(0.0);
    let older = mean(&volumes[n.saturating_sub(10)..n - 3]).unwrap_or(0.0);
    let growth = ratio(recent, older);

    let reference = prices[prices.len() - 7];
    let change = if reference > 0.0 {
        (prices[prices.len() - 1] - reference) / reference * 100.0
    } else {
        0.0
    };

    let mut score = if growth >= 2.0 && change.abs() < 5.0 {
        25
    } else if growth >= 1.5 && change.abs() < 10.0 {
        15
    } else if growth >= 1.2 && change < 0.0 {
        10
    } else {
        0
    };

    if trend_consistency(&volumes[n - 7..]) > 0.7 {
        score += 8;
    }
    score += dip_buying(volumes, prices);

    score.min(STEALTH_CAP)
}

pub fn volume_acceleration(volumes: &[f64]) -> i32 {
    let n = volumes.len();
    if n < 14 {
        return 0;
    }

    let week1 = mean(&volumes[n - 7..]).unwrap_or(0.0);
    let week2 = mean(&volumes[n - 14..n - 7]).unwrap_or(0.0);
    let recent_growth = ratio(week1, week2);
    let previous_growth = match mean(&volumes[n.saturating_sub(21)..n - 14]) {
        Some(week3) => ratio(week2, week3),
        None => 1.0,
    };
    let accel = ratio(recent_growth, previous_growth);

    let mut score = if accel >= 2.0 {
        20
    } else if accel >= 1.5 {
        12
    } else if accel >= 1.2 {
        6
    } else {
        0
    };

    if recent_growth > 1.3 && previous_growth > 1.2 {
        score += 5;
    }

    score.min(ACCELERATION_CAP)
}

pub fn whale_concentration(book: &TickerBook) -> i32 {
    let venues = volume_by_exchange(book);
    let total: f64 = venues.iter().map(|(_, v)| v).sum();
    let Some((top_name, top_volume)) = venues.first() else {
        return 0;
    };
    if total <= 0.0 {
        return 0;
    }

    let top_share = top_volume / total;
    let top_lower = top_name.to_lowercase();
    let mut score = 0;

    if WHALE_DEX_MARKERS.iter().any(|m| top_lower.contains(m)) {
        if (0.6..=0.9).contains(&top_share) {
            score += 15;
        } else if top_share > 0.9 {
            score += 8;
        }
    }

    let active = venues.iter().filter(|(_, v)| *v > total * 0.05).count();
    if active >= 3 && top_share < 0.7 {
        score += 10;
    }

    score.min(WHALE_CAP)
}

pub fn market_timing(ctx: &ScoringContext) -> i32 {
    let mut score = 0;

    if matches!(ctx.now.weekday(), Weekday::Tue | Weekday::Fri) {
        score += 5;
    }
    if matches!(ctx.now.month(), 4 | 10 | 11) {
        score += 5;
    }
    let cap = ctx.candidate.market_cap_or_zero();
    if (10_000_000.0..=100_000_000.0).contains(&cap) {
        score += 5;
    }

    score.min(TIMING_CAP)
}

pub fn technical_setup(prices: &[f64], current_price: f64) -> i32 {
    if prices.len() < 20 {
        return 0;
    }

    let window = &prices[prices.len() - 14..];
    let high = window.iter().copied().fold(f64::MIN, f64::max);
    let low = window.iter().copied().fold(f64::MAX, f64::min);
    if low <= 0.0 || high <= low {
        return 0;
    }

    let mut score = 0;
    let range_pct = (high - low) / low * 100.0;
    if (5.0..=25.0).contains(&range_pct) {
        score += 6;
    }

    let position = (current_price - low) / (high - low);
    if (0.3..=0.7).contains(&position) {
        score += 2;
    } else if position > 0.8 {
        score += 4;
    }

    score.min(TECHNICAL_CAP)
}

pub fn outlier_bonus(ctx: &ScoringContext) -> i32 {
    let cap = ctx.candidate.market_cap_or_zero();
    let rank = ctx.candidate.market_cap_rank;

    let mut bonus = if cap < 50_000_000.0 && rank > 1000 {
        15
    } else if cap < 100_000_000.0 && rank > 500 {
        10
    } else if rank > 300 {
        5
    } else {
        0
    };

    let name = ctx.candidate.name.to_lowercase();
    if FRESH_NAME_MARKERS.iter().any(|m| name.contains(m)) {
        bonus += 5;
    }
    bonus
}

// ============================================================================
// Overlay
// ============================================================================

pub fn prediction_signal(score: u8) -> &'static str {
    match score {
        80.. => "HIGH PUMP PROBABILITY",
        65.. => "STRONG ACCUMULATION",
        50.. => "BUILDING MOMENTUM",
        35.. => "EARLY SIGNALS",
        20.. => "WATCH CLOSELY",
        _ => "LOW PREDICTION",
    }
}

/// Run every sub-signal over the gathered context.
pub fn analyze(ctx: &ScoringContext) -> PredictiveBreakdown {
    let inputs = &ctx.predictive;

    let stealth = inputs
        .history_14d
        .as_ref()
        .map(|h| stealth_accumulation(&h.price_values(), &h.volume_values()))
        .unwrap_or(0);
    let acceleration = inputs
        .history_21d
        .as_ref()
        .map(|h| volume_acceleration(&h.volume_values()))
        .unwrap_or(0);
    let whale = ctx.tickers.as_ref().map(whale_concentration).unwrap_or(0);
    let timing = market_timing(ctx);
    let technical = inputs
        .history_30d
        .as_ref()
        .map(|h| technical_setup(&h.price_values(), ctx.candidate.price))
        .unwrap_or(0);
    let outlier = outlier_bonus(ctx);

    let mut signals = Vec::new();
    for (fired, name) in [
        (stealth >= 20, "Stealth Accumulation"),
        (acceleration >= 15, "Volume Building"),
        (whale >= 12, "Whale Activity"),
        (timing >= 10, "Market Timing"),
        (technical >= 6, "Technical Setup"),
        (outlier > 0, "Outlier Gem"),
    ] {
        if fired {
            signals.push(name.to_string());
        }
    }

    let score = clamp_score(stealth + acceleration + whale + timing + technical + outlier);

    PredictiveBreakdown {
        score,
        signal: prediction_signal(score).to_string(),
        stealth_accumulation: stealth,
        volume_acceleration: acceleration,
        whale_concentration: whale,
        market_timing: timing,
        technical_setup: technical,
        outlier_bonus: outlier,
        signals,
    }
}

/// Weighted blend of reactive and predictive scores, truncated.
pub fn blend(reactive: u8, predictive: u8, weights: &BlendWeights) -> u8 {
    let combined = weights.reactive * reactive as f64 + weights.predictive * predictive as f64;
    clamp_score(combined as i32)
}

/// Prefix or replace the reactive label with the prediction signal.
pub fn decorate_label(breakdown: &PredictiveBreakdown, label: &str) -> String {
    if breakdown.score >= 65 {
        breakdown.signal.clone()
    } else if breakdown.score >= 35 {
        format!("{} | {}", breakdown.signal, label)
    } else {
        label.to_string()
    }
}
