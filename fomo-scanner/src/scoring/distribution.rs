//! Exchange concentration of traded volume.

use std::collections::HashMap;

use super::{ScoringContext, Stage, StageOutcome};
use crate::data::TickerBook;

pub const STAGE_NAME: &str = "distribution";
pub const NO_EXCHANGE_DATA: &str = "No Exchange Data";
pub const NO_VOLUME_DATA: &str = "No Volume Data";

const DEX_MARKERS: [&str; 4] = ["dex", "uniswap", "pancake", "unknown"];

/// USD volume per exchange, largest first.
pub fn volume_by_exchange(book: &TickerBook) -> Vec<(String, f64)> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for ticker in &book.tickers {
        if ticker.usd_volume.is_finite() && ticker.usd_volume > 0.0 {
            *totals.entry(ticker.exchange_name.as_str()).or_default() += ticker.usd_volume;
        }
    }

    let mut venues: Vec<(String, f64)> = totals
        .into_iter()
        .map(|(name, volume)| (name.to_string(), volume))
        .collect();
    venues.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    venues
}

pub fn analyze(book: &TickerBook) -> (i32, String) {
    if book.tickers.is_empty() {
        return (0, NO_EXCHANGE_DATA.to_string());
    }

    let venues = volume_by_exchange(book);
    let total: f64 = venues.iter().map(|(_, v)| v).sum();
    let Some((top_name, top_volume)) = venues.first() else {
        return (0, NO_VOLUME_DATA.to_string());
    };
    if total <= 0.0 {
        return (0, NO_VOLUME_DATA.to_string());
    }

    let top_share = top_volume / total;
    let (mut score, mut status) = if top_share > 0.9 {
        (-15, "Single Exchange Dominance".to_string())
    } else if top_share > 0.7 {
        (-8, "High Concentration Risk".to_string())
    } else if top_share > 0.5 {
        (-3, "Moderate Concentration".to_string())
    } else {
        let significant = venues.iter().filter(|(_, v)| v / total > 0.01).count();
        if significant >= 5 {
            (10, "Well Distributed".to_string())
        } else if significant >= 3 {
            (5, "Good Distribution".to_string())
        } else {
            (0, "Limited Distribution".to_string())
        }
    };

    let top_lower = top_name.to_lowercase();
    if top_share > 0.6 && DEX_MARKERS.iter().any(|m| top_lower.contains(m)) {
        score -= 5;
        status.push_str(" (DEX Heavy)");
    }

    (score, status)
}

pub struct DistributionStage;

impl Stage for DistributionStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        match &ctx.tickers {
            Some(book) => {
                let (delta, status) = analyze(book);
                StageOutcome::new(delta, status)
            }
            None => StageOutcome::neutral(NO_EXCHANGE_DATA),
        }
    }
}
