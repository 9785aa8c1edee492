//! Human-readable signal label for a clamped score.

use super::trend::TrendStatus;

pub fn base_label(score: u8, change_24h: f64) -> &'static str {
    let change = change_24h.abs();

    match score {
        90.. if change < 5.0 => "Stealth Accumulation",
        85.. => "High Conviction",
        75.. => "Early Momentum",
        60.. => "Volume Building",
        40.. if change > 20.0 => "Already Pumping",
        35.. => "Moderate Activity",
        20.. => "Watch List",
        _ => "Low Activity",
    }
}

/// Label with trend overrides applied.
pub fn label_for(score: u8, change_24h: f64, trend_status: &str) -> &'static str {
    if trend_status == TrendStatus::Accelerating.as_str() && score >= 60 {
        "Accelerating Breakout"
    } else if trend_status == TrendStatus::LosingSteam.as_str() {
        "Losing Steam"
    } else {
        base_label(score, change_24h)
    }
}
