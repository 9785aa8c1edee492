//! Multi-day volume and price trend.

use std::fmt;

use super::{ScoringContext, Stage, StageOutcome};

pub const STAGE_NAME: &str = "trend";

/// Trend contributions are bounded to ±15.
const TREND_BOUND: i32 = 15;

/// Minimum volume and price points for a trend read.
const MIN_POINTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendStatus {
    Accelerating,
    Building,
    Stable,
    Weakening,
    Declining,
    MomentumBuilding,
    LosingSteam,
    InsufficientData,
    Unknown,
}

impl TrendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendStatus::Accelerating => "Accelerating",
            TrendStatus::Building => "Building",
            TrendStatus::Stable => "Stable",
            TrendStatus::Weakening => "Weakening",
            TrendStatus::Declining => "Declining",
            TrendStatus::MomentumBuilding => "Momentum Building",
            TrendStatus::LosingSteam => "Losing Steam",
            TrendStatus::InsufficientData => "Insufficient Data",
            TrendStatus::Unknown => "Data Unavailable",
        }
    }
}

impl fmt::Display for TrendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Recent three-point volume average over the preceding baseline.
fn volume_trend(volumes: &[f64]) -> f64 {
    let n = volumes.len();
    let recent = mean(&volumes[n - 3..]);
    let baseline = if n >= 6 {
        mean(&volumes[n - 6..n - 3])
    } else {
        mean(&volumes[..n - 3])
    };

    if baseline > 0.0 {
        recent / baseline
    } else {
        1.0
    }
}

/// Period-over-period percentage changes.
fn price_changes(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0] * 100.0)
        .collect()
}

/// Change in the rate of price change; 0 with fewer than three changes.
fn acceleration(changes: &[f64]) -> f64 {
    let n = changes.len();
    if n < 3 {
        return 0.0;
    }

    let recent = mean(&changes[n - 2..]);
    let older = if n >= 4 {
        mean(&changes[n - 4..n - 2])
    } else {
        changes[0]
    };
    recent - older
}

/// Score a trend read from raw series and the 1h change.
pub fn analyze(prices: &[f64], volumes: &[f64], change_1h: f64) -> (i32, TrendStatus) {
    if volumes.len() < MIN_POINTS || prices.len() < MIN_POINTS {
        return (0, TrendStatus::InsufficientData);
    }

    let vol_trend = volume_trend(volumes);
    let accel = acceleration(&price_changes(prices));

    let (mut score, mut status) = if vol_trend > 2.0 {
        (8, TrendStatus::Accelerating)
    } else if vol_trend > 1.3 {
        (4, TrendStatus::Building)
    } else if vol_trend < 0.7 {
        (-8, TrendStatus::Declining)
    } else if vol_trend < 0.9 {
        (-4, TrendStatus::Weakening)
    } else {
        (0, TrendStatus::Stable)
    };

    if accel > 3.0 {
        score += 7;
        if status != TrendStatus::Accelerating {
            status = TrendStatus::MomentumBuilding;
        }
    } else if accel > 1.0 {
        score += 3;
    } else if accel < -3.0 {
        score -= 7;
        status = TrendStatus::LosingSteam;
    } else if accel < -1.0 {
        score -= 3;
    }

    if change_1h > 2.0 && accel > 0.0 {
        score += 5;
    } else if change_1h < -2.0 && accel < 0.0 {
        score -= 5;
    }

    (score.clamp(-TREND_BOUND, TREND_BOUND), status)
}

pub struct TrendStage;

impl Stage for TrendStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        let Some(history) = &ctx.trend_history else {
            return StageOutcome::neutral(TrendStatus::Unknown.as_str());
        };

        let (delta, status) = analyze(
            &history.price_values(),
            &history.volume_values(),
            ctx.candidate.change_1h,
        );
        StageOutcome::new(delta, status.as_str())
    }
}
