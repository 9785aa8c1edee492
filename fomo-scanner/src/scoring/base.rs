//! Reactive stages driven by the snapshot record and the volume spike.

use super::{ScoringContext, Stage, StageOutcome};
use crate::data::MarketHistory;

/// Neutral spike used when history cannot support a ratio.
pub const NEUTRAL_SPIKE: f64 = 1.0;

/// Ratio of the current volume to the mean of the prior history points.
///
/// The last history point is today's partial bucket and is left out.
pub fn volume_spike(current_volume: f64, history: Option<&MarketHistory>) -> f64 {
    let Some(history) = history else {
        return NEUTRAL_SPIKE;
    };
    if history.volumes.len() < 3 {
        return NEUTRAL_SPIKE;
    }

    let prior = &history.volumes[..history.volumes.len() - 1];
    let mean = prior.iter().map(|(_, v)| *v).sum::<f64>() / prior.len() as f64;
    if !(mean > 0.0) || !current_volume.is_finite() {
        return NEUTRAL_SPIKE;
    }

    (current_volume / mean).max(0.0)
}

/// Piecewise base score for a volume spike.
pub fn base_score(spike: f64) -> i32 {
    if spike >= 10.0 {
        60
    } else if spike >= 5.0 {
        45 + (3.0 * (spike - 5.0)) as i32
    } else if spike >= 2.5 {
        30 + (6.0 * (spike - 2.5)) as i32
    } else if spike >= 1.5 {
        15 + (15.0 * (spike - 1.5)) as i32
    } else {
        (10.0 * spike.max(0.0)) as i32
    }
}

pub struct BaseScore;

impl Stage for BaseScore {
    fn name(&self) -> &'static str {
        "base"
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        StageOutcome::new(
            base_score(ctx.volume_spike),
            format!("{:.1}x volume", ctx.volume_spike),
        )
    }
}

/// Rewards quiet price action under a spike, punishes pumps.
pub struct PriceChangeModifier;

impl Stage for PriceChangeModifier {
    fn name(&self) -> &'static str {
        "price_change_24h"
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        let change = ctx.candidate.abs_change_24h();
        let spike = ctx.volume_spike;

        if change < 2.0 && spike >= 3.0 {
            StageOutcome::new(25, "Stealth volume")
        } else if change < 5.0 && spike >= 2.0 {
            StageOutcome::new(15, "Quiet volume")
        } else if (5.0..=15.0).contains(&change) {
            StageOutcome::new(10, "Healthy move")
        } else if change > 50.0 {
            StageOutcome::new(-25, "Parabolic move")
        } else if change > 25.0 {
            StageOutcome::new(-15, "Extended move")
        } else {
            StageOutcome::neutral("Neutral")
        }
    }
}

/// Short-term momentum from the 1h change.
pub struct MomentumModifier;

impl Stage for MomentumModifier {
    fn name(&self) -> &'static str {
        "momentum_1h"
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        let h1 = ctx.candidate.change_1h;
        let h24 = ctx.candidate.change_24h;

        if h1 > 0.0 && h24 > 0.0 {
            StageOutcome::new((2.0 * h1).min(10.0) as i32, "Rising")
        } else if h1 < -2.0 {
            StageOutcome::new(-((2.0 * h1.abs()).min(15.0) as i32), "Dropping")
        } else if h1 < 0.0 && h24 > 0.0 {
            StageOutcome::new(1, "Pullback")
        } else {
            StageOutcome::neutral("Flat")
        }
    }
}

pub struct VolumeTierModifier;

impl Stage for VolumeTierModifier {
    fn name(&self) -> &'static str {
        "volume_tier"
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        let volume = ctx.candidate.volume;

        let delta = if volume > 10_000_000.0 {
            5
        } else if volume > 5_000_000.0 {
            3
        } else if volume > 1_000_000.0 {
            1
        } else if volume < 100_000.0 {
            -20
        } else if volume < 500_000.0 {
            -10
        } else {
            0
        };

        StageOutcome::new(delta, format!("${:.0} traded", volume))
    }
}

/// Expensive assets with thin books are hard to enter and exit.
pub struct IlliquidityPenalty;

impl Stage for IlliquidityPenalty {
    fn name(&self) -> &'static str {
        "illiquidity"
    }

    fn evaluate(&self, ctx: &ScoringContext, _running_total: i32) -> StageOutcome {
        let price = ctx.candidate.price;
        let volume = ctx.candidate.volume;

        if price > 1000.0 && volume < 1_000_000.0 {
            StageOutcome::new(-25, "Illiquid high price")
        } else if price > 100.0 && volume < 500_000.0 {
            StageOutcome::new(-15, "Thin high price")
        } else {
            StageOutcome::neutral("Liquid")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ctx, history};
    use super::*;
    use test_case::test_case;

    #[test_case(1.5, 15 ; "lower breakpoint")]
    #[test_case(2.5, 30 ; "mid breakpoint")]
    #[test_case(5.0, 45 ; "upper breakpoint")]
    #[test_case(10.0, 60 ; "cap breakpoint")]
    #[test_case(20.0, 60 ; "beyond cap")]
    #[test_case(1.0, 10 ; "neutral spike")]
    #[test_case(6.0, 48 ; "truncated slope")]
    #[test_case(0.0, 0 ; "no volume")]
    fn test_base_score(spike: f64, expected: i32) {
        assert_eq!(base_score(spike), expected);
    }

    #[test]
    fn test_base_scores_for_spike_scenario() {
        let scores: Vec<_> = [1.0, 6.0, 12.0].iter().map(|s| base_score(*s)).collect();
        assert_eq!(scores, vec![10, 48, 60]);
    }

    #[test]
    fn test_volume_spike_excludes_last_point() {
        let h = history(&[], &[100.0, 100.0, 100.0, 9999.0]);
        assert_eq!(volume_spike(500.0, Some(&h)), 5.0);
    }

    #[test]
    fn test_volume_spike_neutral_cases() {
        assert_eq!(volume_spike(500.0, None), NEUTRAL_SPIKE);
        let short = history(&[], &[100.0, 100.0]);
        assert_eq!(volume_spike(500.0, Some(&short)), NEUTRAL_SPIKE);
        let zero = history(&[], &[0.0, 0.0, 0.0]);
        assert_eq!(volume_spike(500.0, Some(&zero)), NEUTRAL_SPIKE);
    }

    #[test]
    fn test_price_change_first_match_wins() {
        let mut c = ctx(3.5);
        c.candidate.change_24h = -1.0;
        assert_eq!(PriceChangeModifier.evaluate(&c, 0).delta, 25);

        c.volume_spike = 2.0;
        c.candidate.change_24h = 4.0;
        assert_eq!(PriceChangeModifier.evaluate(&c, 0).delta, 15);

        c.candidate.change_24h = 12.0;
        assert_eq!(PriceChangeModifier.evaluate(&c, 0).delta, 10);

        c.candidate.change_24h = 30.0;
        assert_eq!(PriceChangeModifier.evaluate(&c, 0).delta, -15);

        c.candidate.change_24h = -70.0;
        assert_eq!(PriceChangeModifier.evaluate(&c, 0).delta, -25);

        c.candidate.change_24h = 20.0;
        assert_eq!(PriceChangeModifier.evaluate(&c, 0).delta, 0);
    }

    #[test]
    fn test_momentum_modifier() {
        let mut c = ctx(1.0);
        c.candidate.change_24h = 3.0;
        c.candidate.change_1h = 2.6;
        assert_eq!(MomentumModifier.evaluate(&c, 0).delta, 5);

        c.candidate.change_1h = 8.0;
        assert_eq!(MomentumModifier.evaluate(&c, 0).delta, 10);

        c.candidate.change_1h = -0.5;
        assert_eq!(MomentumModifier.evaluate(&c, 0).delta, 1);

        c.candidate.change_1h = -3.2;
        assert_eq!(MomentumModifier.evaluate(&c, 0).delta, -6);

        c.candidate.change_1h = -12.0;
        assert_eq!(MomentumModifier.evaluate(&c, 0).delta, -15);
    }

    #[test]
    fn test_volume_tiers() {
        let mut c = ctx(1.0);
        for (volume, delta) in [
            (20e6, 5),
            (6e6, 3),
            (2e6, 1),
            (800e3, 0),
            (300e3, -10),
            (50e3, -20),
        ] {
            c.candidate.volume = volume;
            assert_eq!(VolumeTierModifier.evaluate(&c, 0).delta, delta, "volume {}", volume);
        }
    }

    #[test]
    fn test_illiquidity_penalty() {
        let mut c = ctx(1.0);
        c.candidate.price = 2500.0;
        c.candidate.volume = 900_000.0;
        assert_eq!(IlliquidityPenalty.evaluate(&c, 0).delta, -25);

        c.candidate.price = 250.0;
        c.candidate.volume = 400_000.0;
        assert_eq!(IlliquidityPenalty.evaluate(&c, 0).delta, -15);

        c.candidate.volume = 600_000.0;
        assert_eq!(IlliquidityPenalty.evaluate(&c, 0).delta, 0);
    }
}
