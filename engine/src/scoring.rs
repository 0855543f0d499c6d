//! Scoring & Decision
//!
//! Turns the pulse outputs into two bounded intent scores, then filters
//! them through a per-side cooldown and a minimum-of-last-N debounce before
//! any signal counts as confirmed.
//!
//! Buy components (forced to 0 while the risk lock is active):
//!
//! | component                           | points |
//! |-------------------------------------|--------|
//! | price inside `[stop, entry]`        | 25     |
//! | imbalance above dynamic threshold   | 20     |
//! | positive price slope                | 15     |
//! | positive CVD trend                  | 15     |
//! | dispersed bid book                  | 10     |
//! | stable support                      | 10     |
//! | confirmed rebound                   | 15     |
//! | meaningful traded volume            | 10     |
//!
//! Sell components (only when price has reached the exit price):
//!
//! | component                           | points |
//! |-------------------------------------|--------|
//! | at resistance                       | 20     |
//! | imbalance below negative threshold  | 25     |
//! | divergence: slope up, CVD trend down| 40     |
//! | negative price slope                | 15     |
//! | concentrated ask wall               | -15    |

use market::RollingWindow;
use market::pulses::{BookEntropy, FlowState, MomentumState, SupportState};
use serde::Serialize;

use crate::config::ScoringConfig;

pub const MAX_SCORE: f64 = 100.0;

/// Volatility scaling never shrinks a position below this share.
const MIN_VOLATILITY_FACTOR: f64 = 0.25;

/// Everything the scorer reads for one tick.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs<'a> {
    pub price: f64,
    pub stop_price: f64,
    pub support: &'a SupportState,
    pub flow: &'a FlowState,
    pub momentum: &'a MomentumState,
    pub entropy: &'a BookEntropy,
    pub rebound_confirmed: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuyBreakdown {
    pub near_support: f64,
    pub imbalance: f64,
    pub slope: f64,
    pub cvd_trend: f64,
    pub dispersion: f64,
    pub stability: f64,
    pub rebound: f64,
    pub volume: f64,
    /// Sum before clamping and lock override.
    pub raw: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SellBreakdown {
    pub at_resistance: f64,
    pub imbalance: f64,
    pub divergence: f64,
    pub slope: f64,
    pub concentration: f64,
    pub raw: f64,
}

/// Per-component view of both scores, for display.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoreBreakdown {
    pub buy: BuyBreakdown,
    pub sell: SellBreakdown,
    pub buy_cooling: bool,
    pub sell_cooling: bool,
}

fn points(cond: bool, pts: f64) -> f64 {
    if cond { pts } else { 0.0 }
}

pub fn buy_score(i: &ScoreInputs<'_>, cfg: &ScoringConfig) -> (f64, BuyBreakdown) {
    let mut b = BuyBreakdown {
        near_support: points(i.price >= i.stop_price && i.price <= i.support.entry_price, 25.0),
        imbalance: points(i.flow.order_imbalance > i.flow.imbalance_threshold, 20.0),
        slope: points(i.momentum.price_slope > 0.0, 15.0),
        cvd_trend: points(i.flow.cvd_trend > 0.0, 15.0),
        dispersion: points(i.entropy.bid_dispersion >= cfg.dispersed_entropy_ratio, 10.0),
        stability: points(i.support.is_stable, 10.0),
        rebound: points(i.rebound_confirmed, 15.0),
        volume: points(i.flow.meaningful_volume, 10.0),
        raw: 0.0,
    };

    b.raw = b.near_support
        + b.imbalance
        + b.slope
        + b.cvd_trend
        + b.dispersion
        + b.stability
        + b.rebound
        + b.volume;

    let score = if i.locked {
        0.0
    } else {
        b.raw.clamp(0.0, MAX_SCORE)
    };

    (score, b)
}

pub fn sell_score(i: &ScoreInputs<'_>, cfg: &ScoringConfig) -> (f64, SellBreakdown) {
    if i.price <= 0.0 || i.price < i.support.exit_price {
        return (0.0, SellBreakdown::default());
    }

    let slope = i.momentum.price_slope;
    let concentrated =
        i.flow.ask_total > 0.0 && i.entropy.ask_dispersion < cfg.concentrated_entropy_ratio;

    let mut b = SellBreakdown {
        at_resistance: 20.0,
        imbalance: points(i.flow.order_imbalance < -i.flow.imbalance_threshold, 25.0),
        divergence: points(slope > 0.0 && i.flow.cvd_trend < 0.0, 40.0),
        slope: points(slope < 0.0, 15.0),
        concentration: points(concentrated, -15.0),
        raw: 0.0,
    };

    b.raw = b.at_resistance + b.imbalance + b.divergence + b.slope + b.concentration;

    (b.raw.clamp(0.0, MAX_SCORE), b)
}

/// Minimum-of-last-N confirmation.
///
/// A single spike never confirms: every score in a full history must reach
/// the threshold.
#[derive(Debug)]
pub struct SignalDebounce {
    history: RollingWindow,
}

impl SignalDebounce {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: RollingWindow::new(capacity),
        }
    }

    pub fn push(&mut self, score: f64, threshold: f64) -> bool {
        self.history.push(score);
        self.is_confirmed(threshold)
    }

    pub fn is_confirmed(&self, threshold: f64) -> bool {
        self.history.is_full() && self.history.iter().all(|s| *s >= threshold)
    }

    pub fn history(&self) -> &RollingWindow {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Result of running one side's raw score through cooldown and debounce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideSignal {
    pub score: f64,
    pub cooling: bool,
    pub confirmed: bool,
}

/// Cooldown and debounce state for one side (buy or sell).
#[derive(Debug)]
pub struct SignalTracker {
    debounce: SignalDebounce,
    last_signal_ms: Option<u64>,
}

impl SignalTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            debounce: SignalDebounce::new(capacity),
            last_signal_ms: None,
        }
    }

    pub fn last_signal_ms(&self) -> Option<u64> {
        self.last_signal_ms
    }

    pub fn history(&self) -> &RollingWindow {
        self.debounce.history()
    }

    /// Scale, debounce and stamp.
    ///
    /// The signal time is stamped when the side becomes confirmed outside a
    /// cooldown; later scores of that side are scaled by `cooldown_factor`
    /// until `cooldown_secs` have elapsed.
    pub fn process(&mut self, raw: f64, ts_ms: u64, cfg: &ScoringConfig) -> SideSignal {
        let cooling = self.last_signal_ms.is_some_and(|last| {
            ts_ms.saturating_sub(last) < cfg.cooldown_secs.saturating_mul(1_000)
        });

        let score = if cooling {
            (raw * cfg.cooldown_factor).clamp(0.0, MAX_SCORE)
        } else {
            raw.clamp(0.0, MAX_SCORE)
        };

        let confirmed = self.debounce.push(score, cfg.confirm_threshold);

        if confirmed && !cooling {
            self.last_signal_ms = Some(ts_ms);
        }

        SideSignal {
            score,
            cooling,
            confirmed,
        }
    }

    pub fn reset(&mut self) {
        self.debounce.reset();
        self.last_signal_ms = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Confirmed buy: commit the full position.
    Commit,
    /// Unconfirmed but promising: take a small probe position.
    Probe,
    Hold,
    /// Risk lock active: no new entries.
    Locked,
}

impl Recommendation {
    pub fn decide(locked: bool, buy: &SideSignal, cfg: &ScoringConfig) -> Self {
        if locked {
            Self::Locked
        } else if buy.confirmed {
            Self::Commit
        } else if buy.score >= cfg.probe_threshold {
            Self::Probe
        } else {
            Self::Hold
        }
    }
}

/// Suggested capital share in percent.
///
/// Step function of the recommendation, shrunk by
/// `reference_volatility / volatility` (floored) once volatility exceeds the
/// reference.
pub fn position_percent(
    recommendation: Recommendation,
    volatility: f64,
    reference_volatility: f64,
    cfg: &ScoringConfig,
) -> f64 {
    let base = match recommendation {
        Recommendation::Commit => cfg.full_position_pct,
        Recommendation::Probe => cfg.probe_position_pct,
        Recommendation::Hold | Recommendation::Locked => return 0.0,
    };

    let factor = if volatility > reference_volatility && volatility > 0.0 {
        (reference_volatility / volatility).max(MIN_VOLATILITY_FACTOR)
    } else {
        1.0
    };

    base * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        support: SupportState,
        flow: FlowState,
        momentum: MomentumState,
        entropy: BookEntropy,
    }

    impl Fixture {
        /// Every buy component satisfied.
        fn bullish() -> Self {
            Self {
                support: SupportState {
                    weighted_bid_center: 10.0,
                    support: 10.0,
                    resistance: 10.5,
                    entry_price: 10.015,
                    exit_price: 10.48,
                    is_stable: true,
                },
                flow: FlowState {
                    order_imbalance: 0.5,
                    imbalance_threshold: 0.1,
                    cvd_trend: 3.0,
                    meaningful_volume: true,
                    ask_total: 100.0,
                    ..Default::default()
                },
                momentum: MomentumState {
                    price_slope: 0.001,
                    volatility: 0.001,
                },
                entropy: BookEntropy {
                    bid_dispersion: 0.9,
                    ask_dispersion: 0.9,
                    ..Default::default()
                },
            }
        }

        fn inputs(&self, price: f64, locked: bool, rebound: bool) -> ScoreInputs<'_> {
            ScoreInputs {
                price,
                stop_price: self.support.support * 0.996,
                support: &self.support,
                flow: &self.flow,
                momentum: &self.momentum,
                entropy: &self.entropy,
                rebound_confirmed: rebound,
                locked,
            }
        }
    }

    #[test]
    fn buy_score_is_clamped() {
        let f = Fixture::bullish();
        let (score, b) = buy_score(&f.inputs(10.0, false, true), &ScoringConfig::default());

        assert_eq!(b.raw, 120.0);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn lock_forces_buy_to_zero() {
        let f = Fixture::bullish();
        let (score, b) = buy_score(&f.inputs(10.0, true, true), &ScoringConfig::default());

        assert_eq!(score, 0.0);
        assert!(b.raw > 0.0);
    }

    #[test]
    fn buy_components_follow_their_gates() {
        let mut f = Fixture::bullish();
        f.flow.order_imbalance = 0.05;
        f.entropy.bid_dispersion = 0.5;
        f.support.is_stable = false;

        // Price above entry band.
        let (score, b) = buy_score(&f.inputs(10.2, false, false), &ScoringConfig::default());

        assert_eq!(b.near_support, 0.0);
        assert_eq!(b.imbalance, 0.0);
        assert_eq!(b.dispersion, 0.0);
        assert_eq!(b.stability, 0.0);
        assert_eq!(b.rebound, 0.0);
        assert_eq!(score, 15.0 + 15.0 + 10.0);
    }

    #[test]
    fn sell_is_gated_on_exit_price() {
        let f = Fixture::bullish();
        let (score, b) = sell_score(&f.inputs(10.2, false, false), &ScoringConfig::default());

        assert_eq!(score, 0.0);
        assert_eq!(b.raw, 0.0);
    }

    #[test]
    fn divergence_dominates_sell_score() {
        let mut f = Fixture::bullish();
        f.flow.cvd_trend = -2.0;

        let (score, b) = sell_score(&f.inputs(10.5, false, false), &ScoringConfig::default());

        assert_eq!(b.divergence, 40.0);
        assert_eq!(b.slope, 0.0);
        assert_eq!(score, 60.0);
    }

    #[test]
    fn concentrated_ask_wall_reduces_sell() {
        let mut f = Fixture::bullish();
        f.momentum.price_slope = -0.001;
        f.flow.order_imbalance = -0.5;
        f.entropy.ask_dispersion = 0.1;

        let (score, b) = sell_score(&f.inputs(10.5, false, false), &ScoringConfig::default());

        assert_eq!(b.concentration, -15.0);
        assert_eq!(score, 20.0 + 25.0 + 15.0 - 15.0);
    }

    #[test]
    fn single_spike_never_confirms() {
        let mut d = SignalDebounce::new(3);

        assert!(!d.push(100.0, 70.0));
        assert!(!d.push(0.0, 70.0));
        assert!(!d.push(0.0, 70.0));
    }

    #[test]
    fn three_high_scores_confirm() {
        let mut d = SignalDebounce::new(3);

        assert!(!d.push(80.0, 70.0));
        assert!(!d.push(75.0, 70.0));
        assert!(d.push(70.0, 70.0));
        assert!(!d.push(69.0, 70.0));
    }

    #[test]
    fn cooldown_scales_after_confirmation() {
        let cfg = ScoringConfig::default();
        let mut t = SignalTracker::new(3);

        t.process(90.0, 0, &cfg);
        t.process(90.0, 1_000, &cfg);
        let s = t.process(90.0, 2_000, &cfg);
        assert!(s.confirmed);
        assert_eq!(t.last_signal_ms(), Some(2_000));

        let s = t.process(90.0, 3_000, &cfg);
        assert!(s.cooling);
        assert!((s.score - 58.5).abs() < 1e-9);
        assert!(!s.confirmed);

        // Cooldown ends 60s after the stamp.
        let s = t.process(90.0, 62_000, &cfg);
        assert!(!s.cooling);
        assert_eq!(s.score, 90.0);
    }

    #[test]
    fn position_steps_and_volatility_scaling() {
        let cfg = ScoringConfig::default();

        assert_eq!(position_percent(Recommendation::Commit, 0.001, 0.005, &cfg), 40.0);
        assert_eq!(position_percent(Recommendation::Probe, 0.001, 0.005, &cfg), 10.0);
        assert_eq!(position_percent(Recommendation::Hold, 0.001, 0.005, &cfg), 0.0);
        assert_eq!(position_percent(Recommendation::Locked, 0.0, 0.005, &cfg), 0.0);

        assert!((position_percent(Recommendation::Commit, 0.01, 0.005, &cfg) - 20.0).abs() < 1e-9);
        assert!((position_percent(Recommendation::Commit, 0.1, 0.005, &cfg) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn recommendation_priority() {
        let cfg = ScoringConfig::default();
        let confirmed = SideSignal {
            score: 90.0,
            cooling: false,
            confirmed: true,
        };
        let probe = SideSignal {
            score: 45.0,
            cooling: false,
            confirmed: false,
        };

        assert_eq!(Recommendation::decide(true, &confirmed, &cfg), Recommendation::Locked);
        assert_eq!(Recommendation::decide(false, &confirmed, &cfg), Recommendation::Commit);
        assert_eq!(Recommendation::decide(false, &probe, &cfg), Recommendation::Probe);
        assert_eq!(
            Recommendation::decide(false, &SideSignal { score: 10.0, ..probe }, &cfg),
            Recommendation::Hold
        );
    }
}
