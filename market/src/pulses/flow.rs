//! Order-Flow Pulse.
//!
//! Tracks traded volume and resting-book pressure across ticks:
//!
//! ```text
//! tick_vol   = max(0, cum_vol - prev_cum_vol)      (0 on counter reset)
//! vol_ema    = α·tick_vol + (1-α)·vol_ema
//! vol_ratio  = min(cap, tick_vol / (vol_ema + ε))
//! imbalance  = (Σbid - Σask) / (Σbid + Σask + ε)
//! cvd        = (1-α_cvd)·cvd + α_cvd·(Σbid - Σask)
//! cvd_trend  = slope(last K cvd values)
//! ```
//!
//! `α_cvd` is either fixed or derived from the efficiency ratio of recent
//! prices: a trending tape lets new book pressure in faster than a choppy one.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pulses::{MarketPulse, PulseInput};
use crate::rolling_window::RollingWindow;
use crate::stats::{self, EPS};
use crate::types::BookSide;

/// CVD smoothing factor policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CvdSmoothing {
    Fixed {
        alpha: f64,
    },
    /// α = efficiency ratio of the last `window` prices, clamped to
    /// `[min_alpha, max_alpha]`.
    Adaptive {
        min_alpha: f64,
        max_alpha: f64,
        window: usize,
    },
}

impl Default for CvdSmoothing {
    fn default() -> Self {
        Self::Adaptive {
            min_alpha: 0.1,
            max_alpha: 0.5,
            window: 10,
        }
    }
}

impl CvdSmoothing {
    fn alpha(&self, prices: &RollingWindow) -> f64 {
        match *self {
            Self::Fixed { alpha } => alpha,
            Self::Adaptive {
                min_alpha,
                max_alpha,
                window,
            } => stats::efficiency_ratio(&prices.tail(window))
                .map_or(min_alpha, |er| er.clamp(min_alpha, max_alpha)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Smoothing factor of the per-tick volume EMA.
    pub volume_ema_alpha: f64,

    /// Upper clip for `tick_vol / vol_ema`, so a single print cannot
    /// dominate downstream scores.
    pub volume_ratio_cap: f64,

    pub cvd_smoothing: CvdSmoothing,

    /// Number of CVD samples the trend slope is fitted over. The trend is
    /// zero until this many samples exist.
    pub cvd_trend_window: usize,

    /// Lower bound of the dynamic imbalance threshold.
    pub imbalance_threshold_floor: f64,

    /// Multiplier applied to the recent imbalance standard deviation.
    pub imbalance_threshold_k: f64,

    /// Imbalance samples required before the deviation is trusted.
    pub imbalance_threshold_min_samples: usize,

    /// Smallest per-tick volume considered meaningful flow. Anything below
    /// it (including zero and reset-implied deltas) is treated as noise.
    pub min_meaningful_volume: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            volume_ema_alpha: 0.2,
            volume_ratio_cap: 10.0,
            cvd_smoothing: CvdSmoothing::default(),
            cvd_trend_window: 12,
            imbalance_threshold_floor: 0.1,
            imbalance_threshold_k: 1.0,
            imbalance_threshold_min_samples: 5,
            min_meaningful_volume: 100.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowState {
    /// Volume traded since the previous snapshot (never negative).
    pub tick_volume: f64,
    /// False on the first snapshot, which has no prior volume to diff.
    pub has_baseline: bool,
    /// Cumulative volume went backwards (session rollover).
    pub volume_reset: bool,
    /// `tick_volume` cleared the meaningful-flow threshold.
    pub meaningful_volume: bool,

    pub avg_volume_ema: f64,
    pub volume_ratio: f64,

    pub bid_total: f64,
    pub ask_total: f64,
    pub order_imbalance: f64,
    /// Dynamic threshold |imbalance| must exceed to count as directional.
    pub imbalance_threshold: f64,

    pub cvd: f64,
    pub cvd_alpha: f64,
    pub cvd_trend: f64,
}

/// Stateful order-flow pulse (per instrument).
pub struct FlowMonitor {
    config: FlowConfig,

    prev_cumulative_volume: Option<f64>,
    avg_volume_ema: f64,

    imbalance_history: RollingWindow,

    cvd: f64,
    cvd_history: RollingWindow,

    last: FlowState,
}

impl FlowMonitor {
    pub fn new(imbalance_capacity: usize, cvd_capacity: usize, config: FlowConfig) -> Self {
        Self {
            config,
            prev_cumulative_volume: None,
            avg_volume_ema: 0.0,
            imbalance_history: RollingWindow::new(imbalance_capacity),
            cvd: 0.0,
            cvd_history: RollingWindow::new(cvd_capacity),
            last: FlowState::default(),
        }
    }

    pub fn cvd(&self) -> f64 {
        self.cvd
    }

    pub fn cvd_history(&self) -> &RollingWindow {
        &self.cvd_history
    }

    pub fn imbalance_history(&self) -> &RollingWindow {
        &self.imbalance_history
    }

    pub fn prev_cumulative_volume(&self) -> Option<f64> {
        self.prev_cumulative_volume
    }

    /// Per-tick volume with the counter-reset rule applied.
    ///
    /// Returns `(tick_volume, has_baseline, volume_reset)`.
    fn tick_volume(&mut self, cumulative: f64) -> (f64, bool, bool) {
        let prev = self.prev_cumulative_volume.replace(cumulative);

        match prev {
            None => (0.0, false, false),
            Some(p) if cumulative < p => {
                warn!(
                    previous = p,
                    current = cumulative,
                    "cumulative volume decreased; treating as counter reset"
                );
                (0.0, true, true)
            }
            Some(p) => ((cumulative - p).max(0.0), true, false),
        }
    }

    fn imbalance_threshold(&self) -> f64 {
        let floor = self.config.imbalance_threshold_floor;

        if self.imbalance_history.len() < self.config.imbalance_threshold_min_samples {
            return floor;
        }

        stats::std_dev(&self.imbalance_history.to_vec())
            .map_or(floor, |sd| floor.max(self.config.imbalance_threshold_k * sd))
    }

    fn cvd_trend(&self) -> f64 {
        let k = self.config.cvd_trend_window;
        if k < 2 || self.cvd_history.len() < k {
            return 0.0;
        }

        stats::linear_slope(&self.cvd_history.tail(k)).unwrap_or(0.0)
    }
}

impl MarketPulse for FlowMonitor {
    type Output = FlowState;

    fn update(&mut self, input: PulseInput<'_>) {
        let snapshot = input.snapshot;

        let (tick_volume, has_baseline, volume_reset) = self.tick_volume(snapshot.cumulative_volume);

        let volume_ratio = if has_baseline {
            let a = self.config.volume_ema_alpha;
            self.avg_volume_ema = a * tick_volume + (1.0 - a) * self.avg_volume_ema;

            (tick_volume / (self.avg_volume_ema + EPS)).min(self.config.volume_ratio_cap)
        } else {
            0.0
        };

        let bid_total = snapshot.total_quantity(BookSide::Bid);
        let ask_total = snapshot.total_quantity(BookSide::Ask);
        let delta = bid_total - ask_total;
        let order_imbalance = delta / (bid_total + ask_total + EPS);

        // Threshold is taken from prior ticks so a spike cannot widen its
        // own bar.
        let imbalance_threshold = self.imbalance_threshold();
        self.imbalance_history.push(order_imbalance);

        let cvd_alpha = self.config.cvd_smoothing.alpha(input.prices);
        self.cvd = (1.0 - cvd_alpha) * self.cvd + cvd_alpha * delta;
        self.cvd_history.push(self.cvd);

        let min_meaningful = self.config.min_meaningful_volume;

        self.last = FlowState {
            tick_volume,
            has_baseline,
            volume_reset,
            meaningful_volume: tick_volume > 0.0 && tick_volume >= min_meaningful,
            avg_volume_ema: self.avg_volume_ema,
            volume_ratio,
            bid_total,
            ask_total,
            order_imbalance,
            imbalance_threshold,
            cvd: self.cvd,
            cvd_alpha,
            cvd_trend: self.cvd_trend(),
        };
    }

    fn compute(&self) -> FlowState {
        self.last.clone()
    }

    fn reset(&mut self) {
        self.prev_cumulative_volume = None;
        self.avg_volume_ema = 0.0;
        self.imbalance_history.clear();
        self.cvd = 0.0;
        self.cvd_history.clear();
        self.last = FlowState::default();
    }
}
