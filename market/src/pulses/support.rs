//! Support / Resistance Pulse.
//!
//! Derives a defensive floor (support) and a supply ceiling (resistance)
//! from the visible book, and confirms the floor against recent prices.
//!
//! ## Definitions
//!
//! ```text
//! bid_center = Σ(bid_px · bid_qty) / Σ bid_qty        (fallback: last_price)
//! support    = median(bid_center history)             (< percentile_window prices)
//!            = min(median(bid_center history),
//!                  percentile(last prices, pct))      (otherwise)
//! resistance = Σ(ask_px · ask_qty) / Σ ask_qty        (fallback: last_price)
//! entry      = support    · (1 + ε)
//! exit       = resistance · (1 - ε)
//! ```
//!
//! Taking the minimum of the book center and a price percentile keeps a
//! momentary bid wall from overstating the floor.

use serde::{Deserialize, Serialize};

use crate::pulses::{MarketPulse, PulseInput};
use crate::rolling_window::RollingWindow;
use crate::stats;
use crate::types::BookSide;

/// Absolute slack when comparing a support range against its tolerance.
const STABILITY_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// Number of recent prices the percentile is taken over. Also the
    /// warm-up length before the percentile participates at all.
    pub percentile_window: usize,

    /// Percentile (0-100) of recent prices used as the long-term floor.
    pub percentile: f64,

    /// Fractional buffer a price must clear before a level counts as
    /// confirmed (e.g. 0.0015 = 0.15%).
    pub epsilon_buffer: f64,

    /// Maximum spread (absolute price units) of recent support samples for
    /// the support to be flagged stable.
    pub stability_tolerance: f64,

    /// Minimum support samples before stability can be asserted.
    pub stability_min_samples: usize,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            percentile_window: 20,
            percentile: 20.0,
            epsilon_buffer: 0.0015,
            stability_tolerance: 0.02,
            stability_min_samples: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SupportState {
    /// Quantity-weighted bid price of this tick.
    pub weighted_bid_center: f64,
    pub support: f64,
    pub resistance: f64,
    /// Minimum price that confirms a bounce off support.
    pub entry_price: f64,
    /// Maximum price that confirms rejection at resistance.
    pub exit_price: f64,
    pub is_stable: bool,
}

/// Rolling support / resistance estimator.
pub struct SupportMonitor {
    history: RollingWindow,
    config: SupportConfig,
    last: SupportState,
}

impl SupportMonitor {
    pub fn new(capacity: usize, config: SupportConfig) -> Self {
        Self {
            history: RollingWindow::new(capacity),
            config,
            last: SupportState::default(),
        }
    }

    /// Recent weighted bid centers, oldest first.
    pub fn history(&self) -> &RollingWindow {
        &self.history
    }

    fn is_stable(&self) -> bool {
        if self.history.len() < self.config.stability_min_samples {
            return false;
        }

        let (lo, hi) = self
            .history
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

        hi - lo <= self.config.stability_tolerance + STABILITY_SLACK
    }
}

impl MarketPulse for SupportMonitor {
    type Output = SupportState;

    fn update(&mut self, input: PulseInput<'_>) {
        let snapshot = input.snapshot;
        let last_price = snapshot.last_price;

        let center = snapshot
            .weighted_price(BookSide::Bid)
            .unwrap_or(last_price);
        self.history.push(center);

        let book_support = stats::median(&self.history.to_vec()).unwrap_or(last_price);

        let window = self.config.percentile_window;
        let support = if window > 0 && input.prices.len() >= window {
            match stats::percentile(&input.prices.tail(window), self.config.percentile) {
                Some(p) => book_support.min(p),
                None => book_support,
            }
        } else {
            book_support
        };

        let resistance = snapshot
            .weighted_price(BookSide::Ask)
            .unwrap_or(last_price);

        let eps = self.config.epsilon_buffer;

        self.last = SupportState {
            weighted_bid_center: center,
            support,
            resistance,
            entry_price: support * (1.0 + eps),
            exit_price: resistance * (1.0 - eps),
            is_stable: self.is_stable(),
        };
    }

    fn compute(&self) -> SupportState {
        self.last.clone()
    }

    fn reset(&mut self) {
        self.history.clear();
        self.last = SupportState::default();
    }
}
