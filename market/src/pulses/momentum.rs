//! Momentum Pulse.
//!
//! Scale-free price direction and recent volatility, both read from the
//! instrument's shared price history.
//!
//! ```text
//! price_slope = slope(last N prices) / last_price
//! volatility  = stdev(ln(pₜ / pₜ₋₁)) over the volatility window,
//!               repeated prints removed
//! ```

use serde::{Deserialize, Serialize};

use crate::pulses::{MarketPulse, PulseInput};
use crate::stats;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Prices the regression slope is fitted over. Slope is zero until the
    /// history holds this many samples.
    pub slope_window: usize,

    /// Prices the volatility estimate is taken over.
    pub volatility_window: usize,

    /// Log-returns at or below this magnitude are treated as stale repeats.
    pub stale_return_epsilon: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            slope_window: 10,
            volatility_window: 20,
            stale_return_epsilon: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MomentumState {
    /// Regression slope per tick, relative to the latest price.
    pub price_slope: f64,
    /// Standard deviation of per-tick log-returns.
    pub volatility: f64,
}

pub struct MomentumMonitor {
    config: MomentumConfig,
    last: MomentumState,
}

impl MomentumMonitor {
    pub fn new(config: MomentumConfig) -> Self {
        Self {
            config,
            last: MomentumState::default(),
        }
    }
}

impl MarketPulse for MomentumMonitor {
    type Output = MomentumState;

    fn update(&mut self, input: PulseInput<'_>) {
        let prices = input.prices;
        let last_price = input.snapshot.last_price;

        let window = self.config.slope_window;
        let price_slope = if window >= 2 && prices.len() >= window && last_price > 0.0 {
            stats::linear_slope(&prices.tail(window)).map_or(0.0, |s| s / last_price)
        } else {
            0.0
        };

        let volatility = stats::log_return_volatility(
            &prices.tail(self.config.volatility_window),
            self.config.stale_return_epsilon,
        );

        self.last = MomentumState {
            price_slope,
            volatility,
        };
    }

    fn compute(&self) -> MomentumState {
        self.last.clone()
    }

    fn reset(&mut self) {
        self.last = MomentumState::default();
    }
}
