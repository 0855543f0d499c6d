//! Order-Size Entropy Pulse.
//!
//! Shannon entropy of the quantity distribution across the visible levels of
//! each book side.
//!
//! ## Interpretation
//! - `H ≈ 0`     → one level holds nearly all quantity (a single large,
//!   likely algorithmic, resting order)
//! - `H ≈ ln(N)` → quantity spread evenly (dispersed, organic interest)
//!
//! `dispersion = H / ln(N)` rescales to `[0, 1]` so thresholds do not depend
//! on the configured book depth.

use serde::Serialize;

use crate::pulses::{MarketPulse, PulseInput};
use crate::stats;
use crate::types::{BookSide, MarketSnapshot};

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookEntropy {
    pub bid_entropy: f64,
    pub ask_entropy: f64,
    pub bid_dispersion: f64,
    pub ask_dispersion: f64,
}

/// Stateless entropy pulse (derived from the current book only).
pub struct EntropyMonitor {
    depth: usize,
    last: BookEntropy,
}

impl EntropyMonitor {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            last: BookEntropy::default(),
        }
    }

    /// Explicit entropy computation for a single snapshot.
    pub fn compute_with_snapshot(&self, snapshot: &MarketSnapshot) -> BookEntropy {
        let bid_entropy = stats::shannon_entropy(&snapshot.quantities(BookSide::Bid, self.depth));
        let ask_entropy = stats::shannon_entropy(&snapshot.quantities(BookSide::Ask, self.depth));

        let max_entropy = if self.depth >= 2 {
            (self.depth as f64).ln()
        } else {
            0.0
        };

        let dispersion = |h: f64| {
            if max_entropy > 0.0 {
                (h / max_entropy).clamp(0.0, 1.0)
            } else {
                0.0
            }
        };

        BookEntropy {
            bid_entropy,
            ask_entropy,
            bid_dispersion: dispersion(bid_entropy),
            ask_dispersion: dispersion(ask_entropy),
        }
    }
}

impl MarketPulse for EntropyMonitor {
    type Output = BookEntropy;

    fn update(&mut self, input: PulseInput<'_>) {
        self.last = self.compute_with_snapshot(input.snapshot);
    }

    fn compute(&self) -> BookEntropy {
        self.last.clone()
    }

    fn reset(&mut self) {
        self.last = BookEntropy::default();
    }
}
