use serde::{Deserialize, Serialize};

/// One visible order-book row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

impl BookLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

/// Validated quote snapshot for a single instrument.
///
/// Produced once per poll cycle by the normalizer. Every numeric field is
/// finite and non-negative; levels are ordered best-to-worst. Sides may hold
/// fewer than `N` rows, in which case the missing rows count as zero
/// quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Snapshot timestamp (ms since epoch)
    pub ts_ms: u64,

    pub last_price: f64,

    /// Session-cumulative traded volume. Decreases only on counter reset.
    pub cumulative_volume: f64,

    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl MarketSnapshot {
    pub fn levels(&self, side: BookSide) -> &[BookLevel] {
        match side {
            BookSide::Bid => &self.bids,
            BookSide::Ask => &self.asks,
        }
    }

    /// Total resting quantity on one side of the visible book.
    pub fn total_quantity(&self, side: BookSide) -> f64 {
        self.levels(side).iter().map(|l| l.quantity).sum()
    }

    /// Quantities of the first `depth` levels, zero-padded when the side is
    /// shorter than `depth`.
    pub fn quantities(&self, side: BookSide, depth: usize) -> Vec<f64> {
        let levels = self.levels(side);

        (0..depth)
            .map(|i| levels.get(i).map_or(0.0, |l| l.quantity))
            .collect()
    }

    /// Quantity-weighted average price across one side.
    ///
    /// Returns `None` when the side carries no quantity, so the caller can
    /// choose its own fallback (usually `last_price`).
    pub fn weighted_price(&self, side: BookSide) -> Option<f64> {
        let levels = self.levels(side);

        let total: f64 = levels.iter().map(|l| l.quantity).sum();
        if total <= 0.0 {
            return None;
        }

        let notional: f64 = levels.iter().map(|l| l.price * l.quantity).sum();
        Some(notional / total)
    }
}
