//! Snapshot Normalizer
//!
//! Converts a loosely-typed provider quote row into a validated
//! [`MarketSnapshot`]. All coercion rules live in [`safe_float`]; nothing
//! downstream ever sees a placeholder string, a NaN or a negative quantity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{BookLevel, MarketSnapshot};

/// Placeholders providers emit when a field has no value.
const PLACEHOLDERS: [&str; 5] = ["-", "--", "", "None", "null"];

/// Raw quote row as delivered by the market-data provider.
///
/// Numeric fields may arrive as numbers, numeric strings, placeholder
/// strings or be missing altogether.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawQuote {
    #[serde(default)]
    pub ts_ms: Option<u64>,

    #[serde(default)]
    pub last_price: Value,

    /// Session-cumulative traded volume.
    #[serde(default)]
    pub volume: Value,

    #[serde(default)]
    pub bid_prices: Vec<Value>,
    #[serde(default)]
    pub bid_volumes: Vec<Value>,

    #[serde(default)]
    pub ask_prices: Vec<Value>,
    #[serde(default)]
    pub ask_volumes: Vec<Value>,
}

/// Coerce a provider value into a finite, non-negative float.
///
/// Falls back to `default` for placeholders, unparsable strings, non-finite
/// numbers and negative values.
pub fn safe_float(value: &Value, default: f64) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if PLACEHOLDERS.contains(&s) {
                None
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => default,
    }
}

impl RawQuote {
    /// Normalize into a snapshot carrying exactly `depth` levels per side.
    ///
    /// Missing rows are padded with zero quantity. `fallback_ts_ms` is used
    /// when the provider row has no timestamp.
    pub fn normalize(&self, depth: usize, fallback_ts_ms: u64) -> MarketSnapshot {
        MarketSnapshot {
            ts_ms: self.ts_ms.unwrap_or(fallback_ts_ms),
            last_price: safe_float(&self.last_price, 0.0),
            cumulative_volume: safe_float(&self.volume, 0.0),
            bids: levels(&self.bid_prices, &self.bid_volumes, depth),
            asks: levels(&self.ask_prices, &self.ask_volumes, depth),
        }
    }
}

fn levels(prices: &[Value], quantities: &[Value], depth: usize) -> Vec<BookLevel> {
    (0..depth)
        .map(|i| {
            let price = prices.get(i).map_or(0.0, |v| safe_float(v, 0.0));
            let quantity = quantities.get(i).map_or(0.0, |v| safe_float(v, 0.0));

            // A quantity quoted without a usable price cannot be weighted.
            if price <= 0.0 {
                BookLevel::new(0.0, 0.0)
            } else {
                BookLevel::new(price, quantity)
            }
        })
        .collect()
}
