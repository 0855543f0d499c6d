//! Rebound confirmation.
//!
//! Once price touches support the tracker arms and records `(ts, price)`
//! samples over a sliding time window. The rebound is confirmed when the
//! samples span enough time without any of them sagging through the floor
//! band. A deep break below support disarms the tracker. The buffer is
//! also capped by count, so a feed that repeats one timestamp cannot grow it.

use std::collections::VecDeque;

use crate::config::ScoringConfig;

/// Samples needed before a rebound can be confirmed.
pub(crate) const MIN_SAMPLES: usize = 3;

#[derive(Debug, Default)]
pub struct ReboundTracker {
    armed: bool,
    samples: VecDeque<(u64, f64)>,
}

impl ReboundTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn samples(&self) -> impl Iterator<Item = &(u64, f64)> {
        self.samples.iter()
    }

    /// Record one tick and report whether the rebound is confirmed.
    pub fn observe(&mut self, ts_ms: u64, price: f64, support: f64, cfg: &ScoringConfig) -> bool {
        if support <= 0.0 || price <= 0.0 {
            return false;
        }

        if price < support * (1.0 - cfg.deep_breach_pct) {
            self.clear();
            return false;
        }

        if price <= support * (1.0 + cfg.rebound_touch_band) {
            self.armed = true;
        }

        if !self.armed {
            return false;
        }

        self.samples.push_back((ts_ms, price));

        let window_ms = cfg.rebound_window_secs.saturating_mul(1_000);
        while let Some(&(ts, _)) = self.samples.front() {
            if ts_ms.saturating_sub(ts) > window_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        while self.samples.len() > cfg.rebound_capacity {
            self.samples.pop_front();
        }

        self.is_confirmed(support, cfg)
    }

    fn is_confirmed(&self, support: f64, cfg: &ScoringConfig) -> bool {
        if self.samples.len() < MIN_SAMPLES {
            return false;
        }

        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return false;
        };

        let span_ms = last.0.saturating_sub(first.0);
        let floor = support * (1.0 - cfg.rebound_floor_band);
        let lowest = self.samples.iter().map(|(_, p)| *p).fold(f64::MAX, f64::min);

        span_ms >= cfg.rebound_min_span_secs.saturating_mul(1_000) && lowest > floor
    }

    pub fn clear(&mut self) {
        self.armed = false;
        self.samples.clear();
    }
}
