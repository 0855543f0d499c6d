//! Audit Engine
//!
//! Orchestrates every analytics stage for a single instrument:
//!
//! ```text
//! snapshot → price history → pulses → rebound → risk lock → scoring → AuditResult
//! ```
//!
//! `update` never fails. Thin history, empty books and counter resets all
//! resolve to neutral values inside the pulses; a quote without a price is
//! held rather than audited.

use std::sync::Arc;

use market::MarketSnapshot;
use market::pulses::{BookEntropy, FlowState, MarketPulse, MomentumState, PulseInput, SupportState};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::EngineConfig;
use crate::risk_lock::{LockInput, LockStatus, LockTransition};
use crate::scoring::{self, BuyBreakdown, Recommendation, ScoreBreakdown, ScoreInputs, SellBreakdown, SideSignal};
use crate::state::InstrumentState;

/// Per-tick output handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    pub instrument_id: String,
    pub ts_ms: u64,
    pub last_price: f64,
    /// The quote carried no usable price; `last_price` is the previous print
    /// and nothing was fed into the engine state.
    pub price_missing: bool,

    // Levels
    pub support_price: f64,
    pub resistance_price: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop_price: f64,
    pub support_stable: bool,

    // Scores
    pub buy_score: f64,
    pub sell_score: f64,
    pub buy_confirmed: bool,
    pub sell_confirmed: bool,
    pub rebound_confirmed: bool,

    // Risk lock
    pub is_locked: bool,
    pub lock_seconds_remaining: f64,
    pub lock_until_ts_ms: Option<u64>,
    pub lock_transition: LockTransition,
    pub break_count: u32,

    // Flow & momentum
    pub cvd: f64,
    pub cvd_trend: f64,
    pub order_imbalance: f64,
    pub imbalance_threshold: f64,
    pub tick_volume: f64,
    pub volume_ratio: f64,
    pub price_slope: f64,
    pub volatility: f64,
    pub bid_entropy: f64,
    pub ask_entropy: f64,

    // Decision
    pub position_percent: f64,
    pub recommendation: Recommendation,
    pub breakdown: ScoreBreakdown,
}

impl AuditResult {
    /// Capital to deploy for the suggested position share.
    pub fn allocation(&self, capital: f64) -> f64 {
        capital.max(0.0) * self.position_percent / 100.0
    }
}

pub struct AuditEngine {
    config: Arc<EngineConfig>,
    state: InstrumentState,
}

impl AuditEngine {
    pub fn new(instrument_id: impl Into<String>, config: impl Into<Arc<EngineConfig>>) -> Self {
        let config = config.into();
        let state = InstrumentState::new(instrument_id, &config);

        Self { config, state }
    }

    pub fn instrument_id(&self) -> &str {
        self.state.instrument_id()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    /// Discard all state and start over for `instrument_id`.
    ///
    /// Every history, pulse, lock and signal tracker is cleared, so no CVD or
    /// lock status can leak into the new instrument.
    pub fn reset(&mut self, instrument_id: impl Into<String>) {
        let instrument_id = instrument_id.into();

        info!(
            from = %self.state.instrument_id(),
            to = %instrument_id,
            ticks = self.state.ticks(),
            "instrument state reset"
        );

        self.state.reset(instrument_id);
    }

    /// Process one snapshot to completion.
    ///
    /// A snapshot without a usable price (suspension, pre-open placeholder)
    /// is not a print: state is left untouched and the previous levels are
    /// reported with `price_missing` set.
    #[instrument(
        skip(self, snapshot),
        fields(instrument = %self.state.instrument_id(), ts_ms = snapshot.ts_ms),
        level = "debug"
    )]
    pub fn update(&mut self, snapshot: &MarketSnapshot) -> AuditResult {
        if !(snapshot.last_price.is_finite() && snapshot.last_price > 0.0) {
            debug!(last_price = snapshot.last_price, "quote without a price; state held");
            return self.held(snapshot.ts_ms);
        }

        let cfg = Arc::clone(&self.config);
        let st = &mut self.state;

        st.record_tick(snapshot.last_price);

        let input = PulseInput {
            snapshot,
            prices: &st.prices,
        };
        st.support.update(input);
        st.flow.update(input);
        st.momentum.update(input);
        st.entropy.update(input);

        let support = st.support.compute();
        let flow = st.flow.compute();
        let momentum = st.momentum.compute();
        let entropy = st.entropy.compute();

        let price = snapshot.last_price;
        let stop_price = support.support * (1.0 - cfg.lock.breach_tolerance);

        let rebound_confirmed = st
            .rebound
            .observe(snapshot.ts_ms, price, support.support, &cfg.scoring);

        let lock = st.risk_lock.update(
            &LockInput {
                ts_ms: snapshot.ts_ms,
                price,
                stop_price,
                volume_ratio: flow.volume_ratio,
                volatility: momentum.volatility,
            },
            &cfg.lock,
        );

        let inputs = ScoreInputs {
            price,
            stop_price,
            support: &support,
            flow: &flow,
            momentum: &momentum,
            entropy: &entropy,
            rebound_confirmed,
            locked: lock.active,
        };
        let (buy_raw, buy_parts) = scoring::buy_score(&inputs, &cfg.scoring);
        let (sell_raw, sell_parts) = scoring::sell_score(&inputs, &cfg.scoring);

        let buy = st.buy.process(buy_raw, snapshot.ts_ms, &cfg.scoring);
        let sell = st.sell.process(sell_raw, snapshot.ts_ms, &cfg.scoring);

        if buy.confirmed || sell.confirmed {
            debug!(
                buy = buy.score,
                sell = sell.score,
                buy_confirmed = buy.confirmed,
                sell_confirmed = sell.confirmed,
                "signal confirmed"
            );
        }

        debug!(
            price,
            support = support.support,
            resistance = support.resistance,
            imbalance = flow.order_imbalance,
            cvd_trend = flow.cvd_trend,
            slope = momentum.price_slope,
            volatility = momentum.volatility,
            buy = buy.score,
            sell = sell.score,
            locked = lock.active,
            "tick audited"
        );

        self.assemble(Tick {
            ts_ms: snapshot.ts_ms,
            price,
            price_missing: false,
            stop_price,
            support,
            flow,
            momentum,
            entropy,
            lock,
            rebound_confirmed,
            buy,
            sell,
            buy_parts,
            sell_parts,
        })
    }

    /// Result for a tick that carried no price: last levels, no signal.
    fn held(&self, ts_ms: u64) -> AuditResult {
        let st = &self.state;
        let support = st.support.compute();
        let stop_price = support.support * (1.0 - self.config.lock.breach_tolerance);

        let idle = SideSignal {
            score: 0.0,
            cooling: false,
            confirmed: false,
        };

        self.assemble(Tick {
            ts_ms,
            price: st.prices.latest().unwrap_or(0.0),
            price_missing: true,
            stop_price,
            support,
            flow: st.flow.compute(),
            momentum: st.momentum.compute(),
            entropy: st.entropy.compute(),
            lock: st.risk_lock.status(ts_ms),
            rebound_confirmed: false,
            buy: idle,
            sell: idle,
            buy_parts: BuyBreakdown::default(),
            sell_parts: SellBreakdown::default(),
        })
    }

    fn assemble(&self, t: Tick) -> AuditResult {
        let cfg = &self.config;

        let recommendation = Recommendation::decide(t.lock.active, &t.buy, &cfg.scoring);
        let position_percent = scoring::position_percent(
            recommendation,
            t.momentum.volatility,
            cfg.lock.reference_volatility,
            &cfg.scoring,
        );

        AuditResult {
            instrument_id: self.state.instrument_id().to_string(),
            ts_ms: t.ts_ms,
            last_price: t.price,
            price_missing: t.price_missing,

            support_price: t.support.support,
            resistance_price: t.support.resistance,
            entry_price: t.support.entry_price,
            exit_price: t.support.exit_price,
            stop_price: t.stop_price,
            support_stable: t.support.is_stable,

            buy_score: t.buy.score,
            sell_score: t.sell.score,
            buy_confirmed: t.buy.confirmed,
            sell_confirmed: t.sell.confirmed,
            rebound_confirmed: t.rebound_confirmed,

            is_locked: t.lock.active,
            lock_seconds_remaining: t.lock.seconds_remaining,
            lock_until_ts_ms: t.lock.until_ts_ms,
            lock_transition: t.lock.transition,
            break_count: t.lock.break_count,

            cvd: t.flow.cvd,
            cvd_trend: t.flow.cvd_trend,
            order_imbalance: t.flow.order_imbalance,
            imbalance_threshold: t.flow.imbalance_threshold,
            tick_volume: t.flow.tick_volume,
            volume_ratio: t.flow.volume_ratio,
            price_slope: t.momentum.price_slope,
            volatility: t.momentum.volatility,
            bid_entropy: t.entropy.bid_entropy,
            ask_entropy: t.entropy.ask_entropy,

            position_percent,
            recommendation,
            breakdown: ScoreBreakdown {
                buy: t.buy_parts,
                sell: t.sell_parts,
                buy_cooling: t.buy.cooling,
                sell_cooling: t.sell.cooling,
            },
        }
    }
}

/// Everything one tick produced, before it is flattened into a result.
struct Tick {
    ts_ms: u64,
    price: f64,
    price_missing: bool,
    stop_price: f64,
    support: SupportState,
    flow: FlowState,
    momentum: MomentumState,
    entropy: BookEntropy,
    lock: LockStatus,
    rebound_confirmed: bool,
    buy: SideSignal,
    sell: SideSignal,
    buy_parts: BuyBreakdown,
    sell_parts: SellBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use market::BookLevel;

    fn snap(ts_ms: u64, price: f64, cum: f64) -> MarketSnapshot {
        MarketSnapshot {
            ts_ms,
            last_price: price,
            cumulative_volume: cum,
            bids: vec![BookLevel::new(price - 0.01, 500.0), BookLevel::new(price - 0.02, 400.0)],
            asks: vec![BookLevel::new(price + 0.01, 300.0), BookLevel::new(price + 0.02, 300.0)],
        }
    }

    #[test]
    fn update_appends_one_price_per_tick() {
        let mut e = AuditEngine::new("A", EngineConfig::default());

        for i in 0..7 {
            e.update(&snap(i * 1_000, 10.0, i as f64 * 100.0));
        }

        assert_eq!(e.state().ticks(), 7);
        assert_eq!(e.state().price_history().len(), 7);
        assert_eq!(e.state().support_history().len(), 5);
    }

    #[test]
    fn stop_price_sits_below_support() {
        let mut e = AuditEngine::new("A", EngineConfig::default());
        let r = e.update(&snap(0, 10.0, 0.0));

        assert!((r.stop_price - r.support_price * 0.996).abs() < 1e-12);
        assert!(r.entry_price > r.support_price);
        assert!(r.exit_price < r.resistance_price);
    }

    #[test]
    fn allocation_follows_position_percent() {
        let mut e = AuditEngine::new("A", EngineConfig::default());
        let mut r = e.update(&snap(0, 10.0, 0.0));

        r.position_percent = 40.0;
        assert_eq!(r.allocation(100_000.0), 40_000.0);

        r.position_percent = 0.0;
        assert_eq!(r.allocation(100_000.0), 0.0);
    }

    #[test]
    fn missing_price_before_any_print_holds_neutral() {
        let mut e = AuditEngine::new("A", EngineConfig::default());

        let r = e.update(&snap(0, 0.0, 0.0));
        let nan = e.update(&snap(1_000, f64::NAN, 0.0));

        for r in [r, nan] {
            assert!(r.price_missing);
            assert_eq!(r.last_price, 0.0);
            assert_eq!(r.recommendation, Recommendation::Hold);
            assert_eq!(r.position_percent, 0.0);
        }
        assert_eq!(e.state().ticks(), 0);
        assert_eq!(e.state().prev_cumulative_volume(), None);
    }

    #[test]
    fn reset_switches_instrument() {
        let mut e = AuditEngine::new("A", EngineConfig::default());
        for i in 0..5 {
            e.update(&snap(i * 1_000, 10.0, i as f64 * 100.0));
        }

        e.reset("B");

        assert_eq!(e.instrument_id(), "B");
        assert_eq!(e.state().ticks(), 0);
        assert!(e.state().price_history().is_empty());
        assert_eq!(e.state().cvd(), 0.0);
    }
}
