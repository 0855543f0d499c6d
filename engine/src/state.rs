use market::RollingWindow;
use market::pulses::{EntropyMonitor, FlowMonitor, MarketPulse, MomentumMonitor, SupportMonitor};

use crate::config::EngineConfig;
use crate::rebound::ReboundTracker;
use crate::risk_lock::RiskLock;
use crate::scoring::SignalTracker;

/// All mutable analytics state for one instrument.
///
/// Owned exclusively by one [`AuditEngine`](crate::AuditEngine) and updated
/// once per snapshot. Every history is bounded; nothing here is persisted.
pub struct InstrumentState {
    instrument_id: String,
    ticks: u64,

    pub(crate) prices: RollingWindow,

    pub(crate) support: SupportMonitor,
    pub(crate) flow: FlowMonitor,
    pub(crate) momentum: MomentumMonitor,
    pub(crate) entropy: EntropyMonitor,

    pub(crate) risk_lock: RiskLock,
    pub(crate) rebound: ReboundTracker,

    pub(crate) buy: SignalTracker,
    pub(crate) sell: SignalTracker,
}

impl InstrumentState {
    pub fn new(instrument_id: impl Into<String>, config: &EngineConfig) -> Self {
        let w = &config.windows;

        Self {
            instrument_id: instrument_id.into(),
            ticks: 0,
            prices: RollingWindow::new(w.price_capacity),
            support: SupportMonitor::new(w.support_capacity, config.support.clone()),
            flow: FlowMonitor::new(w.imbalance_capacity, w.cvd_capacity, config.flow.clone()),
            momentum: MomentumMonitor::new(config.momentum.clone()),
            entropy: EntropyMonitor::new(w.book_depth),
            risk_lock: RiskLock::new(),
            rebound: ReboundTracker::new(),
            buy: SignalTracker::new(w.score_capacity),
            sell: SignalTracker::new(w.score_capacity),
        }
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    /// Snapshots processed since creation or the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Clear every history, pulse, lock and signal tracker and rebind the
    /// state to `instrument_id`. Capacities are kept.
    pub fn reset(&mut self, instrument_id: impl Into<String>) {
        self.instrument_id = instrument_id.into();
        self.ticks = 0;
        self.prices.clear();

        self.support.reset();
        self.flow.reset();
        self.momentum.reset();
        self.entropy.reset();

        self.risk_lock.reset();
        self.rebound.clear();

        self.buy.reset();
        self.sell.reset();
    }

    pub(crate) fn record_tick(&mut self, last_price: f64) {
        self.ticks += 1;
        self.prices.push(last_price);
    }

    pub fn price_history(&self) -> &RollingWindow {
        &self.prices
    }

    pub fn support_history(&self) -> &RollingWindow {
        self.support.history()
    }

    pub fn imbalance_history(&self) -> &RollingWindow {
        self.flow.imbalance_history()
    }

    pub fn cvd_history(&self) -> &RollingWindow {
        self.flow.cvd_history()
    }

    pub fn cvd(&self) -> f64 {
        self.flow.cvd()
    }

    pub fn avg_volume_ema(&self) -> f64 {
        self.flow.compute().avg_volume_ema
    }

    pub fn prev_cumulative_volume(&self) -> Option<f64> {
        self.flow.prev_cumulative_volume()
    }

    pub fn break_count(&self) -> u32 {
        self.risk_lock.break_count()
    }

    pub fn is_locked(&self) -> bool {
        self.risk_lock.is_active()
    }

    pub fn lock_ts_ms(&self) -> Option<u64> {
        self.risk_lock.lock_ts_ms()
    }

    pub fn rebound_samples(&self) -> usize {
        self.rebound.samples().count()
    }

    pub fn last_buy_signal_ms(&self) -> Option<u64> {
        self.buy.last_signal_ms()
    }

    pub fn last_sell_signal_ms(&self) -> Option<u64> {
        self.sell.last_signal_ms()
    }

    pub fn buy_score_history(&self) -> &RollingWindow {
        self.buy.history()
    }

    pub fn sell_score_history(&self) -> &RollingWindow {
        self.sell.history()
    }
}
