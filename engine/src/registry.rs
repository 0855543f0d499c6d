use std::collections::HashMap;
use std::sync::Arc;

use market::MarketSnapshot;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::audit::{AuditEngine, AuditResult};
use crate::config::EngineConfig;

/// In-memory store of one [`AuditEngine`] per instrument.
///
/// Guarantees:
/// - Exactly one engine (and so one state) per instrument id.
/// - Each engine sits behind its own lock; instruments can be updated from
///   different threads without contending on each other.
/// - The map lock is only held to look up or insert an engine.
pub struct InstrumentRegistry {
    config: Arc<EngineConfig>,
    engines: Mutex<HashMap<String, Arc<Mutex<AuditEngine>>>>,
}

impl InstrumentRegistry {
    pub fn new(config: impl Into<Arc<EngineConfig>>) -> Self {
        Self {
            config: config.into(),
            engines: Mutex::new(HashMap::new()),
        }
    }

    fn engine(&self, instrument_id: &str) -> Arc<Mutex<AuditEngine>> {
        let mut engines = self.engines.lock();

        let engine = engines.entry(instrument_id.to_string()).or_insert_with(|| {
            debug!(instrument = %instrument_id, "creating instrument state");
            Arc::new(Mutex::new(AuditEngine::new(
                instrument_id,
                Arc::clone(&self.config),
            )))
        });

        Arc::clone(engine)
    }

    /// Feed a snapshot to the instrument's engine, creating it on first use.
    pub fn update(&self, instrument_id: &str, snapshot: &MarketSnapshot) -> AuditResult {
        let engine = self.engine(instrument_id);
        let mut engine = engine.lock();
        engine.update(snapshot)
    }

    /// Discard and recreate the instrument's state.
    #[instrument(skip(self), target = "registry")]
    pub fn reset(&self, instrument_id: &str) {
        let engine = self.engine(instrument_id);
        engine.lock().reset(instrument_id);
    }

    /// Drop the instrument entirely. Returns whether it was tracked.
    pub fn remove(&self, instrument_id: &str) -> bool {
        let removed = self.engines.lock().remove(instrument_id).is_some();
        if removed {
            info!(instrument = %instrument_id, "instrument removed");
        }
        removed
    }

    /// Tracked instrument ids, sorted.
    pub fn instruments(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.engines.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.lock().is_empty()
    }

    /// Run `f` against the instrument's engine, if tracked.
    pub fn with_engine<R>(&self, instrument_id: &str, f: impl FnOnce(&AuditEngine) -> R) -> Option<R> {
        let engine = self.engines.lock().get(instrument_id).cloned()?;
        let guard = engine.lock();
        Some(f(&guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market::BookLevel;

    fn snap(ts_ms: u64, price: f64) -> MarketSnapshot {
        MarketSnapshot {
            ts_ms,
            last_price: price,
            cumulative_volume: ts_ms as f64,
            bids: vec![BookLevel::new(price - 0.01, 100.0)],
            asks: vec![BookLevel::new(price + 0.01, 100.0)],
        }
    }

    #[test]
    fn creates_engines_lazily_per_instrument() {
        let reg = InstrumentRegistry::new(EngineConfig::default());
        assert!(reg.is_empty());

        reg.update("B", &snap(0, 20.0));
        reg.update("A", &snap(0, 10.0));
        reg.update("A", &snap(1_000, 10.0));

        assert_eq!(reg.instruments(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(reg.with_engine("A", |e| e.state().ticks()), Some(2));
        assert_eq!(reg.with_engine("B", |e| e.state().ticks()), Some(1));
        assert_eq!(reg.with_engine("C", |e| e.state().ticks()), None);
    }

    #[test]
    fn instruments_do_not_share_state() {
        let reg = InstrumentRegistry::new(EngineConfig::default());

        for i in 0..5 {
            reg.update("A", &snap(i * 1_000, 10.0));
        }
        let b = reg.update("B", &snap(0, 50.0));

        assert!((b.support_price - 49.99).abs() < 1e-9);
        assert_eq!(reg.with_engine("B", |e| e.state().price_history().len()), Some(1));
    }

    #[test]
    fn reset_and_remove() {
        let reg = InstrumentRegistry::new(EngineConfig::default());

        for i in 0..5 {
            reg.update("A", &snap(i * 1_000, 10.0));
        }
        reg.reset("A");
        assert_eq!(reg.with_engine("A", |e| e.state().ticks()), Some(0));

        assert!(reg.remove("A"));
        assert!(!reg.remove("A"));
        assert!(reg.is_empty());
    }

    #[test]
    fn concurrent_updates_on_distinct_instruments() {
        let reg = Arc::new(InstrumentRegistry::new(EngineConfig::default()));

        let handles: Vec<_> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|id| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        reg.update(id, &snap(i * 1_000, 10.0));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        for id in ["A", "B", "C", "D"] {
            assert_eq!(reg.with_engine(id, |e| e.state().ticks()), Some(50));
        }
    }
}
