use engine::risk_lock::{LockTransition, lock_duration_ms};
use engine::{AuditEngine, EngineConfig};
use market::{BookLevel, MarketSnapshot};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Tick {
    dt_ms: u64,
    price: f64,
    volume_step: f64,
    bids: Vec<f64>,
    asks: Vec<f64>,
}

fn tick() -> impl Strategy<Value = Tick> {
    (
        0u64..10_000,
        0.0..200.0f64,
        // Negative steps exercise counter resets.
        -5_000.0..20_000.0f64,
        prop::collection::vec(0.0..5_000.0f64, 0..6),
        prop::collection::vec(0.0..5_000.0f64, 0..6),
    )
        .prop_map(|(dt_ms, price, volume_step, bids, asks)| Tick {
            dt_ms,
            price,
            volume_step,
            bids,
            asks,
        })
}

fn to_snapshots(ticks: &[Tick]) -> Vec<MarketSnapshot> {
    let mut ts_ms = 0u64;
    let mut cum = 0.0f64;

    ticks
        .iter()
        .map(|t| {
            ts_ms += t.dt_ms;
            cum = (cum + t.volume_step).max(0.0);

            let side = |qs: &[f64], step: f64| {
                qs.iter()
                    .enumerate()
                    .map(|(i, q)| BookLevel::new((t.price + step * (i as f64 + 1.0)).max(0.0), *q))
                    .collect()
            };

            MarketSnapshot {
                ts_ms,
                last_price: t.price,
                cumulative_volume: cum,
                bids: side(&t.bids, -0.01),
                asks: side(&t.asks, 0.01),
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn scores_stay_bounded(ticks in prop::collection::vec(tick(), 1..120)) {
        let mut e = AuditEngine::new("P", EngineConfig::default());

        for s in to_snapshots(&ticks) {
            let r = e.update(&s);

            prop_assert!((0.0..=100.0).contains(&r.buy_score), "buy {}", r.buy_score);
            prop_assert!((0.0..=100.0).contains(&r.sell_score), "sell {}", r.sell_score);
            prop_assert!(r.tick_volume >= 0.0);
            prop_assert!(r.lock_seconds_remaining >= 0.0);
            prop_assert!((0.0..=40.0).contains(&r.position_percent));
            prop_assert!(r.order_imbalance > -1.0 && r.order_imbalance < 1.0);
            prop_assert!(r.buy_score.is_finite() && r.sell_score.is_finite());
            prop_assert!(r.cvd.is_finite() && r.volatility.is_finite());

            if r.is_locked {
                prop_assert_eq!(r.buy_score, 0.0);
            }
        }

        let st = e.state();
        prop_assert!(st.price_history().len() <= st.price_history().capacity());
        prop_assert!(st.cvd_history().len() <= st.cvd_history().capacity());
        prop_assert!(st.support_history().len() <= st.support_history().capacity());
    }

    #[test]
    fn lock_never_releases_before_its_scaled_duration(ticks in prop::collection::vec(tick(), 1..120)) {
        let cfg = EngineConfig::default();
        let mut e = AuditEngine::new("P", cfg.clone());

        let mut deadline: Option<u64> = None;
        for s in to_snapshots(&ticks) {
            let r = e.update(&s);

            match r.lock_transition {
                LockTransition::Engaged | LockTransition::Extended => {
                    let duration = lock_duration_ms(r.volatility, &cfg.lock);
                    prop_assert!(duration >= cfg.lock.min_lock_secs * 1_000);
                    prop_assert_eq!(r.lock_until_ts_ms, Some(r.ts_ms + duration));
                    deadline = r.lock_until_ts_ms;
                }
                LockTransition::Released => {
                    let until = deadline.take();
                    prop_assert!(
                        until.is_some_and(|until| r.ts_ms >= until),
                        "released at {} before {:?}", r.ts_ms, until
                    );
                }
                LockTransition::None => {
                    prop_assert_eq!(r.is_locked, deadline.is_some());
                }
            }
        }
    }
}
