//! Risk Lock
//!
//! Hysteretic breach detector gating buy eligibility.
//!
//! ```text
//!            break_count ≥ trigger  OR  volatility > ceiling
//! UNLOCKED ──────────────────────────────────────────────────▶ LOCKED
//!    ▲                                                           │
//!    └──── elapsed ≥ duration AND no breach AND no trigger ──────┘
//! ```
//!
//! A breach tick prints below the stop price on elevated volume. While
//! locked, a new breach (or a volatility spike) refreshes the lock timestamp,
//! so the dwell time restarts.

use serde::Serialize;
use tracing::info;

use crate::config::LockConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockTransition {
    None,
    Engaged,
    Extended,
    Released,
}

/// Per-tick observation fed into the lock.
#[derive(Debug, Clone, Copy)]
pub struct LockInput {
    pub ts_ms: u64,
    pub price: f64,
    /// `support · (1 - breach_tolerance)`
    pub stop_price: f64,
    pub volume_ratio: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LockStatus {
    pub active: bool,
    /// This tick breached the stop price on volume.
    pub breach: bool,
    pub break_count: u32,
    pub seconds_remaining: f64,
    pub until_ts_ms: Option<u64>,
    pub transition: LockTransition,
}

#[derive(Debug, Default)]
pub struct RiskLock {
    active: bool,
    break_count: u32,
    lock_ts_ms: u64,
    duration_ms: u64,
}

impl RiskLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn break_count(&self) -> u32 {
        self.break_count
    }

    /// Timestamp of the latest activation or extension.
    pub fn lock_ts_ms(&self) -> Option<u64> {
        self.active.then_some(self.lock_ts_ms)
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn update(&mut self, input: &LockInput, cfg: &LockConfig) -> LockStatus {
        let breach = input.price < input.stop_price && input.volume_ratio > cfg.breach_volume_ratio;

        // Saturates at the trigger so a long breach run does not need an
        // equally long recovery run before the lock can release.
        self.break_count = if breach {
            (self.break_count + 1).min(cfg.break_count_trigger)
        } else {
            self.break_count.saturating_sub(1)
        };

        let volatility_spike = input.volatility > cfg.volatility_ceiling;
        let triggered = self.break_count >= cfg.break_count_trigger || volatility_spike;

        let mut transition = LockTransition::None;

        if !self.active {
            if triggered {
                self.engage(input, cfg);
                transition = LockTransition::Engaged;

                info!(
                    price = input.price,
                    stop_price = input.stop_price,
                    break_count = self.break_count,
                    volatility = input.volatility,
                    lock_secs = self.duration_ms / 1_000,
                    "risk lock engaged"
                );
            }
        } else if breach || volatility_spike {
            self.engage(input, cfg);
            transition = LockTransition::Extended;

            info!(
                price = input.price,
                volatility = input.volatility,
                lock_secs = self.duration_ms / 1_000,
                "risk lock extended"
            );
        } else if self.elapsed_ms(input.ts_ms) >= self.duration_ms && !triggered {
            self.active = false;
            transition = LockTransition::Released;

            info!(
                price = input.price,
                held_ms = self.elapsed_ms(input.ts_ms),
                "risk lock released"
            );
        }

        LockStatus {
            breach,
            transition,
            ..self.status(input.ts_ms)
        }
    }

    /// Current lock status at `now_ms` without feeding a tick.
    pub fn status(&self, now_ms: u64) -> LockStatus {
        LockStatus {
            active: self.active,
            breach: false,
            break_count: self.break_count,
            seconds_remaining: self.remaining_ms(now_ms) as f64 / 1_000.0,
            until_ts_ms: self.active.then(|| self.lock_ts_ms.saturating_add(self.duration_ms)),
            transition: LockTransition::None,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn engage(&mut self, input: &LockInput, cfg: &LockConfig) {
        self.active = true;
        self.lock_ts_ms = input.ts_ms;
        self.duration_ms = lock_duration_ms(input.volatility, cfg);
    }

    fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.lock_ts_ms)
    }

    fn remaining_ms(&self, now_ms: u64) -> u64 {
        if !self.active {
            return 0;
        }
        self.duration_ms.saturating_sub(self.elapsed_ms(now_ms))
    }
}

/// `max(min_lock_secs, base_lock_secs · volatility / reference_volatility)`
pub fn lock_duration_ms(volatility: f64, cfg: &LockConfig) -> u64 {
    let scaled = cfg.base_lock_secs as f64 * volatility.max(0.0) / cfg.reference_volatility.max(f64::EPSILON);
    let secs = scaled.max(cfg.min_lock_secs as f64);

    (secs * 1_000.0).round() as u64
}
