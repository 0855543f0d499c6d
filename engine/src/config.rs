use std::path::Path;

use market::pulses::{CvdSmoothing, FlowConfig, MomentumConfig, SupportConfig};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rebound::MIN_SAMPLES;

/// Full engine configuration.
///
/// Every section and field has a default, so a config file only needs to
/// name the values it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub windows: WindowConfig,
    pub support: SupportConfig,
    pub flow: FlowConfig,
    pub momentum: MomentumConfig,
    pub lock: LockConfig,
    pub scoring: ScoringConfig,
}

/// Capacities of the per-instrument bounded histories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Last prices kept for percentile, slope and volatility estimates.
    pub price_capacity: usize,
    /// Weighted bid centers kept for the support median.
    pub support_capacity: usize,
    pub imbalance_capacity: usize,
    pub cvd_capacity: usize,
    /// Scores kept per side for the confirmation debounce.
    pub score_capacity: usize,
    /// Visible levels per book side (N).
    pub book_depth: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            price_capacity: 100,
            support_capacity: 5,
            imbalance_capacity: 20,
            cvd_capacity: 20,
            score_capacity: 3,
            book_depth: 5,
        }
    }
}

/// Risk lock trigger and dwell parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    // =========================
    // Breach detection
    // =========================
    /// Fraction below support a price must print to count as a breach
    /// (0.004 = 0.4%). Also defines the reported stop price.
    pub breach_tolerance: f64,

    /// Volume ratio a breach tick must exceed; thin prints below support
    /// are ignored.
    pub breach_volume_ratio: f64,

    /// Consecutive-breach count that engages the lock.
    pub break_count_trigger: u32,

    /// Volatility above which the lock engages regardless of breaches.
    pub volatility_ceiling: f64,

    // =========================
    // Lock duration
    // =========================
    /// `duration = max(min_lock_secs, base_lock_secs · volatility / reference_volatility)`
    pub reference_volatility: f64,
    pub min_lock_secs: u64,
    pub base_lock_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            breach_tolerance: 0.004,
            breach_volume_ratio: 0.6,
            break_count_trigger: 2,
            volatility_ceiling: 0.015,
            reference_volatility: 0.005,
            min_lock_secs: 10,
            base_lock_secs: 60,
        }
    }
}

/// Score thresholds, debounce, cooldown, sizing and rebound confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Score every entry of a full debounce history must reach for the
    /// signal to count as confirmed.
    pub confirm_threshold: f64,
    /// Buy score that earns a probe position without confirmation.
    pub probe_threshold: f64,

    pub cooldown_secs: u64,
    /// Multiplier applied to a side's score while it is cooling down.
    pub cooldown_factor: f64,

    /// Bid-side normalized entropy at or above which support counts as
    /// dispersed, organic interest.
    pub dispersed_entropy_ratio: f64,
    /// Ask-side normalized entropy below which supply counts as a single
    /// concentrated wall.
    pub concentrated_entropy_ratio: f64,

    /// Capital share (percent) for a confirmed buy.
    pub full_position_pct: f64,
    /// Capital share (percent) for an unconfirmed probe.
    pub probe_position_pct: f64,

    // =========================
    // Rebound confirmation
    // =========================
    pub rebound_window_secs: u64,
    pub rebound_min_span_secs: u64,
    /// Upper bound on buffered rebound samples, whatever their timestamps.
    pub rebound_capacity: usize,
    /// A price within this fraction above support counts as a touch.
    pub rebound_touch_band: f64,
    /// Samples must stay above `support · (1 - rebound_floor_band)`.
    pub rebound_floor_band: f64,
    /// A price this far below support disarms the rebound tracker.
    pub deep_breach_pct: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            confirm_threshold: 70.0,
            probe_threshold: 40.0,
            cooldown_secs: 60,
            cooldown_factor: 0.65,
            dispersed_entropy_ratio: 0.75,
            concentrated_entropy_ratio: 0.4,
            full_position_pct: 40.0,
            probe_position_pct: 10.0,
            rebound_window_secs: 30,
            rebound_min_span_secs: 9,
            rebound_capacity: 64,
            rebound_touch_band: 0.002,
            rebound_floor_band: 0.005,
            deep_breach_pct: 0.02,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make an estimator degenerate or a window
    /// unreachable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.windows;
        for (field, value) in [
            ("windows.price_capacity", w.price_capacity),
            ("windows.support_capacity", w.support_capacity),
            ("windows.imbalance_capacity", w.imbalance_capacity),
            ("windows.cvd_capacity", w.cvd_capacity),
            ("windows.score_capacity", w.score_capacity),
            ("windows.book_depth", w.book_depth),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }

        for (field, window) in [
            ("support.percentile_window", self.support.percentile_window),
            ("momentum.slope_window", self.momentum.slope_window),
            ("momentum.volatility_window", self.momentum.volatility_window),
        ] {
            if window > w.price_capacity {
                return Err(ConfigError::invalid(
                    field,
                    format!("{window} exceeds windows.price_capacity ({})", w.price_capacity),
                ));
            }
        }

        if self.flow.cvd_trend_window > w.cvd_capacity {
            return Err(ConfigError::invalid(
                "flow.cvd_trend_window",
                format!(
                    "{} exceeds windows.cvd_capacity ({})",
                    self.flow.cvd_trend_window, w.cvd_capacity
                ),
            ));
        }

        check_range("support.percentile", self.support.percentile, 0.0, 100.0)?;
        check_non_negative("support.epsilon_buffer", self.support.epsilon_buffer)?;
        check_non_negative("support.stability_tolerance", self.support.stability_tolerance)?;

        check_alpha("flow.volume_ema_alpha", self.flow.volume_ema_alpha)?;
        match self.flow.cvd_smoothing {
            CvdSmoothing::Fixed { alpha } => check_alpha("flow.cvd_smoothing.alpha", alpha)?,
            CvdSmoothing::Adaptive {
                min_alpha,
                max_alpha,
                window,
            } => {
                check_alpha("flow.cvd_smoothing.min_alpha", min_alpha)?;
                check_alpha("flow.cvd_smoothing.max_alpha", max_alpha)?;
                if min_alpha > max_alpha {
                    return Err(ConfigError::invalid(
                        "flow.cvd_smoothing",
                        "min_alpha must not exceed max_alpha",
                    ));
                }
                if window < 2 {
                    return Err(ConfigError::invalid(
                        "flow.cvd_smoothing.window",
                        "needs at least two prices",
                    ));
                }
            }
        }
        check_positive("flow.volume_ratio_cap", self.flow.volume_ratio_cap)?;
        check_non_negative("flow.imbalance_threshold_floor", self.flow.imbalance_threshold_floor)?;

        let l = &self.lock;
        check_range("lock.breach_tolerance", l.breach_tolerance, 0.0, 1.0)?;
        check_non_negative("lock.breach_volume_ratio", l.breach_volume_ratio)?;
        check_positive("lock.volatility_ceiling", l.volatility_ceiling)?;
        check_positive("lock.reference_volatility", l.reference_volatility)?;
        if l.break_count_trigger == 0 {
            return Err(ConfigError::invalid(
                "lock.break_count_trigger",
                "must be greater than zero",
            ));
        }

        let s = &self.scoring;
        if !(s.confirm_threshold > 0.0 && s.confirm_threshold <= 100.0) {
            return Err(ConfigError::invalid(
                "scoring.confirm_threshold",
                "must be within (0, 100]",
            ));
        }
        if s.probe_threshold > s.confirm_threshold {
            return Err(ConfigError::invalid(
                "scoring.probe_threshold",
                "must not exceed confirm_threshold",
            ));
        }
        check_range("scoring.cooldown_factor", s.cooldown_factor, 0.0, 1.0)?;
        check_range("scoring.dispersed_entropy_ratio", s.dispersed_entropy_ratio, 0.0, 1.0)?;
        check_range("scoring.concentrated_entropy_ratio", s.concentrated_entropy_ratio, 0.0, 1.0)?;
        check_range("scoring.full_position_pct", s.full_position_pct, 0.0, 100.0)?;
        check_range("scoring.probe_position_pct", s.probe_position_pct, 0.0, 100.0)?;
        check_non_negative("scoring.rebound_touch_band", s.rebound_touch_band)?;
        check_range("scoring.rebound_floor_band", s.rebound_floor_band, 0.0, 1.0)?;
        check_range("scoring.deep_breach_pct", s.deep_breach_pct, 0.0, 1.0)?;
        if s.rebound_capacity < MIN_SAMPLES {
            return Err(ConfigError::invalid(
                "scoring.rebound_capacity",
                format!("must hold at least {MIN_SAMPLES} samples"),
            ));
        }
        if s.rebound_min_span_secs > s.rebound_window_secs {
            return Err(ConfigError::invalid(
                "scoring.rebound_min_span_secs",
                "must not exceed rebound_window_secs",
            ));
        }

        Ok(())
    }
}

fn check_range(field: &'static str, v: f64, lo: f64, hi: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v >= lo && v <= hi {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{v} outside [{lo}, {hi}]")))
    }
}

fn check_alpha(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v > 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{v} outside (0, 1]")))
    }
}

fn check_positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{v} must be positive")))
    }
}

fn check_non_negative(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{v} must not be negative")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json_str(
            r#"{ "lock": { "min_lock_secs": 30 }, "flow": { "cvd_smoothing": { "mode": "fixed", "alpha": 0.3 } } }"#,
        )
        .unwrap();

        assert_eq!(cfg.lock.min_lock_secs, 30);
        assert_eq!(cfg.lock.base_lock_secs, 60);
        assert_eq!(cfg.flow.cvd_smoothing, CvdSmoothing::Fixed { alpha: 0.3 });
        assert_eq!(cfg.windows.price_capacity, 100);
        assert_eq!(cfg.scoring.confirm_threshold, 70.0);
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut cfg = EngineConfig::default();
        cfg.windows.score_capacity = 0;

        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "windows.score_capacity",
                ..
            }
        ));
    }

    #[test]
    fn rejects_window_larger_than_history() {
        let mut cfg = EngineConfig::default();
        cfg.flow.cvd_trend_window = 50;

        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.momentum.volatility_window = 500;

        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_alpha_and_thresholds() {
        let mut cfg = EngineConfig::default();
        cfg.flow.volume_ema_alpha = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.flow.cvd_smoothing = CvdSmoothing::Adaptive {
            min_alpha: 0.6,
            max_alpha: 0.5,
            window: 10,
        };
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.scoring.confirm_threshold = 120.0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.lock.reference_volatility = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_rebound_capacity_below_confirmation_minimum() {
        let mut cfg = EngineConfig::default();
        cfg.scoring.rebound_capacity = 2;

        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "scoring.rebound_capacity",
                ..
            }
        ));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
