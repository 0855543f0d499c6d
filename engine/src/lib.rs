//! Streaming market-microstructure audit engine.
//!
//! One [`AuditEngine`] owns the state of one instrument and turns each
//! [`market::MarketSnapshot`] into an [`AuditResult`]. The
//! [`InstrumentRegistry`] keeps one engine per instrument when several are
//! monitored at once.

pub mod audit;
pub mod config;
pub mod error;
pub mod rebound;
pub mod registry;
pub mod risk_lock;
pub mod scoring;
pub mod state;

pub use audit::{AuditEngine, AuditResult};
pub use config::{EngineConfig, LockConfig, ScoringConfig, WindowConfig};
pub use error::ConfigError;
pub use registry::InstrumentRegistry;
pub use scoring::{Recommendation, ScoreBreakdown};
pub use state::InstrumentState;
