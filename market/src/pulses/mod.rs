//! Market Pulse Abstraction
//!
//! A Pulse is an observer that derives one family of microstructure signals
//! (support/resistance, order flow, momentum, book entropy) from quote
//! snapshots.

pub mod entropy;
pub mod flow;
pub mod momentum;
pub mod support;

pub use self::entropy::{BookEntropy, EntropyMonitor};
pub use self::flow::{CvdSmoothing, FlowConfig, FlowMonitor, FlowState};
pub use self::momentum::{MomentumConfig, MomentumMonitor, MomentumState};
pub use self::support::{SupportConfig, SupportMonitor, SupportState};

use crate::rolling_window::RollingWindow;
use crate::types::MarketSnapshot;

/// Everything a pulse may read during one tick.
///
/// `prices` is the instrument's shared price history and already contains
/// `snapshot.last_price` as its newest sample.
#[derive(Clone, Copy)]
pub struct PulseInput<'a> {
    pub snapshot: &'a MarketSnapshot,
    pub prices: &'a RollingWindow,
}

/// Trait for deriving market signals from quote snapshots.
///
/// Implementors are responsible for maintaining their own internal state
/// (like rolling windows) while remaining deterministic.
pub trait MarketPulse {
    /// The specific signal produced by this pulse.
    type Output;

    /// Ingests a new snapshot to update internal metrics.
    fn update(&mut self, input: PulseInput<'_>);

    /// Returns the signal derived by the latest `update`.
    ///
    /// # Safety
    /// This method must be side-effect free and never panic.
    fn compute(&self) -> Self::Output;

    /// Purges all internal history/state.
    fn reset(&mut self);
}
