//! Market data model and microstructure pulses.
//!
//! Quote snapshots enter through [`normalizer`], are stored in bounded
//! [`rolling_window`]s, and are read by the [`pulses`] that derive
//! support/resistance, order flow, momentum and book entropy.

pub mod normalizer;
pub mod pulses;
pub mod rolling_window;
pub mod stats;
pub mod types;

pub use normalizer::{RawQuote, safe_float};
pub use rolling_window::RollingWindow;
pub use types::{BookLevel, BookSide, MarketSnapshot};
