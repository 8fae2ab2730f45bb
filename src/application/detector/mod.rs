//! Spread detection.

pub mod spread;
pub mod state;

pub use spread::{DetectorConfig, SpreadDetector, SpreadSnapshot};
pub use state::SpreadState;
