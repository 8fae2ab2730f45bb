//! Order execution: the per-session micro-batch state machine.

pub mod executor;
pub mod leg;
pub mod router;

pub use executor::{ExecutorConfig, OrderExecutor};
pub use router::{FillRouter, LegEvent};
