//! Infrastructure configuration modules.

pub mod detector;
pub mod execution;
pub mod logging;
pub mod notifier;
pub mod risk;
pub mod settings;
pub mod symbols;
pub mod throttle;
