//! Risk and exposure management.

pub mod error_window;
pub mod exposure_book;
pub mod kill_switch;
pub mod manager;

pub use manager::{RiskLimits, RiskManager};
