//! Inbound (driving) ports consumed by inbound adapters.
//!
//! - [`session`]: market-session clock signals
//! - [`risk`]: intent approval results

pub mod risk;
pub mod session;
