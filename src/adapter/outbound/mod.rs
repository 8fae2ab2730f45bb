//! Outbound adapters (driven side).

pub mod paper;
pub mod webhook;
