//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the broker session and the event sink.

pub mod broker;
pub mod notifier;
