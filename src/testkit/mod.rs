//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`broker`]: `ScriptedBroker`, a [`Broker`](crate::port::outbound::broker::Broker)
//!   double with per-order fill scripts and a call log.
//! - [`notifier`]: `RecordingNotifier`, keeps every event.
//! - [`domain`]: Builders for quotes, intents and fills.
//! - [`config`]: Canonical test configurations.
//! - [`harness`]: The full engine wired to the doubles above.

pub mod broker;
pub mod config;
pub mod domain;
pub mod harness;
pub mod notifier;
