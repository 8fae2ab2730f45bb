//! crossarb - KRX/NXT cross-venue equity arbitrage.
//!
//! Watches the same instruments on the Korea Exchange and Nextrade, and when
//! the best bid on one venue clears the best ask on the other by more than
//! fees plus a buffer, buys on the cheap venue and sells on the rich one in
//! small clips, never holding unhedged inventory longer than one leg.
//!
//! # Architecture
//!
//! - [`domain`] - Plain data and invariants: quotes, intents, exposure,
//!   execution sessions and their state machine
//! - [`port`] - Traits at the edges: the broker, notifiers, session signals
//! - [`application`] - Spread detector, risk manager and kill switch,
//!   micro-batch executor, gateway throttler, engine loop
//! - [`adapter`] - Paper broker, webhook notifier, replay feed, CLI
//! - [`infrastructure`] - Configuration, logging, composition root
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `testkit` - Scripted broker, recording notifier and engine harness for
//!   integration tests
//!
//! # Example
//!
//! ```no_run
//! use crossarb::infrastructure::bootstrap;
//! use crossarb::infrastructure::config::settings::Config;
//!
//! # async fn run() -> crossarb::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let runtime = bootstrap::build_paper_runtime(&config)?;
//! runtime.engine.subscribe_all().await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
