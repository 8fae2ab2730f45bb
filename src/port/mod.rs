//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!   Replay / CLI ──► inbound ──► Application ──► outbound ──► Broker, Notifier
//! ```

pub mod inbound;
pub mod outbound;
