//! Venue-agnostic domain types.
//!
//! Nothing in this layer depends on tokio, the broker, or configuration
//! loading. Everything here is plain data plus the invariants that protect it.

pub mod error;
pub mod exposure;
pub mod fee;
pub mod fill;
pub mod id;
pub mod intent;
pub mod money;
pub mod quote;
pub mod session;
pub mod symbol;
pub mod venue;
