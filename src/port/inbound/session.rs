//! Market-session clock signals.

use serde::{Deserialize, Serialize};

/// Venue-status transitions driven by the session clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSignal {
    /// Trading hours begin; per-symbol trip counters reset.
    Open,
    /// Trading is about to stop; every open session must flatten.
    Closing,
    /// Trading hours are over; no new intents are approved.
    Closed,
}

impl SessionSignal {
    /// Whether new intents may be approved after this signal.
    #[must_use]
    pub const fn allows_trading(self) -> bool {
        matches!(self, Self::Open)
    }
}
