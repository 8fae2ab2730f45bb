//! Dual-listed instrument metadata.

use serde::{Deserialize, Serialize};

use super::id::Symbol;
use super::venue::Venue;

/// An instrument listed on both venues under venue-specific codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Canonical symbol used throughout the engine.
    pub symbol: Symbol,
    /// Code used when talking to KRX.
    pub krx_code: String,
    /// Code used when talking to NXT.
    pub nxt_code: String,
    /// Human-readable name.
    pub name: String,
}

impl SymbolInfo {
    /// Venue-specific code for routing broker calls.
    #[must_use]
    pub fn code_for(&self, venue: Venue) -> &str {
        match venue {
            Venue::Krx => &self.krx_code,
            Venue::Nxt => &self.nxt_code,
        }
    }
}
