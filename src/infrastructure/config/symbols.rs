//! Traded symbol map.

use serde::Deserialize;

use crate::domain::id::Symbol;
use crate::domain::symbol::SymbolInfo;

/// One `[[symbols]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
    /// Canonical code shared by both venues.
    pub code: String,
    /// KRX instrument code; defaults to `code`.
    #[serde(default)]
    pub krx_code: Option<String>,
    /// NXT instrument code; defaults to `code`.
    #[serde(default)]
    pub nxt_code: Option<String>,
    #[serde(default)]
    pub name: String,
}

impl From<&SymbolConfig> for SymbolInfo {
    fn from(config: &SymbolConfig) -> Self {
        Self {
            symbol: Symbol::new(config.code.clone()),
            krx_code: config.krx_code.clone().unwrap_or_else(|| config.code.clone()),
            nxt_code: config.nxt_code.clone().unwrap_or_else(|| config.code.clone()),
            name: config.name.clone(),
        }
    }
}
