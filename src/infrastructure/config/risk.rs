//! Risk management configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::risk::RiskLimits;

/// Risk management configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Largest absolute net position per symbol, in shares.
    #[serde(default = "default_max_position_per_symbol")]
    pub max_position_per_symbol: Decimal,
    /// Cumulative realized P/L floor in KRW; crossing it engages the kill switch.
    #[serde(default = "default_pl_floor")]
    pub pl_floor: Decimal,
    /// Consecutive broker errors tolerated inside the window.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    #[serde(default = "default_error_window_secs")]
    pub error_window_secs: u64,
}

fn default_max_position_per_symbol() -> Decimal {
    Decimal::from(100)
}

fn default_pl_floor() -> Decimal {
    Decimal::from(-1_000_000)
}

const fn default_max_consecutive_errors() -> u32 {
    5
}

const fn default_error_window_secs() -> u64 {
    60
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_per_symbol: default_max_position_per_symbol(),
            pl_floor: default_pl_floor(),
            max_consecutive_errors: default_max_consecutive_errors(),
            error_window_secs: default_error_window_secs(),
        }
    }
}

impl From<&RiskConfig> for RiskLimits {
    fn from(config: &RiskConfig) -> Self {
        Self {
            max_position_per_symbol: config.max_position_per_symbol,
            pl_floor: config.pl_floor,
            max_consecutive_errors: config.max_consecutive_errors,
            error_window: Duration::from_secs(config.error_window_secs),
        }
    }
}
