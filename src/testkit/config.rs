//! Canonical test configurations.

use crate::infrastructure::config::settings::Config;
use crate::infrastructure::config::symbols::SymbolConfig;

use super::domain::SYMBOL;

/// Defaults plus short timeouts and the given symbols.
#[must_use]
pub fn config_with_symbols(codes: &[&str]) -> Config {
    let mut config = Config::default();
    config.execution.fill_timeout_ms = 500;
    config.execution.market_fill_timeout_ms = 1000;
    config.execution.session_timeout_secs = 30;
    config.execution.settle_ms = 20;
    config.execution.ack_timeout_ms = 1000;
    config.throttle.max_requests_per_sec = 20;
    config.symbols = codes
        .iter()
        .map(|code| SymbolConfig {
            code: (*code).to_string(),
            krx_code: None,
            nxt_code: None,
            name: String::new(),
        })
        .collect();
    config
}

/// [`config_with_symbols`] for the default test symbol.
#[must_use]
pub fn test_config() -> Config {
    config_with_symbols(&[SYMBOL])
}
