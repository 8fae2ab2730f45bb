//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all application settings.
//! Configuration is loaded from a TOML file; the operator webhook URL may be
//! supplied through `SLACK_WEBHOOK_URL` instead of the file.
//!
//! # Example
//!
//! ```no_run
//! use crossarb::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::detector::{DetectorAppConfig, FeeConfig};
use super::execution::{BrokerAppConfig, ExecutionAppConfig};
use super::logging::LoggingConfig;
use super::notifier::NotifierAppConfig;
use super::risk::RiskConfig;
use super::symbols::SymbolConfig;
use super::throttle::ThrottleAppConfig;
use crate::application::detector::DetectorConfig;
use crate::application::execution::ExecutorConfig;
use crate::application::risk::RiskLimits;
use crate::application::throttle::{RetryPolicy, ThrottlerConfig};
use crate::domain::fee::FeeSchedule;
use crate::domain::symbol::SymbolInfo;
use crate::error::{ConfigError, Result};

/// Main application configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Spread detection thresholds.
    #[serde(default)]
    pub detector: DetectorAppConfig,

    /// Per-venue fee rates.
    #[serde(default)]
    pub fees: FeeConfig,

    /// Clip sizing and leg timeouts.
    #[serde(default)]
    pub execution: ExecutionAppConfig,

    /// Position, P/L and error limits.
    #[serde(default)]
    pub risk: RiskConfig,

    /// Broker request rate and retry settings.
    #[serde(default)]
    pub throttle: ThrottleAppConfig,

    /// Paper broker settings.
    #[serde(default)]
    pub broker: BrokerAppConfig,

    /// Operator alert channel.
    #[serde(default)]
    pub notifier: NotifierAppConfig,

    /// Symbols traded on both venues.
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
            if !url.trim().is_empty() {
                config.notifier.webhook_url = Some(url);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is
    /// malformed, or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(invalid("logging.format", "must be \"pretty\" or \"json\""));
        }

        let execution = &self.execution;
        if execution.clip_size <= Decimal::ZERO {
            return Err(invalid("clip_size", "must be greater than 0"));
        }
        if execution.clip_size > execution.max_clip_size {
            return Err(invalid(
                "clip_size",
                format!("must not exceed max_clip_size ({})", execution.max_clip_size),
            ));
        }
        if execution.fill_timeout_ms == 0 || execution.market_fill_timeout_ms == 0 {
            return Err(invalid("fill_timeout_ms", "timeouts must be greater than 0"));
        }
        if execution.session_timeout_secs == 0 {
            return Err(invalid("session_timeout_secs", "must be greater than 0"));
        }

        let detector = &self.detector;
        if detector.min_edge.is_some_and(|edge| edge < Decimal::ZERO) {
            return Err(invalid("min_edge", "must be 0 or greater"));
        }
        if detector.edge_ratio < Decimal::ZERO {
            return Err(invalid("edge_ratio", "must be 0 or greater"));
        }
        if detector.tick_size <= Decimal::ZERO {
            return Err(invalid("tick_size", "must be greater than 0"));
        }
        if detector.clips_per_intent == 0 {
            return Err(invalid("clips_per_intent", "must be at least 1"));
        }
        if detector.max_quote_age_ms == 0 {
            return Err(invalid("max_quote_age_ms", "must be greater than 0"));
        }

        let fee_ceiling = Decimal::new(1, 2);
        for (field, rate) in [("fees.krx", self.fees.krx), ("fees.nxt", self.fees.nxt)] {
            if rate < Decimal::ZERO || rate >= fee_ceiling {
                return Err(invalid(field, "must be in [0, 0.01)"));
            }
        }

        if self.risk.max_position_per_symbol <= Decimal::ZERO {
            return Err(invalid("max_position_per_symbol", "must be greater than 0"));
        }
        if self.risk.pl_floor > Decimal::ZERO {
            return Err(invalid("pl_floor", "must be 0 or less"));
        }
        if self.risk.max_consecutive_errors == 0 {
            return Err(invalid("max_consecutive_errors", "must be at least 1"));
        }

        if self.throttle.max_requests_per_sec == 0 {
            return Err(invalid("max_requests_per_sec", "must be at least 1"));
        }
        if self.throttle.call_timeout_ms == 0 {
            return Err(invalid("call_timeout_ms", "must be greater than 0"));
        }
        let retry = &self.throttle.retry;
        if retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(invalid("retry.max_delay_ms", "must be >= initial_delay_ms"));
        }
        if retry.multiplier < 1.0 {
            return Err(invalid("retry.multiplier", "must be >= 1.0"));
        }

        let mut seen = HashSet::new();
        for symbol in &self.symbols {
            if symbol.code.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "symbols.code",
                }
                .into());
            }
            if !seen.insert(symbol.code.as_str()) {
                return Err(invalid(
                    "symbols",
                    format!("duplicate symbol code {}", symbol.code),
                ));
            }
        }

        Ok(())
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    #[must_use]
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::from(&self.fees)
    }

    #[must_use]
    pub fn detector_config(&self) -> DetectorConfig {
        self.detector.to_core_config(self.execution.clip_size)
    }

    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::from(&self.execution)
    }

    #[must_use]
    pub fn risk_limits(&self) -> RiskLimits {
        RiskLimits::from(&self.risk)
    }

    #[must_use]
    pub fn throttler_config(&self) -> ThrottlerConfig {
        ThrottlerConfig::from(&self.throttle)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.throttle.retry)
    }

    #[must_use]
    pub fn symbol_infos(&self) -> Vec<SymbolInfo> {
        self.symbols.iter().map(SymbolInfo::from).collect()
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
    .into()
}
