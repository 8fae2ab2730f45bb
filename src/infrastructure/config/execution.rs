//! Order executor and paper broker configuration.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::execution::ExecutorConfig;

/// Micro-batch execution configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionAppConfig {
    /// Shares per clip.
    #[serde(default = "default_clip_size")]
    pub clip_size: Decimal,
    /// Upper bound accepted for `clip_size`.
    #[serde(default = "default_max_clip_size")]
    pub max_clip_size: Decimal,
    #[serde(default = "default_fill_timeout_ms")]
    pub fill_timeout_ms: u64,
    #[serde(default = "default_market_fill_timeout_ms")]
    pub market_fill_timeout_ms: u64,
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    /// Wait after a cancel for fills already in flight.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// How long an abort waits for the venue to confirm a submit whose call
    /// timed out.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
}

fn default_clip_size() -> Decimal {
    Decimal::ONE
}

fn default_max_clip_size() -> Decimal {
    Decimal::from(50)
}

const fn default_fill_timeout_ms() -> u64 {
    3000
}

const fn default_market_fill_timeout_ms() -> u64 {
    5000
}

const fn default_session_timeout_secs() -> u64 {
    120
}

const fn default_settle_ms() -> u64 {
    100
}

const fn default_ack_timeout_ms() -> u64 {
    5000
}

impl Default for ExecutionAppConfig {
    fn default() -> Self {
        Self {
            clip_size: default_clip_size(),
            max_clip_size: default_max_clip_size(),
            fill_timeout_ms: default_fill_timeout_ms(),
            market_fill_timeout_ms: default_market_fill_timeout_ms(),
            session_timeout_secs: default_session_timeout_secs(),
            settle_ms: default_settle_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
        }
    }
}

impl From<&ExecutionAppConfig> for ExecutorConfig {
    fn from(config: &ExecutionAppConfig) -> Self {
        Self {
            clip_size: config.clip_size,
            fill_timeout: Duration::from_millis(config.fill_timeout_ms),
            market_fill_timeout: Duration::from_millis(config.market_fill_timeout_ms),
            session_timeout: Duration::from_secs(config.session_timeout_secs),
            settle: Duration::from_millis(config.settle_ms),
            ack_timeout: Duration::from_millis(config.ack_timeout_ms),
        }
    }
}

/// Simulated broker used for dry runs and replays.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerAppConfig {
    /// Delay between accepting an order and reporting its fill.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
}

const fn default_latency_ms() -> u64 {
    20
}

impl Default for BrokerAppConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
        }
    }
}

impl BrokerAppConfig {
    #[must_use]
    pub const fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}
