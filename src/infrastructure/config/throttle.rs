//! Gateway throttler and retry configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::throttle::{RetryPolicy, ThrottlerConfig};

/// Broker request throttling.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleAppConfig {
    /// Broker-imposed ceiling on requests per second.
    #[serde(default = "default_max_requests_per_sec")]
    pub max_requests_per_sec: u32,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryAppConfig,
}

const fn default_max_requests_per_sec() -> u32 {
    5
}

const fn default_call_timeout_ms() -> u64 {
    2000
}

impl Default for ThrottleAppConfig {
    fn default() -> Self {
        Self {
            max_requests_per_sec: default_max_requests_per_sec(),
            call_timeout_ms: default_call_timeout_ms(),
            retry: RetryAppConfig::default(),
        }
    }
}

impl From<&ThrottleAppConfig> for ThrottlerConfig {
    fn from(config: &ThrottleAppConfig) -> Self {
        Self {
            max_requests_per_sec: config.max_requests_per_sec,
            call_timeout: Duration::from_millis(config.call_timeout_ms),
        }
    }
}

/// Backoff for transient broker failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryAppConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_delay_ms() -> u64 {
    200
}

const fn default_max_delay_ms() -> u64 {
    2000
}

const fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryAppConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl From<&RetryAppConfig> for RetryPolicy {
    fn from(config: &RetryAppConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            ..Self::default()
        }
    }
}
