use std::time::Duration;

use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::id::Symbol;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// How the caller should react to a failed broker call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying with backoff (timeouts, temporary unavailability).
    Retryable,
    /// The broker refused the request; retrying the same request won't help.
    Rejected,
    /// The broker session is unusable.
    Fatal,
}

/// Broker/execution errors with structured variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("order rejected: {0}")]
    OrderRejected(String),

    #[error("broker call timed out after {0:?}")]
    Timeout(Duration),

    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("broker disconnected: {0}")]
    Disconnected(String),

    #[error("gateway throttler is shut down")]
    ThrottlerClosed,
}

impl ExecutionError {
    /// Classify the failure for retry and escalation decisions.
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::Timeout(_) | Self::BrokerUnavailable(_) => FailureClass::Retryable,
            Self::OrderRejected(_) => FailureClass::Rejected,
            Self::Disconnected(_) | Self::ThrottlerClosed => FailureClass::Fatal,
        }
    }
}

/// Risk management errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("kill switch engaged: {reason}")]
    KillSwitchEngaged { reason: String },

    #[error("session already open for {symbol}")]
    SessionAlreadyOpen { symbol: Symbol },

    #[error("position limit exceeded for {symbol}: {current} + {additional} > {limit}")]
    PositionLimitExceeded {
        symbol: Symbol,
        current: rust_decimal::Decimal,
        additional: rust_decimal::Decimal,
        limit: rust_decimal::Decimal,
    },

    #[error("trading is closed")]
    TradingClosed,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error("replay line {line}: {source}")]
    Replay {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
