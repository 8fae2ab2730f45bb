//! Domain validation errors for core domain types.
//!
//! This module defines errors that occur when domain invariants are violated.
//! These errors are returned by validating constructors and state transitions.
//!
//! # Examples
//!
//! ```
//! use crossarb::domain::error::DomainError;
//! use crossarb::domain::quote::Quote;
//! use crossarb::domain::venue::Venue;
//! use rust_decimal_macros::dec;
//!
//! // A bid above the ask on the same venue is rejected
//! let result = Quote::try_new("005930", Venue::Krx, dec!(10010), dec!(5), dec!(10000), dec!(5), chrono::Utc::now());
//! assert!(matches!(result, Err(DomainError::CrossedQuote { .. })));
//! ```

use rust_decimal::Decimal;
use thiserror::Error;

use super::session::SessionState;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Prices must be strictly positive.
    #[error("{field} must be positive, got {value}")]
    NonPositivePrice {
        /// Which price was invalid.
        field: &'static str,
        /// The invalid value.
        value: Decimal,
    },

    /// Quantities cannot be negative.
    #[error("{field} must not be negative, got {value}")]
    NegativeQuantity {
        /// Which quantity was invalid.
        field: &'static str,
        /// The invalid value.
        value: Decimal,
    },

    /// A venue's own bid cannot exceed its own ask.
    #[error("crossed quote: bid {bid} > ask {ask}")]
    CrossedQuote {
        /// Best bid.
        bid: Decimal,
        /// Best ask.
        ask: Decimal,
    },

    /// Symbol codes cannot be empty.
    #[error("symbol cannot be empty")]
    EmptySymbol,

    /// Trade quantities must be positive.
    #[error("quantity must be positive, got {qty}")]
    NonPositiveQuantity {
        /// The invalid quantity.
        qty: Decimal,
    },

    /// Buy and sell legs must be on different venues.
    #[error("buy and sell venue must differ")]
    SameVenue,

    /// The execution state machine was asked to make an illegal move.
    #[error("illegal session transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },
}
