//! Canonical top-of-book quote for one symbol on one venue.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::Symbol;
use super::money::{Price, Volume};
use super::venue::Venue;

/// Best bid/ask snapshot published by the tick feed.
///
/// Quotes are immutable once built; the detector replaces the stored quote
/// for a venue on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    symbol: Symbol,
    venue: Venue,
    bid_price: Price,
    bid_qty: Volume,
    ask_price: Price,
    ask_qty: Volume,
    timestamp: DateTime<Utc>,
}

impl Quote {
    /// Create a validated quote.
    ///
    /// # Errors
    ///
    /// Returns a [`DomainError`] when the quote is malformed (empty symbol,
    /// non-positive prices, negative sizes, or bid above ask).
    pub fn try_new(
        symbol: impl Into<Symbol>,
        venue: Venue,
        bid_price: Price,
        bid_qty: Volume,
        ask_price: Price,
        ask_qty: Volume,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let quote = Self {
            symbol: symbol.into(),
            venue,
            bid_price,
            bid_qty,
            ask_price,
            ask_qty,
            timestamp,
        };
        quote.validate()?;
        Ok(quote)
    }

    /// Check the quote invariants.
    ///
    /// Quotes that arrive through deserialization bypass [`Quote::try_new`],
    /// so consumers call this before trusting one.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.symbol.as_str().is_empty() {
            return Err(DomainError::EmptySymbol);
        }
        if self.bid_price <= Decimal::ZERO {
            return Err(DomainError::NonPositivePrice {
                field: "bid_price",
                value: self.bid_price,
            });
        }
        if self.ask_price <= Decimal::ZERO {
            return Err(DomainError::NonPositivePrice {
                field: "ask_price",
                value: self.ask_price,
            });
        }
        if self.bid_qty < Decimal::ZERO {
            return Err(DomainError::NegativeQuantity {
                field: "bid_qty",
                value: self.bid_qty,
            });
        }
        if self.ask_qty < Decimal::ZERO {
            return Err(DomainError::NegativeQuantity {
                field: "ask_qty",
                value: self.ask_qty,
            });
        }
        if self.bid_price > self.ask_price {
            return Err(DomainError::CrossedQuote {
                bid: self.bid_price,
                ask: self.ask_price,
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    #[must_use]
    pub const fn venue(&self) -> Venue {
        self.venue
    }

    #[must_use]
    pub const fn bid_price(&self) -> Price {
        self.bid_price
    }

    #[must_use]
    pub const fn bid_qty(&self) -> Volume {
        self.bid_qty
    }

    #[must_use]
    pub const fn ask_price(&self) -> Price {
        self.ask_price
    }

    #[must_use]
    pub const fn ask_qty(&self) -> Volume {
        self.ask_qty
    }

    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// True when the quote is older than `max_age` at `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.timestamp) > max_age
    }
}
