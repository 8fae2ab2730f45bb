//! Trade intents emitted by the spread detector.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::DomainError;
use super::id::Symbol;
use super::money::{Price, Volume};
use super::venue::Venue;

/// A request to run one arbitrage cycle on a symbol.
///
/// Immutable once created. The risk manager consumes it exactly once,
/// either turning it into an execution session or dropping it.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeIntent {
    symbol: Symbol,
    buy_venue: Venue,
    sell_venue: Venue,
    target_qty: Volume,
    reference_spread: Price,
    created_at: DateTime<Utc>,
}

impl TradeIntent {
    /// Create a validated intent.
    ///
    /// # Errors
    ///
    /// Rejects non-positive quantities and same-venue pairs.
    pub fn try_new(
        symbol: Symbol,
        buy_venue: Venue,
        target_qty: Volume,
        reference_spread: Price,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Self::with_venues(
            symbol,
            buy_venue,
            buy_venue.other(),
            target_qty,
            reference_spread,
            created_at,
        )
    }

    /// Create an intent with explicit venues.
    ///
    /// # Errors
    ///
    /// Rejects non-positive quantities and same-venue pairs.
    pub fn with_venues(
        symbol: Symbol,
        buy_venue: Venue,
        sell_venue: Venue,
        target_qty: Volume,
        reference_spread: Price,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if target_qty <= Decimal::ZERO {
            return Err(DomainError::NonPositiveQuantity { qty: target_qty });
        }
        if buy_venue == sell_venue {
            return Err(DomainError::SameVenue);
        }
        Ok(Self {
            symbol,
            buy_venue,
            sell_venue,
            target_qty,
            reference_spread,
            created_at,
        })
    }

    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    #[must_use]
    pub const fn buy_venue(&self) -> Venue {
        self.buy_venue
    }

    #[must_use]
    pub const fn sell_venue(&self) -> Venue {
        self.sell_venue
    }

    #[must_use]
    pub const fn target_qty(&self) -> Volume {
        self.target_qty
    }

    #[must_use]
    pub const fn reference_spread(&self) -> Price {
        self.reference_spread
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
