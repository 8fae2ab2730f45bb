//! Fill reports returned by the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ClientOrderId, FillId, Symbol};
use super::money::{Price, Volume};
use super::venue::{Side, Venue};

/// One execution against an order; an order may receive several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Broker execution id, unique per fill.
    pub fill_id: FillId,
    /// Our id of the order that was filled.
    pub client_order_id: ClientOrderId,
    pub symbol: Symbol,
    pub venue: Venue,
    pub side: Side,
    pub qty: Volume,
    pub price: Price,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    /// Traded notional (`qty * price`).
    #[must_use]
    pub fn notional(&self) -> Price {
        self.qty * self.price
    }
}
