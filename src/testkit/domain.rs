//! Builders for domain primitives used across tests.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::domain::fill::Fill;
use crate::domain::id::{ClientOrderId, FillId, Symbol};
use crate::domain::intent::TradeIntent;
use crate::domain::quote::Quote;
use crate::domain::symbol::SymbolInfo;
use crate::domain::venue::{Side, Venue};

/// Symbol used by tests that only need one.
pub const SYMBOL: &str = "005930";

/// A fresh quote with ample size on both sides.
///
/// # Panics
///
/// Panics if the prices do not form a valid quote.
#[must_use]
pub fn quote(symbol: &str, venue: Venue, bid: Decimal, ask: Decimal) -> Quote {
    Quote::try_new(
        symbol,
        venue,
        bid,
        Decimal::from(1000),
        ask,
        Decimal::from(1000),
        Utc::now(),
    )
    .expect("valid test quote")
}

/// An intent for `qty` shares buying on `buy_venue`.
///
/// # Panics
///
/// Panics if `qty` is not positive.
#[must_use]
pub fn intent(symbol: &str, buy_venue: Venue, qty: Decimal) -> TradeIntent {
    TradeIntent::try_new(Symbol::from(symbol), buy_venue, qty, Decimal::from(30), Utc::now())
        .expect("valid test intent")
}

/// A fill report with a caller-chosen id.
#[must_use]
pub fn fill(
    fill_id: &str,
    symbol: &str,
    venue: Venue,
    side: Side,
    qty: Decimal,
    price: Decimal,
) -> Fill {
    Fill {
        fill_id: FillId::from(fill_id),
        client_order_id: ClientOrderId::new(format!("{fill_id}-order")),
        symbol: Symbol::from(symbol),
        venue,
        side,
        qty,
        price,
        timestamp: Utc::now(),
    }
}

/// Symbol map entry with identical codes on both venues.
#[must_use]
pub fn symbol_info(code: &str) -> SymbolInfo {
    SymbolInfo {
        symbol: Symbol::from(code),
        krx_code: code.to_string(),
        nxt_code: code.to_string(),
        name: format!("Test {code}"),
    }
}
