//! Venue fee schedule and net-spread arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::{Price, Volume};
use super::quote::Quote;
use super::venue::Venue;

/// Proportional trading fee per venue (e.g. `0.00015` = 0.015%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub krx: Decimal,
    pub nxt: Decimal,
}

impl FeeSchedule {
    #[must_use]
    pub const fn new(krx: Decimal, nxt: Decimal) -> Self {
        Self { krx, nxt }
    }

    /// Fee rate charged by `venue`.
    #[must_use]
    pub const fn rate(&self, venue: Venue) -> Decimal {
        match venue {
            Venue::Krx => self.krx,
            Venue::Nxt => self.nxt,
        }
    }

    /// Fee in currency for trading `qty` at `price` on `venue`.
    #[must_use]
    pub fn fee(&self, venue: Venue, price: Price, qty: Volume) -> Price {
        price * qty * self.rate(venue)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            krx: Decimal::new(15, 5),  // 0.015%
            nxt: Decimal::new(145, 6), // 0.0145%
        }
    }
}

/// Per-share edge of buying at `buy.ask` and selling at `sell.bid`, net of both
/// venues' fees.
#[must_use]
pub fn net_spread(buy: &Quote, sell: &Quote, fees: &FeeSchedule) -> Price {
    let buy_fee = fees.fee(buy.venue(), buy.ask_price(), Decimal::ONE);
    let sell_fee = fees.fee(sell.venue(), sell.bid_price(), Decimal::ONE);
    sell.bid_price() - buy.ask_price() - buy_fee - sell_fee
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn default_rates_match_venue_tariffs() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.rate(Venue::Krx), dec!(0.00015));
        assert_eq!(fees.rate(Venue::Nxt), dec!(0.000145));
    }

    #[test]
    fn net_spread_subtracts_both_fees() {
        let now = Utc::now();
        let krx = Quote::try_new("A", Venue::Krx, dec!(10000), dec!(1), dec!(10010), dec!(1), now)
            .unwrap();
        let nxt = Quote::try_new("A", Venue::Nxt, dec!(10050), dec!(1), dec!(10060), dec!(1), now)
            .unwrap();

        let spread = net_spread(&krx, &nxt, &FeeSchedule::default());

        // 10050 - 10010 - 10010 * 0.00015 - 10050 * 0.000145
        assert_eq!(spread, dec!(37.041250));
    }

    #[test]
    fn reverse_direction_is_negative() {
        let now = Utc::now();
        let krx = Quote::try_new("A", Venue::Krx, dec!(10000), dec!(1), dec!(10010), dec!(1), now)
            .unwrap();
        let nxt = Quote::try_new("A", Venue::Nxt, dec!(10050), dec!(1), dec!(10060), dec!(1), now)
            .unwrap();

        assert!(net_spread(&nxt, &krx, &FeeSchedule::default()) < Decimal::ZERO);
    }
}
