//! Order legs placed by a session.

use rust_decimal::Decimal;

use crate::domain::id::{ClientOrderId, OrderId};
use crate::domain::money::Volume;
use crate::domain::venue::{Side, Venue};

/// One order placed by a session and what has happened to it.
#[derive(Debug, Clone)]
pub struct Leg {
    pub client_order_id: ClientOrderId,
    pub order_id: Option<OrderId>,
    pub side: Side,
    pub venue: Venue,
    pub qty: Volume,
    pub filled: Volume,
    pub market: bool,
    /// Still able to fill: accepted (or submitted with the outcome unknown),
    /// not canceled, rejected or complete.
    pub working: bool,
    pub reject_reason: Option<String>,
}

impl Leg {
    #[must_use]
    pub fn new(client_order_id: ClientOrderId, side: Side, venue: Venue, qty: Volume, market: bool) -> Self {
        Self {
            client_order_id,
            order_id: None,
            side,
            venue,
            qty,
            filled: Decimal::ZERO,
            market,
            working: false,
            reject_reason: None,
        }
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.filled >= self.qty
    }

    /// Submitted, but the call timed out before the venue answered: the order
    /// may be live without an order id to cancel it by.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.working && self.order_id.is_none()
    }

    /// The venue acknowledged the order.
    pub fn accept(&mut self, order_id: OrderId) {
        if self.order_id.is_none() {
            self.order_id = Some(order_id);
        }
    }

    pub fn add_fill(&mut self, qty: Volume) {
        self.filled += qty;
        if self.is_filled() {
            self.working = false;
        }
    }

    pub fn reject(&mut self, reason: String) {
        self.working = false;
        self.reject_reason = Some(reason);
    }
}

/// How waiting on a leg ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegWait {
    Filled,
    TimedOut,
    Rejected(String),
    Aborted(crate::domain::session::AbortReason),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn partial_fills_accumulate() {
        let mut leg = Leg::new(ClientOrderId::from("s-1"), Side::Buy, Venue::Krx, dec!(3), false);
        leg.working = true;

        leg.add_fill(dec!(1));
        assert!(!leg.is_filled());
        assert!(leg.working);

        leg.add_fill(dec!(2));
        assert!(leg.is_filled());
        assert!(!leg.working);
    }

    #[test]
    fn timed_out_submit_is_in_flight_until_acknowledged() {
        let mut leg = Leg::new(ClientOrderId::from("s-2"), Side::Sell, Venue::Nxt, dec!(1), false);
        leg.working = true;
        assert!(leg.is_in_flight());

        leg.accept(OrderId::new("V-9"));
        assert!(!leg.is_in_flight());
        assert!(leg.working);

        leg.accept(OrderId::new("V-10"));
        assert_eq!(leg.order_id, Some(OrderId::new("V-9")));
    }

    #[test]
    fn rejected_submit_is_not_in_flight() {
        let mut leg = Leg::new(ClientOrderId::from("s-3"), Side::Buy, Venue::Krx, dec!(1), false);
        leg.working = true;
        leg.reject("halted".into());
        assert!(!leg.is_in_flight());
    }
}
