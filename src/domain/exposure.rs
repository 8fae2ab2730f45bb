//! Per-symbol exposure bookkeeping.

use std::collections::HashSet;

use rust_decimal::Decimal;

use super::fill::Fill;
use super::id::{FillId, SessionId};
use super::money::{Price, Volume};
use super::venue::Side;

/// Position and realized P/L for one symbol.
///
/// The single source of truth for "is this symbol flat". Also carries the
/// `open_intent` slot that allows at most one execution session per symbol.
#[derive(Debug, Clone, Default)]
pub struct ExposureRecord {
    net_position: Volume,
    avg_entry_price: Price,
    cumulative_pl: Price,
    open_intent: Option<SessionId>,
    /// Ids of fills already applied. Only cleared when the market session
    /// opens, so it grows by one entry per fill over a trading day.
    seen_fills: HashSet<FillId>,
}

impl ExposureRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signed position: positive long, negative short.
    #[must_use]
    pub const fn net_position(&self) -> Volume {
        self.net_position
    }

    #[must_use]
    pub const fn avg_entry_price(&self) -> Price {
        self.avg_entry_price
    }

    /// Realized P/L net of fees.
    #[must_use]
    pub const fn cumulative_pl(&self) -> Price {
        self.cumulative_pl
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.net_position.is_zero()
    }

    #[must_use]
    pub const fn open_intent(&self) -> Option<&SessionId> {
        self.open_intent.as_ref()
    }

    /// Claim the session slot. Returns `false` if already taken.
    pub fn try_open(&mut self, session: SessionId) -> bool {
        if self.open_intent.is_some() {
            return false;
        }
        self.open_intent = Some(session);
        true
    }

    /// Release the slot if `session` owns it. Returns whether it did.
    pub fn release(&mut self, session: &SessionId) -> bool {
        if self.open_intent.as_ref() == Some(session) {
            self.open_intent = None;
            true
        } else {
            false
        }
    }

    /// Apply a fill, returning the realized P/L change, or `None` when the
    /// fill id was already applied.
    pub fn apply_fill(&mut self, fill: &Fill, fee: Price) -> Option<Price> {
        if !self.seen_fills.insert(fill.fill_id.clone()) {
            return None;
        }

        let signed = match fill.side {
            Side::Buy => fill.qty,
            Side::Sell => -fill.qty,
        };
        let mut realized = -fee;

        let same_direction = self.net_position.is_zero()
            || (self.net_position.is_sign_positive() == signed.is_sign_positive());

        if same_direction {
            let held = self.net_position.abs();
            let total = held + fill.qty;
            if !total.is_zero() {
                self.avg_entry_price = (held * self.avg_entry_price + fill.qty * fill.price) / total;
            }
            self.net_position += signed;
        } else {
            let held = self.net_position.abs();
            let closing = fill.qty.min(held);
            let per_share = if self.net_position.is_sign_positive() {
                fill.price - self.avg_entry_price
            } else {
                self.avg_entry_price - fill.price
            };
            realized += closing * per_share;
            self.net_position += signed;

            if self.net_position.is_zero() {
                self.avg_entry_price = Decimal::ZERO;
            } else if fill.qty > held {
                // Flipped through zero: the remainder opens at the fill price.
                self.avg_entry_price = fill.price;
            }
        }

        self.cumulative_pl += realized;
        Some(realized)
    }

    /// Forget processed fill ids (session rollover).
    pub fn clear_fill_history(&mut self) {
        self.seen_fills.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::{ClientOrderId, Symbol};
    use crate::domain::venue::Venue;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn fill(id: &str, side: Side, qty: Decimal, price: Decimal) -> Fill {
        Fill {
            fill_id: FillId::from(id),
            client_order_id: ClientOrderId::from("o"),
            symbol: Symbol::from("A"),
            venue: Venue::Krx,
            side,
            qty,
            price,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn round_trip_realizes_spread() {
        let mut record = ExposureRecord::new();

        record.apply_fill(&fill("1", Side::Buy, dec!(2), dec!(10010)), Decimal::ZERO);
        assert_eq!(record.net_position(), dec!(2));
        assert_eq!(record.cumulative_pl(), Decimal::ZERO);

        let realized = record
            .apply_fill(&fill("2", Side::Sell, dec!(2), dec!(10050)), Decimal::ZERO)
            .unwrap();

        assert_eq!(realized, dec!(80));
        assert!(record.is_flat());
        assert_eq!(record.avg_entry_price(), Decimal::ZERO);
    }

    #[test]
    fn fees_reduce_realized_pl_immediately() {
        let mut record = ExposureRecord::new();
        record.apply_fill(&fill("1", Side::Buy, dec!(1), dec!(100)), dec!(0.5));
        assert_eq!(record.cumulative_pl(), dec!(-0.5));
    }

    #[test]
    fn replayed_fill_is_ignored() {
        let mut record = ExposureRecord::new();
        let f = fill("dup", Side::Buy, dec!(1), dec!(100));

        assert!(record.apply_fill(&f, Decimal::ZERO).is_some());
        assert!(record.apply_fill(&f, Decimal::ZERO).is_none());
        assert_eq!(record.net_position(), dec!(1));
    }

    #[test]
    fn fill_history_lasts_until_cleared() {
        let mut record = ExposureRecord::new();
        let f = fill("day-1", Side::Buy, dec!(1), dec!(100));
        record.apply_fill(&f, Decimal::ZERO);
        record.apply_fill(&fill("day-2", Side::Sell, dec!(1), dec!(100)), Decimal::ZERO);
        assert!(record.apply_fill(&f, Decimal::ZERO).is_none());

        record.clear_fill_history();
        assert!(record.apply_fill(&f, Decimal::ZERO).is_some());
        assert_eq!(record.net_position(), dec!(1));
    }

    #[test]
    fn averaging_up_then_partial_close() {
        let mut record = ExposureRecord::new();
        record.apply_fill(&fill("1", Side::Buy, dec!(1), dec!(100)), Decimal::ZERO);
        record.apply_fill(&fill("2", Side::Buy, dec!(1), dec!(110)), Decimal::ZERO);
        assert_eq!(record.avg_entry_price(), dec!(105));

        let realized = record
            .apply_fill(&fill("3", Side::Sell, dec!(1), dec!(115)), Decimal::ZERO)
            .unwrap();
        assert_eq!(realized, dec!(10));
        assert_eq!(record.net_position(), dec!(1));
    }

    #[test]
    fn short_position_realizes_on_buy_back() {
        let mut record = ExposureRecord::new();
        record.apply_fill(&fill("1", Side::Sell, dec!(1), dec!(100)), Decimal::ZERO);
        assert_eq!(record.net_position(), dec!(-1));

        let realized = record
            .apply_fill(&fill("2", Side::Buy, dec!(1), dec!(90)), Decimal::ZERO)
            .unwrap();
        assert_eq!(realized, dec!(10));
        assert!(record.is_flat());
    }

    #[test]
    fn session_slot_is_exclusive() {
        let mut record = ExposureRecord::new();
        let first = SessionId::from("s1");

        assert!(record.try_open(first.clone()));
        assert!(!record.try_open(SessionId::from("s2")));
        assert!(!record.release(&SessionId::from("s2")));
        assert!(record.release(&first));
        assert!(record.open_intent().is_none());
    }
}
