//! Per-symbol detector state.

use chrono::{DateTime, Utc};

use crate::domain::quote::Quote;
use crate::domain::venue::Venue;

/// Best quote per venue plus the trip bookkeeping for one symbol.
#[derive(Debug, Clone, Default)]
pub struct SpreadState {
    krx: Option<Quote>,
    nxt: Option<Quote>,
    last_trip_at: Option<DateTime<Utc>>,
    trips_today: u32,
}

impl SpreadState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `quote` as the venue's best quote. Returns `false` when it is
    /// older than the quote already held.
    pub fn update(&mut self, quote: Quote) -> bool {
        let slot = match quote.venue() {
            Venue::Krx => &mut self.krx,
            Venue::Nxt => &mut self.nxt,
        };
        if slot
            .as_ref()
            .is_some_and(|held| held.timestamp() > quote.timestamp())
        {
            return false;
        }
        *slot = Some(quote);
        true
    }

    #[must_use]
    pub const fn quote(&self, venue: Venue) -> Option<&Quote> {
        match venue {
            Venue::Krx => self.krx.as_ref(),
            Venue::Nxt => self.nxt.as_ref(),
        }
    }

    /// Count one approved trip.
    pub fn record_trip(&mut self, at: DateTime<Utc>) {
        self.trips_today += 1;
        self.last_trip_at = Some(at);
    }

    /// Session rollover: forget trip counts, keep quotes.
    pub fn reset_trips(&mut self) {
        self.trips_today = 0;
        self.last_trip_at = None;
    }

    #[must_use]
    pub const fn trips_today(&self) -> u32 {
        self.trips_today
    }

    #[must_use]
    pub const fn last_trip_at(&self) -> Option<DateTime<Utc>> {
        self.last_trip_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn quote(venue: Venue, at: DateTime<Utc>) -> Quote {
        Quote::try_new("A", venue, dec!(100), dec!(1), dec!(101), dec!(1), at).unwrap()
    }

    #[test]
    fn out_of_order_quote_is_ignored() {
        let now = Utc::now();
        let mut state = SpreadState::new();

        assert!(state.update(quote(Venue::Krx, now)));
        assert!(!state.update(quote(Venue::Krx, now - Duration::seconds(1))));
        assert_eq!(state.quote(Venue::Krx).unwrap().timestamp(), now);
        assert!(state.quote(Venue::Nxt).is_none());
    }

    #[test]
    fn reset_clears_trip_count() {
        let mut state = SpreadState::new();
        state.record_trip(Utc::now());
        state.record_trip(Utc::now());
        assert_eq!(state.trips_today(), 2);

        state.reset_trips();
        assert_eq!(state.trips_today(), 0);
        assert!(state.last_trip_at().is_none());
    }
}
