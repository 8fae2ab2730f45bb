//! Cross-venue spread detection.
//!
//! For every quote the detector refreshes the symbol's book, evaluates both
//! directions (buy KRX / sell NXT, then buy NXT / sell KRX) and emits a
//! [`TradeIntent`] when the best net spread clears the buffer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, trace, warn};

use super::state::SpreadState;
use crate::application::risk::RiskManager;
use crate::domain::fee::{net_spread, FeeSchedule};
use crate::domain::id::Symbol;
use crate::domain::intent::TradeIntent;
use crate::domain::money::{Price, Volume};
use crate::domain::quote::Quote;
use crate::domain::venue::Venue;
use crate::port::outbound::notifier::{Event, EventKind, Notifier};

/// Core detector settings.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Absolute per-share edge required; overrides the ratio/tick rule.
    pub min_edge: Option<Price>,
    /// Edge as a fraction of the buy-side ask.
    pub edge_ratio: Decimal,
    /// Minimum price increment; floor for the buffer.
    pub tick_size: Price,
    pub max_trips_per_symbol: u32,
    /// Quotes older than this are treated as absent.
    pub max_quote_age: Duration,
    /// Shares per clip.
    pub clip_size: Volume,
    /// Clips per intent; the intent targets `clip_size * clips_per_intent`.
    pub clips_per_intent: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_edge: None,
            edge_ratio: Decimal::new(1, 4),
            tick_size: Decimal::ONE,
            max_trips_per_symbol: 20,
            max_quote_age: Duration::milliseconds(3000),
            clip_size: Decimal::ONE,
            clips_per_intent: 1,
        }
    }
}

impl DetectorConfig {
    /// Edge a spread must exceed, given the ask it would buy at.
    #[must_use]
    pub fn buffer(&self, reference_ask: Price) -> Price {
        self.min_edge
            .unwrap_or_else(|| (reference_ask * self.edge_ratio).max(self.tick_size))
    }

    #[must_use]
    pub fn target_qty(&self) -> Volume {
        self.clip_size * Decimal::from(self.clips_per_intent.max(1))
    }
}

/// Net spread in one direction at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadSnapshot {
    pub buy_venue: Venue,
    pub sell_venue: Venue,
    /// Ask on the buy venue.
    pub buy_price: Price,
    /// Bid on the sell venue.
    pub sell_price: Price,
    pub net_spread: Price,
    pub buffer: Price,
}

impl SpreadSnapshot {
    #[must_use]
    pub fn is_tradeable(&self) -> bool {
        self.net_spread > self.buffer
    }
}

/// Spread detector shared by the engine and the executor.
pub struct SpreadDetector {
    config: DetectorConfig,
    fees: FeeSchedule,
    states: RwLock<HashMap<Symbol, SpreadState>>,
    risk: Arc<RiskManager>,
    notifier: Arc<dyn Notifier>,
}

impl SpreadDetector {
    pub fn new(
        config: DetectorConfig,
        fees: FeeSchedule,
        risk: Arc<RiskManager>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            fees,
            states: RwLock::new(HashMap::new()),
            risk,
            notifier,
        }
    }

    /// Process a quote using the wall clock.
    pub fn on_quote(&self, quote: Quote) -> Option<TradeIntent> {
        self.on_quote_at(quote, Utc::now())
    }

    /// Process a quote as of `now`.
    pub fn on_quote_at(&self, quote: Quote, now: DateTime<Utc>) -> Option<TradeIntent> {
        if let Err(e) = quote.validate() {
            warn!(symbol = %quote.symbol(), venue = %quote.venue(), error = %e, "Dropping malformed quote");
            return None;
        }
        self.notifier
            .notify(Event::now(EventKind::TickLogged(quote.clone())));

        let symbol = quote.symbol().clone();
        let mut states = self.states.write();
        let state = states.entry(symbol.clone()).or_default();
        if !state.update(quote) {
            trace!(symbol = %symbol, "Out-of-order quote ignored");
            return None;
        }

        let best = self.best_direction(state, now)?;
        if !best.is_tradeable() {
            return None;
        }
        if state.trips_today() >= self.config.max_trips_per_symbol {
            debug!(
                symbol = %symbol,
                trips = state.trips_today(),
                last_trip_at = ?state.last_trip_at(),
                "Trip limit reached"
            );
            return None;
        }
        if self.risk.has_open_session(&symbol) {
            trace!(symbol = %symbol, "Session already open");
            return None;
        }

        let intent = match TradeIntent::with_venues(
            symbol.clone(),
            best.buy_venue,
            best.sell_venue,
            self.config.target_qty(),
            best.net_spread,
            now,
        ) {
            Ok(intent) => intent,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Could not build intent");
                return None;
            }
        };
        debug!(
            symbol = %symbol,
            buy = %best.buy_venue,
            sell = %best.sell_venue,
            net_spread = %best.net_spread,
            buffer = %best.buffer,
            trips = state.trips_today(),
            "Spread detected"
        );
        Some(intent)
    }

    /// Count an approved intent against the symbol's daily trip budget.
    ///
    /// Intents the risk manager rejects never reach here, so a blocked symbol
    /// keeps its budget for after the block lifts.
    pub fn record_trip(&self, symbol: &Symbol, at: DateTime<Utc>) {
        let mut states = self.states.write();
        let state = states.entry(symbol.clone()).or_default();
        state.record_trip(at);
        debug!(symbol = %symbol, trips = state.trips_today(), "Trip recorded");
    }

    /// Larger of the two directions; an exact tie keeps the first (buy KRX).
    fn best_direction(&self, state: &SpreadState, now: DateTime<Utc>) -> Option<SpreadSnapshot> {
        let mut best: Option<SpreadSnapshot> = None;
        for buy_venue in Venue::ALL {
            let Some(snapshot) = self.snapshot(state, buy_venue, now) else {
                continue;
            };
            if best
                .as_ref()
                .map_or(true, |b| snapshot.net_spread > b.net_spread)
            {
                best = Some(snapshot);
            }
        }
        best
    }

    fn snapshot(&self, state: &SpreadState, buy_venue: Venue, now: DateTime<Utc>) -> Option<SpreadSnapshot> {
        let sell_venue = buy_venue.other();
        let buy = self.fresh(state.quote(buy_venue)?, now)?;
        let sell = self.fresh(state.quote(sell_venue)?, now)?;
        Some(SpreadSnapshot {
            buy_venue,
            sell_venue,
            buy_price: buy.ask_price(),
            sell_price: sell.bid_price(),
            net_spread: net_spread(buy, sell, &self.fees),
            buffer: self.config.buffer(buy.ask_price()),
        })
    }

    fn fresh<'a>(&self, quote: &'a Quote, now: DateTime<Utc>) -> Option<&'a Quote> {
        (!quote.is_stale(now, self.config.max_quote_age)).then_some(quote)
    }

    /// Current spread for a fixed direction, if both quotes are fresh.
    #[must_use]
    pub fn evaluate(&self, symbol: &Symbol, buy_venue: Venue, now: DateTime<Utc>) -> Option<SpreadSnapshot> {
        let states = self.states.read();
        let state = states.get(symbol)?;
        self.snapshot(state, buy_venue, now)
    }

    /// Latest quote for a symbol on a venue, fresh or not.
    #[must_use]
    pub fn quote(&self, symbol: &Symbol, venue: Venue) -> Option<Quote> {
        self.states.read().get(symbol)?.quote(venue).cloned()
    }

    #[must_use]
    pub fn trips_today(&self, symbol: &Symbol) -> u32 {
        self.states
            .read()
            .get(symbol)
            .map_or(0, SpreadState::trips_today)
    }

    /// Session rollover.
    pub fn reset_trips(&self) {
        for state in self.states.write().values_mut() {
            state.reset_trips();
        }
        debug!("Trip counters reset");
    }

    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }
}
