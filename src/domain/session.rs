//! Execution session: the state of one arbitrage cycle.
//!
//! A session walks a fixed state machine:
//!
//! ```text
//! PendingBuy ──► PendingSell ──► Evaluating ──► PendingBuy (next clip)
//!     │               │              ├────────► Flattening ──► Done
//!     │               │              └────────► Done
//!     │               └──(hedge leg failed, market order)──► Done
//!     └──(entry leg failed)──► Done / Flattening
//!
//! any non-terminal state ──► AbortedFlattening ──► Done
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::DomainError;
use super::id::{SessionId, Symbol};
use super::intent::TradeIntent;
use super::money::{Price, Volume};
use super::venue::{Side, Venue};

/// Execution state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Limit buy for the current clip is working on the cheap venue.
    PendingBuy,
    /// Limit sell for the current clip is working on the rich venue.
    PendingSell,
    /// Both legs of a clip filled; deciding whether to clip again.
    Evaluating,
    /// Closing unmatched quantity with a market order.
    Flattening,
    /// Cancelling everything and closing the net position after an error
    /// or a forced stop.
    AbortedFlattening,
    /// Terminal.
    Done,
}

impl SessionState {
    /// Whether `self -> next` is a legal move.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use SessionState::{AbortedFlattening, Done, Evaluating, Flattening, PendingBuy, PendingSell};

        match (self, next) {
            (Done, _) => false,
            (AbortedFlattening, Done) => true,
            (AbortedFlattening, _) => false,
            (_, AbortedFlattening) => true,
            (PendingBuy, PendingSell | Flattening | Done) => true,
            (PendingSell, Evaluating | Done) => true,
            (Evaluating, PendingBuy | Flattening | Done) => true,
            (Flattening, Done) => true,
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PendingBuy => "pending_buy",
            Self::PendingSell => "pending_sell",
            Self::Evaluating => "evaluating",
            Self::Flattening => "flattening",
            Self::AbortedFlattening => "aborted_flattening",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why a session was forced into `AbortedFlattening`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The process-wide kill switch engaged.
    KillSwitch,
    /// The market session is closing; everything must be flat.
    SessionClosing,
    /// The session outlived its configured deadline.
    Timeout,
    /// The broker returned an unexpected error while a leg was outstanding.
    BrokerError(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KillSwitch => f.write_str("kill switch engaged"),
            Self::SessionClosing => f.write_str("market session closing"),
            Self::Timeout => f.write_str("session timeout"),
            Self::BrokerError(reason) => write!(f, "broker error: {reason}"),
        }
    }
}

/// How a session terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every clip of the target quantity was paired.
    Completed,
    /// The spread closed before the target was reached.
    SpreadCollapsed,
    /// The entry (buy) leg did not fill; nothing or only a partial was held.
    EntryUnfilled,
    /// The hedge (sell) leg failed and the bought quantity was sold at market.
    HedgeFlattened,
    /// Forced stop.
    Aborted(AbortReason),
}

/// State of one arbitrage cycle, owned by the order executor.
#[derive(Debug, Clone)]
pub struct ExecutionSession {
    id: SessionId,
    symbol: Symbol,
    buy_venue: Venue,
    sell_venue: Venue,
    target_qty: Volume,
    remaining_qty: Volume,
    clip_size: Volume,
    filled_buy_qty: Volume,
    filled_sell_qty: Volume,
    buy_notional: Price,
    sell_notional: Price,
    paired_qty: Volume,
    state: SessionState,
    path: Vec<SessionState>,
    started_at: DateTime<Utc>,
}

impl ExecutionSession {
    /// Start a session for an approved intent.
    #[must_use]
    pub fn new(id: SessionId, intent: &TradeIntent, clip_size: Volume, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            symbol: intent.symbol().clone(),
            buy_venue: intent.buy_venue(),
            sell_venue: intent.sell_venue(),
            target_qty: intent.target_qty(),
            remaining_qty: intent.target_qty(),
            clip_size,
            filled_buy_qty: Decimal::ZERO,
            filled_sell_qty: Decimal::ZERO,
            buy_notional: Decimal::ZERO,
            sell_notional: Decimal::ZERO,
            paired_qty: Decimal::ZERO,
            state: SessionState::PendingBuy,
            path: vec![SessionState::PendingBuy],
            started_at,
        }
    }

    /// Move to `next`, enforcing the transition table.
    pub fn transition(&mut self, next: SessionState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.path.push(next);
        Ok(())
    }

    /// Record a fill against either side of the session.
    pub fn record_fill(&mut self, side: Side, qty: Volume, price: Price) {
        match side {
            Side::Buy => {
                self.filled_buy_qty += qty;
                self.buy_notional += qty * price;
            }
            Side::Sell => {
                self.filled_sell_qty += qty;
                self.sell_notional += qty * price;
            }
        }
    }

    /// Mark a clip as paired on both limit legs.
    pub fn complete_clip(&mut self, qty: Volume) {
        self.paired_qty += qty;
        self.remaining_qty = (self.remaining_qty - qty).max(Decimal::ZERO);
    }

    /// Size of the next clip.
    #[must_use]
    pub fn next_clip_qty(&self) -> Volume {
        self.clip_size.min(self.remaining_qty)
    }

    /// Bought minus sold; positive means long inventory.
    #[must_use]
    pub fn unmatched_qty(&self) -> Volume {
        self.filled_buy_qty - self.filled_sell_qty
    }

    /// Side and venue that close `unmatched_qty`: long inventory is sold on
    /// the sell venue, short inventory is bought back on the buy venue.
    #[must_use]
    pub fn flatten_route(&self) -> Option<(Side, Venue, Volume)> {
        let unmatched = self.unmatched_qty();
        if unmatched > Decimal::ZERO {
            Some((Side::Sell, self.sell_venue, unmatched))
        } else if unmatched < Decimal::ZERO {
            Some((Side::Buy, self.buy_venue, -unmatched))
        } else {
            None
        }
    }

    /// Side and venue that unwind a partially filled entry: the fragment goes
    /// back out on the venue it was bought on.
    #[must_use]
    pub fn entry_unwind_route(&self) -> Option<(Side, Venue, Volume)> {
        self.flatten_route()
            .map(|(side, _, qty)| (side, self.buy_venue, qty))
    }

    /// Build the final report.
    #[must_use]
    pub fn report(&self, outcome: SessionOutcome, finished_at: DateTime<Utc>) -> SessionReport {
        SessionReport {
            session_id: self.id.clone(),
            symbol: self.symbol.clone(),
            buy_venue: self.buy_venue,
            sell_venue: self.sell_venue,
            target_qty: self.target_qty,
            filled_qty: self.paired_qty,
            realized_spread: self.sell_notional - self.buy_notional,
            residual_qty: self.unmatched_qty(),
            duration: (finished_at - self.started_at).to_std().unwrap_or_default(),
            outcome,
            path: self.path.clone(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
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
    pub const fn remaining_qty(&self) -> Volume {
        self.remaining_qty
    }

    #[must_use]
    pub const fn filled_buy_qty(&self) -> Volume {
        self.filled_buy_qty
    }

    #[must_use]
    pub const fn filled_sell_qty(&self) -> Volume {
        self.filled_sell_qty
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Summary published when a session reaches `Done`.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub symbol: Symbol,
    pub buy_venue: Venue,
    pub sell_venue: Venue,
    pub target_qty: Volume,
    /// Quantity paired on both limit legs.
    pub filled_qty: Volume,
    /// Sell proceeds minus buy cost over every fill of the session, before fees.
    pub realized_spread: Price,
    /// Bought minus sold at termination; non-zero is a defect.
    pub residual_qty: Volume,
    pub duration: std::time::Duration,
    pub outcome: SessionOutcome,
    /// Every state visited, in order.
    pub path: Vec<SessionState>,
}

impl SessionReport {
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.residual_qty.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn session(target: Decimal) -> ExecutionSession {
        let intent =
            TradeIntent::try_new(Symbol::from("A"), Venue::Krx, target, dec!(30), Utc::now())
                .unwrap();
        ExecutionSession::new(SessionId::from("s"), &intent, dec!(1), Utc::now())
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        let mut s = session(dec!(2));
        s.transition(SessionState::PendingSell).unwrap();
        s.transition(SessionState::Evaluating).unwrap();
        s.transition(SessionState::PendingBuy).unwrap();
        s.transition(SessionState::PendingSell).unwrap();
        s.transition(SessionState::Evaluating).unwrap();
        s.transition(SessionState::Done).unwrap();
        assert!(s.state().is_terminal());
    }

    #[test]
    fn done_is_terminal() {
        let mut s = session(dec!(1));
        s.transition(SessionState::Done).unwrap();
        let err = s.transition(SessionState::AbortedFlattening).unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition { .. }));
    }

    #[test]
    fn cannot_skip_buy_leg() {
        let mut s = session(dec!(1));
        assert!(s.transition(SessionState::Evaluating).is_err());
    }

    #[test]
    fn any_live_state_can_abort() {
        for state in [
            SessionState::PendingBuy,
            SessionState::PendingSell,
            SessionState::Evaluating,
            SessionState::Flattening,
        ] {
            assert!(state.can_transition_to(SessionState::AbortedFlattening));
        }
        assert!(!SessionState::AbortedFlattening.can_transition_to(SessionState::PendingBuy));
    }

    #[test]
    fn flatten_route_follows_inventory_sign() {
        let mut s = session(dec!(1));
        assert_eq!(s.flatten_route(), None);

        s.record_fill(Side::Buy, dec!(1), dec!(100));
        assert_eq!(s.flatten_route(), Some((Side::Sell, Venue::Nxt, dec!(1))));

        s.record_fill(Side::Sell, dec!(2), dec!(101));
        assert_eq!(s.flatten_route(), Some((Side::Buy, Venue::Krx, dec!(1))));
    }

    #[test]
    fn partial_entry_unwinds_on_entry_venue() {
        let mut s = session(dec!(2));
        assert_eq!(s.entry_unwind_route(), None);

        s.record_fill(Side::Buy, dec!(1), dec!(100));
        assert_eq!(s.entry_unwind_route(), Some((Side::Sell, Venue::Krx, dec!(1))));
    }

    #[test]
    fn report_counts_paired_quantity_and_gross_spread() {
        let mut s = session(dec!(4));
        s.record_fill(Side::Buy, dec!(1), dec!(10010));
        s.record_fill(Side::Sell, dec!(1), dec!(10050));
        s.complete_clip(dec!(1));

        let report = s.report(SessionOutcome::SpreadCollapsed, Utc::now());

        assert_eq!(report.filled_qty, dec!(1));
        assert_eq!(report.realized_spread, dec!(40));
        assert!(report.is_flat());
        assert_eq!(s.remaining_qty(), dec!(3));
    }
}
