//! Micro-batch order executor.
//!
//! Each approved intent runs as its own task. The task buys one clip on the
//! cheap venue, hedges it on the rich venue, re-checks the spread and either
//! clips again or stops. Any failure that leaves inventory ends in a market
//! order that closes it; the session always hands a flat symbol back to the
//! risk manager.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::leg::{Leg, LegWait};
use super::router::{FillRouter, LegEvent};
use crate::application::detector::SpreadDetector;
use crate::application::risk::RiskManager;
use crate::application::throttle::{Lane, ThrottleHandle};
use crate::domain::id::{ClientOrderId, Symbol};
use crate::domain::money::{Price, Volume};
use crate::domain::session::{
    AbortReason, ExecutionSession, SessionOutcome, SessionReport, SessionState,
};
use crate::domain::venue::{Side, Venue};
use crate::error::{ExecutionError, FailureClass};
use crate::port::inbound::risk::ApprovedIntent;
use crate::port::outbound::broker::{OrderKind, OrderRequest};
use crate::port::outbound::notifier::{Event, EventKind, Notifier, OrderEvent};

/// Core executor settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub clip_size: Volume,
    /// How long a limit leg may rest before it is canceled.
    pub fill_timeout: Duration,
    /// How long a market (flatten) order may take to fill.
    pub market_fill_timeout: Duration,
    /// Hard deadline for a whole session.
    pub session_timeout: Duration,
    /// Quiet period after a cancel for fills already on the wire.
    pub settle: Duration,
    /// How long an abort waits for a timed-out submit to be acknowledged,
    /// rejected or filled before flattening.
    pub ack_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            clip_size: Decimal::ONE,
            fill_timeout: Duration::from_secs(3),
            market_fill_timeout: Duration::from_secs(5),
            session_timeout: Duration::from_secs(120),
            settle: Duration::from_millis(100),
            ack_timeout: Duration::from_secs(5),
        }
    }
}

struct Shared {
    config: ExecutorConfig,
    risk: Arc<RiskManager>,
    detector: Arc<SpreadDetector>,
    throttle: ThrottleHandle,
    router: Arc<FillRouter>,
    notifier: Arc<dyn Notifier>,
    closing: watch::Receiver<bool>,
}

/// Spawns and drives execution sessions.
#[derive(Clone)]
pub struct OrderExecutor {
    shared: Arc<Shared>,
}

impl OrderExecutor {
    /// `closing` flips to `true` when the market session is closing and every
    /// open session must flatten.
    pub fn new(
        config: ExecutorConfig,
        risk: Arc<RiskManager>,
        detector: Arc<SpreadDetector>,
        throttle: ThrottleHandle,
        router: Arc<FillRouter>,
        notifier: Arc<dyn Notifier>,
        closing: watch::Receiver<bool>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                risk,
                detector,
                throttle,
                router,
                notifier,
                closing,
            }),
        }
    }

    /// Run one session to completion.
    pub async fn run_session(self, approved: ApprovedIntent) -> SessionReport {
        SessionRun::new(self.shared, approved).run().await
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.shared.config
    }
}

/// Outcome of the clip loop when no abort occurred.
type Drive = Result<SessionOutcome, AbortReason>;

struct SessionRun {
    shared: Arc<Shared>,
    session: ExecutionSession,
    inbox_tx: mpsc::UnboundedSender<LegEvent>,
    inbox: mpsc::UnboundedReceiver<LegEvent>,
    legs: HashMap<ClientOrderId, Leg>,
    next_seq: u32,
    kill: watch::Receiver<bool>,
    closing: watch::Receiver<bool>,
    deadline: Instant,
}

impl SessionRun {
    fn new(shared: Arc<Shared>, approved: ApprovedIntent) -> Self {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let session = ExecutionSession::new(
            approved.session_id,
            &approved.intent,
            shared.config.clip_size,
            Utc::now(),
        );
        let kill = shared.risk.kill_switch_watch();
        let closing = shared.closing.clone();
        let deadline = Instant::now() + shared.config.session_timeout;
        Self {
            shared,
            session,
            inbox_tx,
            inbox,
            legs: HashMap::new(),
            next_seq: 0,
            kill,
            closing,
            deadline,
        }
    }

    async fn run(mut self) -> SessionReport {
        info!(
            session_id = %self.session.id(),
            symbol = %self.session.symbol(),
            buy = %self.session.buy_venue(),
            sell = %self.session.sell_venue(),
            target = %self.session.remaining_qty(),
            "Session started"
        );

        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(reason) => self.abort(reason).await,
        };
        self.finish(outcome)
    }

    async fn drive(&mut self) -> Drive {
        loop {
            if let Some(outcome) = self.pending_buy().await? {
                return Ok(outcome);
            }
            if let Some(outcome) = self.pending_sell().await? {
                return Ok(outcome);
            }
            if let Some(outcome) = self.evaluate().await? {
                return Ok(outcome);
            }
        }
    }

    /// Place and wait on the entry leg. `Some` ends the session.
    async fn pending_buy(&mut self) -> Result<Option<SessionOutcome>, AbortReason> {
        self.check_abort()?;

        let symbol = self.session.symbol().clone();
        let buy_venue = self.session.buy_venue();
        let snapshot = self
            .shared
            .detector
            .evaluate(&symbol, buy_venue, Utc::now());
        let Some(snapshot) = snapshot else {
            debug!(session_id = %self.session.id(), "No fresh quotes for entry leg");
            return self.end(self.nothing_to_do()).map(Some);
        };

        let qty = self.session.next_clip_qty();
        let cid = match self
            .place(
                Side::Buy,
                buy_venue,
                qty,
                OrderKind::Limit {
                    price: snapshot.buy_price,
                },
                snapshot.buy_price,
                Lane::Normal,
            )
            .await
        {
            Ok(cid) => cid,
            Err(e) if e.class() == FailureClass::Rejected => {
                return self.end(self.nothing_to_do()).map(Some);
            }
            Err(e) => return Err(AbortReason::BrokerError(e.to_string())),
        };

        match self.await_leg(&cid, self.shared.config.fill_timeout, true).await {
            LegWait::Filled => {
                self.transition(SessionState::PendingSell)?;
                Ok(None)
            }
            LegWait::Aborted(reason) => Err(reason),
            LegWait::TimedOut | LegWait::Rejected(_) => {
                self.cancel(&cid, Lane::Normal).await;
                self.settle().await;
                if self.session.unmatched_qty().is_zero() {
                    return self.end(self.nothing_to_do()).map(Some);
                }
                // Partial entry: close it rather than hedge a fragment.
                self.transition(SessionState::Flattening)?;
                let route = self.session.entry_unwind_route();
                self.flatten_via(route, Lane::Normal).await?;
                self.end(SessionOutcome::EntryUnfilled).map(Some)
            }
        }
    }

    /// Place and wait on the hedge leg. `Some` ends the session.
    async fn pending_sell(&mut self) -> Result<Option<SessionOutcome>, AbortReason> {
        self.check_abort()?;

        let symbol = self.session.symbol().clone();
        let sell_venue = self.session.sell_venue();
        let qty = self.session.unmatched_qty();
        let price = self.touch_price(&symbol, sell_venue, Side::Sell);

        let cid = match self
            .place(
                Side::Sell,
                sell_venue,
                qty,
                OrderKind::Limit { price },
                price,
                Lane::Normal,
            )
            .await
        {
            Ok(cid) => cid,
            Err(e) if e.class() == FailureClass::Rejected => {
                warn!(session_id = %self.session.id(), error = %e, "Hedge leg rejected");
                return self.unhedged().await.map(Some);
            }
            Err(e) => return Err(AbortReason::BrokerError(e.to_string())),
        };

        match self.await_leg(&cid, self.shared.config.fill_timeout, true).await {
            LegWait::Filled => {
                self.session.complete_clip(qty);
                self.transition(SessionState::Evaluating)?;
                Ok(None)
            }
            LegWait::Aborted(reason) => Err(reason),
            LegWait::TimedOut | LegWait::Rejected(_) => {
                warn!(session_id = %self.session.id(), "Hedge leg did not fill");
                self.cancel(&cid, Lane::Priority).await;
                self.settle().await;
                let paired = self.legs.get(&cid).map_or(Decimal::ZERO, |leg| leg.filled);
                self.session.complete_clip(paired);
                self.unhedged().await.map(Some)
            }
        }
    }

    /// Bought inventory without a hedge: sell it at market on the sell venue.
    async fn unhedged(&mut self) -> Drive {
        self.flatten(Lane::Priority).await?;
        self.end(SessionOutcome::HedgeFlattened)
    }

    /// Decide what follows a paired clip. `Some` ends the session.
    async fn evaluate(&mut self) -> Result<Option<SessionOutcome>, AbortReason> {
        if self.session.remaining_qty().is_zero() {
            return self.end(SessionOutcome::Completed).map(Some);
        }
        self.check_abort()?;

        let tradeable = self
            .shared
            .detector
            .evaluate(self.session.symbol(), self.session.buy_venue(), Utc::now())
            .is_some_and(|s| s.is_tradeable());

        if tradeable && self.session.unmatched_qty().is_zero() {
            debug!(
                session_id = %self.session.id(),
                remaining = %self.session.remaining_qty(),
                "Spread holds, clipping again"
            );
            self.transition(SessionState::PendingBuy)?;
            return Ok(None);
        }

        info!(session_id = %self.session.id(), "Spread collapsed");
        self.transition(SessionState::Flattening)?;
        self.flatten(Lane::Normal).await?;
        self.end(SessionOutcome::SpreadCollapsed).map(Some)
    }

    /// Forced stop: wait out submits whose outcome is unknown, cancel
    /// everything still working, let in-flight fills land, then close whatever
    /// net position is left.
    async fn abort(&mut self, reason: AbortReason) -> SessionOutcome {
        warn!(session_id = %self.session.id(), reason = %reason, state = %self.session.state(), "Aborting session");
        if let Err(e) = self.session.transition(SessionState::AbortedFlattening) {
            error!(session_id = %self.session.id(), error = %e, "Abort from terminal state");
            return SessionOutcome::Aborted(reason);
        }

        self.resolve_in_flight().await;
        let working: Vec<ClientOrderId> = self
            .legs
            .values()
            .filter(|leg| leg.working)
            .map(|leg| leg.client_order_id.clone())
            .collect();
        for cid in &working {
            self.cancel(cid, Lane::Priority).await;
        }
        self.settle().await;

        if let Err(e) = self.flatten(Lane::Priority).await {
            error!(session_id = %self.session.id(), reason = %e, "Abort flatten failed");
            // A flatten order that timed out may still fill.
            self.resolve_in_flight().await;
        }
        if let Err(e) = self.session.transition(SessionState::Done) {
            error!(session_id = %self.session.id(), error = %e, "Could not close aborted session");
        }
        SessionOutcome::Aborted(reason)
    }

    /// Release routes, publish the report and hand the symbol back to risk.
    fn finish(mut self, outcome: SessionOutcome) -> SessionReport {
        for cid in self.legs.keys() {
            self.shared.router.unregister(cid);
        }
        while let Ok(event) = self.inbox.try_recv() {
            self.apply(event);
        }

        let report = self.session.report(outcome, Utc::now());
        info!(
            session_id = %report.session_id,
            symbol = %report.symbol,
            filled = %report.filled_qty,
            spread = %report.realized_spread,
            residual = %report.residual_qty,
            duration_ms = report.duration.as_millis() as u64,
            outcome = ?report.outcome,
            "Session done"
        );
        self.shared
            .notifier
            .notify(Event::now(EventKind::SessionCompleted(report.clone())));
        self.shared
            .risk
            .on_session_closed(&report.symbol, &report.session_id);
        report
    }

    /// Market order closing the session's unmatched quantity, if any.
    async fn flatten(&mut self, lane: Lane) -> Result<(), AbortReason> {
        let route = self.session.flatten_route();
        self.flatten_via(route, lane).await
    }

    async fn flatten_via(
        &mut self,
        route: Option<(Side, Venue, Volume)>,
        lane: Lane,
    ) -> Result<(), AbortReason> {
        let Some((side, venue, qty)) = route else {
            return Ok(());
        };
        let symbol = self.session.symbol().clone();
        let reference = self.touch_price(&symbol, venue, side);
        info!(session_id = %self.session.id(), side = %side, venue = %venue, qty = %qty, "Flattening at market");

        let cid = self
            .place(side, venue, qty, OrderKind::Market, reference, lane)
            .await
            .map_err(|e| AbortReason::BrokerError(format!("flatten order failed: {e}")))?;

        match self
            .await_leg(&cid, self.shared.config.market_fill_timeout, false)
            .await
        {
            LegWait::Filled => Ok(()),
            LegWait::Rejected(reason) => Err(AbortReason::BrokerError(format!(
                "flatten order rejected: {reason}"
            ))),
            LegWait::TimedOut | LegWait::Aborted(_) => Err(AbortReason::BrokerError(
                "flatten order unfilled".to_string(),
            )),
        }
    }

    async fn place(
        &mut self,
        side: Side,
        venue: Venue,
        qty: Volume,
        kind: OrderKind,
        reference_price: Price,
        lane: Lane,
    ) -> Result<ClientOrderId, ExecutionError> {
        self.next_seq += 1;
        let cid = ClientOrderId::for_leg(self.session.id(), self.next_seq);
        let market = matches!(kind, OrderKind::Market);
        self.legs
            .insert(cid.clone(), Leg::new(cid.clone(), side, venue, qty, market));
        self.shared.router.register(cid.clone(), self.inbox_tx.clone());

        let order = OrderRequest {
            client_order_id: cid.clone(),
            symbol: self.session.symbol().clone(),
            venue,
            side,
            qty,
            kind,
            reference_price,
        };
        let result = self.shared.throttle.submit(lane, order).await;
        self.shared.risk.record_broker_result(&result);

        let order_id = match result {
            Ok(order_id) => order_id,
            Err(e) => {
                warn!(session_id = %self.session.id(), client_order_id = %cid, error = %e, "Order not accepted");
                if let Some(leg) = self.legs.get_mut(&cid) {
                    if matches!(e, ExecutionError::Timeout(_)) {
                        // The venue may still have taken it; wait for its
                        // acknowledgement or reject before flattening.
                        leg.working = !leg.is_filled() && leg.reject_reason.is_none();
                    } else {
                        leg.reject(e.to_string());
                    }
                }
                return Err(e);
            }
        };

        if let Some(leg) = self.legs.get_mut(&cid) {
            leg.order_id = Some(order_id.clone());
            // Fills may have been routed before the acknowledgement.
            leg.working = !leg.is_filled() && leg.reject_reason.is_none();
        }
        let price = match kind {
            OrderKind::Limit { price } => price,
            OrderKind::Market => reference_price,
        };
        self.shared
            .notifier
            .notify(Event::now(EventKind::OrderSubmitted(OrderEvent {
                session_id: self.session.id().clone(),
                client_order_id: cid.clone(),
                order_id,
                symbol: self.session.symbol().clone(),
                venue,
                side,
                qty,
                price,
                market,
            })));
        Ok(cid)
    }

    async fn cancel(&mut self, cid: &ClientOrderId, lane: Lane) {
        let Some(order_id) = self
            .legs
            .get(cid)
            .filter(|leg| leg.working)
            .and_then(|leg| leg.order_id.clone())
        else {
            return;
        };

        let result = self.shared.throttle.cancel(lane, order_id.clone()).await;
        self.shared.risk.record_broker_result(&result);
        match result {
            Ok(()) => {
                if let Some(leg) = self.legs.get_mut(cid) {
                    leg.working = false;
                }
                self.shared.notifier.notify(Event::now(EventKind::Cancel {
                    session_id: self.session.id().clone(),
                    order_id,
                }));
            }
            Err(e) => {
                warn!(session_id = %self.session.id(), order_id = %order_id, error = %e, "Cancel failed");
            }
        }
    }

    /// Wait until the leg fills, is rejected, times out or (if `abortable`)
    /// the session is told to stop.
    async fn await_leg(&mut self, cid: &ClientOrderId, wait: Duration, abortable: bool) -> LegWait {
        let until = Instant::now() + wait;
        loop {
            if let Some(leg) = self.legs.get(cid) {
                if leg.is_filled() {
                    return LegWait::Filled;
                }
                if let Some(reason) = &leg.reject_reason {
                    return LegWait::Rejected(reason.clone());
                }
            }
            if abortable {
                if let Err(reason) = self.check_abort() {
                    return LegWait::Aborted(reason);
                }
            }

            let step = tokio::select! {
                biased;
                () = raised(&mut self.kill), if abortable => Step::Abort(AbortReason::KillSwitch),
                () = raised(&mut self.closing), if abortable => Step::Abort(AbortReason::SessionClosing),
                () = sleep_until(self.deadline), if abortable => Step::Abort(AbortReason::Timeout),
                event = self.inbox.recv() => match event {
                    Some(event) => Step::Event(event),
                    None => Step::Expired,
                },
                () = sleep_until(until) => Step::Expired,
            };

            match step {
                Step::Event(event) => self.apply(event),
                Step::Abort(reason) => return LegWait::Aborted(reason),
                Step::Expired => return LegWait::TimedOut,
            }
        }
    }

    /// Process fills that arrive during a short quiet period.
    async fn settle(&mut self) {
        let until = Instant::now() + self.shared.config.settle;
        loop {
            tokio::select! {
                event = self.inbox.recv() => match event {
                    Some(event) => self.apply(event),
                    None => return,
                },
                () = sleep_until(until) => return,
            }
        }
    }

    /// Wait until every timed-out submit is acknowledged, rejected or filled,
    /// or `ack_timeout` passes.
    async fn resolve_in_flight(&mut self) {
        let until = Instant::now() + self.shared.config.ack_timeout;
        while self.legs.values().any(Leg::is_in_flight) {
            tokio::select! {
                event = self.inbox.recv() => match event {
                    Some(event) => self.apply(event),
                    None => return,
                },
                () = sleep_until(until) => {
                    let unresolved = self.legs.values().filter(|leg| leg.is_in_flight()).count();
                    error!(session_id = %self.session.id(), unresolved, "Submits still unconfirmed, flattening without them");
                    return;
                }
            }
        }
    }

    fn apply(&mut self, event: LegEvent) {
        match event {
            LegEvent::Accepted {
                client_order_id,
                order_id,
            } => {
                if let Some(leg) = self.legs.get_mut(&client_order_id) {
                    leg.accept(order_id);
                }
            }
            LegEvent::Fill(fill) => {
                if self.shared.risk.on_fill(&fill).is_none() {
                    return;
                }
                self.session.record_fill(fill.side, fill.qty, fill.price);
                if let Some(leg) = self.legs.get_mut(&fill.client_order_id) {
                    leg.add_fill(fill.qty);
                }
            }
            LegEvent::Rejected {
                client_order_id,
                reason,
            } => {
                if let Some(leg) = self.legs.get_mut(&client_order_id) {
                    leg.reject(reason);
                }
            }
        }
    }

    fn check_abort(&self) -> Result<(), AbortReason> {
        if *self.kill.borrow() {
            return Err(AbortReason::KillSwitch);
        }
        if *self.closing.borrow() {
            return Err(AbortReason::SessionClosing);
        }
        if Instant::now() >= self.deadline {
            return Err(AbortReason::Timeout);
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) -> Result<(), AbortReason> {
        self.session.transition(next).map_err(|e| {
            error!(session_id = %self.session.id(), error = %e, "Illegal session transition");
            AbortReason::BrokerError(e.to_string())
        })
    }

    fn end(&mut self, outcome: SessionOutcome) -> Drive {
        self.transition(SessionState::Done)?;
        Ok(outcome)
    }

    /// Outcome when an entry leg produced nothing to hedge.
    fn nothing_to_do(&self) -> SessionOutcome {
        if self.session.filled_sell_qty().is_zero() {
            SessionOutcome::EntryUnfilled
        } else {
            SessionOutcome::SpreadCollapsed
        }
    }

    /// Touch price a `side` order would trade against on `venue`.
    fn touch_price(&self, symbol: &Symbol, venue: Venue, side: Side) -> Price {
        self.shared
            .detector
            .quote(symbol, venue)
            .map_or(Decimal::ZERO, |q| match side {
                Side::Buy => q.ask_price(),
                Side::Sell => q.bid_price(),
            })
    }
}

enum Step {
    Event(LegEvent),
    Abort(AbortReason),
    Expired,
}

/// Resolves once the flag is `true`; never, if the sender is gone.
async fn raised(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|flag| *flag).await.is_err() {
        std::future::pending::<()>().await;
    }
}
