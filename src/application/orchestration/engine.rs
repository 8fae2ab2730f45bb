//! Engine loop: quotes in, sessions out.
//!
//! Consumes quotes and session-clock signals from the feed and broker events
//! from the broker session. Quotes go through the detector and the risk
//! manager; approved intents become execution sessions running as their own
//! tasks. Broker fills are routed to the owning session.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::application::detector::SpreadDetector;
use crate::application::execution::{FillRouter, LegEvent, OrderExecutor};
use crate::application::risk::RiskManager;
use crate::application::throttle::{RetryPolicy, ThrottleHandle};
use crate::domain::money::Price;
use crate::domain::quote::Quote;
use crate::domain::session::SessionReport;
use crate::domain::symbol::SymbolInfo;
use crate::domain::venue::Venue;
use crate::port::inbound::risk::ApprovalResult;
use crate::port::inbound::session::SessionSignal;
use crate::port::outbound::broker::BrokerEvent;
use crate::port::outbound::notifier::{Event, EventKind, Notifier};

/// Everything the engine reacts to.
#[derive(Debug, Clone)]
pub enum EngineInput {
    Quote(Quote),
    Session(SessionSignal),
    Broker(BrokerEvent),
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct EngineSummary {
    pub quotes: u64,
    pub intents: u64,
    pub rejected_intents: u64,
    pub reports: Vec<SessionReport>,
    pub cumulative_pl: Price,
    pub kill_switch: Option<String>,
}

impl EngineSummary {
    #[must_use]
    pub fn filled_qty(&self) -> Decimal {
        self.reports.iter().map(|r| r.filled_qty).sum()
    }
}

/// Collaborators the engine is built from.
pub struct EngineParts {
    pub detector: Arc<SpreadDetector>,
    pub risk: Arc<RiskManager>,
    pub executor: OrderExecutor,
    pub router: Arc<FillRouter>,
    pub throttle: ThrottleHandle,
    pub notifier: Arc<dyn Notifier>,
    pub closing: watch::Sender<bool>,
    pub retry: RetryPolicy,
    pub symbols: Vec<SymbolInfo>,
}

pub struct Engine {
    detector: Arc<SpreadDetector>,
    risk: Arc<RiskManager>,
    executor: OrderExecutor,
    router: Arc<FillRouter>,
    throttle: ThrottleHandle,
    notifier: Arc<dyn Notifier>,
    closing: watch::Sender<bool>,
    retry: RetryPolicy,
    symbols: Vec<SymbolInfo>,
    sessions: JoinSet<SessionReport>,
    summary: EngineSummary,
}

impl Engine {
    #[must_use]
    pub fn new(parts: EngineParts) -> Self {
        Self {
            detector: parts.detector,
            risk: parts.risk,
            executor: parts.executor,
            router: parts.router,
            throttle: parts.throttle,
            notifier: parts.notifier,
            closing: parts.closing,
            retry: parts.retry,
            symbols: parts.symbols,
            sessions: JoinSet::new(),
            summary: EngineSummary::default(),
        }
    }

    /// Subscribe every configured symbol on both venues.
    ///
    /// Transient failures are retried with backoff; a subscription that still
    /// fails is reported and skipped. Returns the number of failures.
    pub async fn subscribe_all(&self) -> usize {
        let mut failures = 0;
        for info in &self.symbols {
            for venue in Venue::ALL {
                let throttle = self.throttle.clone();
                let symbol = info.symbol.clone();
                let result = self
                    .retry
                    .run("subscribe", || throttle.subscribe(symbol.clone(), venue))
                    .await;
                self.risk.record_broker_result(&result);

                match result {
                    Ok(()) => {
                        debug!(symbol = %info.symbol, code = info.code_for(venue), venue = %venue, "Subscribed");
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(symbol = %info.symbol, venue = %venue, error = %e, "Subscription failed");
                        self.notifier.notify(Event::now(EventKind::RateLimitWarning {
                            detail: format!("subscribe {} on {venue} failed: {e}", info.symbol),
                            queued: self.throttle.queued(),
                        }));
                    }
                }
            }
        }
        info!(symbols = self.symbols.len(), failures, "Subscriptions done");
        failures
    }

    /// React to one input. Never blocks.
    pub fn handle(&mut self, input: EngineInput) {
        match input {
            EngineInput::Quote(quote) => self.on_quote(quote),
            EngineInput::Session(signal) => self.on_session_signal(signal),
            EngineInput::Broker(event) => self.on_broker_event(event),
        }
    }

    fn on_quote(&mut self, quote: Quote) {
        self.summary.quotes += 1;
        let Some(intent) = self.detector.on_quote(quote) else {
            return;
        };
        self.summary.intents += 1;

        match self.risk.approve(&intent) {
            ApprovalResult::Approved(approved) => {
                self.detector
                    .record_trip(approved.intent.symbol(), approved.intent.created_at());
                let executor = self.executor.clone();
                self.sessions.spawn(executor.run_session(approved));
            }
            ApprovalResult::Rejected(_) => {
                self.summary.rejected_intents += 1;
            }
        }
    }

    fn on_session_signal(&mut self, signal: SessionSignal) {
        info!(signal = ?signal, "Session signal");
        match signal {
            SessionSignal::Open => {
                self.closing.send_replace(false);
                self.detector.reset_trips();
                self.risk.on_session_open();
            }
            SessionSignal::Closing | SessionSignal::Closed => {
                self.risk.on_session_closing();
                self.closing.send_replace(true);
            }
        }
    }

    fn on_broker_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::OrderAccepted {
                client_order_id,
                order_id,
            } => {
                let event = LegEvent::Accepted {
                    client_order_id,
                    order_id,
                };
                if let Err(event) = self.router.route(event) {
                    warn!(client_order_id = %event.client_order_id(), "Acknowledgement for closed session");
                }
            }
            BrokerEvent::Fill(fill) => {
                if let Err(LegEvent::Fill(fill)) = self.router.route(LegEvent::Fill(fill)) {
                    warn!(client_order_id = %fill.client_order_id, symbol = %fill.symbol, "Fill for closed session");
                    self.risk.on_late_fill(&fill);
                }
            }
            BrokerEvent::OrderRejected {
                client_order_id,
                reason,
            } => {
                let event = LegEvent::Rejected {
                    client_order_id,
                    reason,
                };
                if let Err(event) = self.router.route(event) {
                    debug!(client_order_id = %event.client_order_id(), "Reject for closed session");
                }
            }
            BrokerEvent::Connected => info!("Broker connected"),
            BrokerEvent::Disconnected { reason } => {
                error!(reason = %reason, "Broker disconnected");
                self.risk.on_broker_disconnected(&reason);
            }
        }
    }

    fn on_session_joined(&mut self, joined: Result<SessionReport, JoinError>) {
        match joined {
            Ok(report) => self.summary.reports.push(report),
            Err(e) => {
                error!(error = %e, "Session task failed");
                self.risk
                    .engage_kill_switch(format!("session task failed: {e}"));
            }
        }
    }

    /// Sessions currently running.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Run until the feed ends and every open session has finished.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<EngineInput>,
        mut broker_events: mpsc::UnboundedReceiver<BrokerEvent>,
    ) -> EngineSummary {
        let started = Utc::now();
        let mut feed_open = true;

        loop {
            tokio::select! {
                input = inputs.recv(), if feed_open => match input {
                    Some(input) => self.handle(input),
                    None => {
                        info!(open_sessions = self.sessions.len(), "Feed ended");
                        feed_open = false;
                    }
                },
                Some(event) = broker_events.recv() => self.on_broker_event(event),
                Some(joined) = self.sessions.join_next() => self.on_session_joined(joined),
                else => break,
            }
            if !feed_open && self.sessions.is_empty() {
                break;
            }
        }

        // Fills still in flight when the last session closed.
        while let Ok(event) = broker_events.try_recv() {
            self.on_broker_event(event);
        }

        self.summary.cumulative_pl = self.risk.cumulative_pl();
        self.summary.kill_switch = self.risk.kill_switch_reason();
        info!(
            quotes = self.summary.quotes,
            intents = self.summary.intents,
            sessions = self.summary.reports.len(),
            filled = %self.summary.filled_qty(),
            pl = %self.summary.cumulative_pl,
            elapsed_ms = (Utc::now() - started).num_milliseconds(),
            "Engine stopped"
        );
        for (symbol, qty) in self.risk.non_flat_symbols() {
            error!(symbol = %symbol, net_position = %qty, "Non-flat at shutdown");
        }
        self.summary
    }
}
