//! Scripted [`Broker`] for execution and throttling tests.
//!
//! Every submitted order consumes the next script from its queue (limit or
//! market); when a queue is exhausted the order fills in full. Accepted
//! orders are acknowledged on the event channel at once; fills follow after
//! `fill_delay`, so tests run with paused time see them in a deterministic
//! order. Every call is recorded with the tokio instant it reached the
//! broker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::domain::fill::Fill;
use crate::domain::id::{FillId, OrderId, Symbol};
use crate::domain::money::{Price, Volume};
use crate::domain::venue::Venue;
use crate::error::ExecutionError;
use crate::port::outbound::broker::{Broker, BrokerEvent, OrderKind, OrderRequest, ThrottleTicket};

/// What happens to one submitted order.
#[derive(Debug, Clone)]
pub enum OrderScript {
    /// Accept, then fill in full at the limit (or reference) price.
    Fill,
    /// Accept, then fill in full at the given price.
    FillAt(Price),
    /// Accept, then fill this much and leave the rest working.
    Partial(Volume),
    /// Accept and never fill.
    NoFill,
    /// Refuse synchronously.
    Reject(String),
    /// Accept, then report a venue reject on the event channel.
    LateReject(String),
    /// Fail the call with this error.
    Error(ExecutionError),
    /// Take the order, but hold the call for this long. The acknowledgement
    /// and a full fill are pushed when the stall ends, even if the caller
    /// has given up on the call by then.
    StalledAck(Duration),
}

/// One call as seen by the broker.
#[derive(Debug, Clone)]
pub struct BrokerCall {
    /// When the call reached the broker.
    pub at: Instant,
    /// When the throttler admitted it.
    pub admitted_at: Instant,
    pub kind: CallKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallKind {
    Subscribe { symbol: Symbol, venue: Venue },
    Submit(OrderRequest),
    Cancel(OrderId),
}

/// Broker double driven by per-order scripts.
pub struct ScriptedBroker {
    events: mpsc::UnboundedSender<BrokerEvent>,
    fill_delay: Duration,
    call_latency: Duration,
    limit_scripts: Mutex<VecDeque<OrderScript>>,
    market_scripts: Mutex<VecDeque<OrderScript>>,
    subscribe_results: Mutex<VecDeque<Result<(), ExecutionError>>>,
    cancel_error: Mutex<Option<ExecutionError>>,
    working: Arc<DashMap<OrderId, OrderRequest>>,
    calls: Mutex<Vec<BrokerCall>>,
    next_id: AtomicU64,
}

impl ScriptedBroker {
    /// Create a broker and the receiving end of its event channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let broker = Self {
            events,
            fill_delay: Duration::from_millis(10),
            call_latency: Duration::ZERO,
            limit_scripts: Mutex::new(VecDeque::new()),
            market_scripts: Mutex::new(VecDeque::new()),
            subscribe_results: Mutex::new(VecDeque::new()),
            cancel_error: Mutex::new(None),
            working: Arc::new(DashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        };
        (broker, rx)
    }

    #[must_use]
    pub fn with_fill_delay(mut self, delay: Duration) -> Self {
        self.fill_delay = delay;
        self
    }

    /// Time each call takes before returning.
    #[must_use]
    pub fn with_call_latency(mut self, latency: Duration) -> Self {
        self.call_latency = latency;
        self
    }

    /// Scripts for limit orders, consumed in submission order.
    #[must_use]
    pub fn with_limit_scripts(self, scripts: Vec<OrderScript>) -> Self {
        *self.limit_scripts.lock() = scripts.into();
        self
    }

    /// Scripts for market orders, consumed in submission order.
    #[must_use]
    pub fn with_market_scripts(self, scripts: Vec<OrderScript>) -> Self {
        *self.market_scripts.lock() = scripts.into();
        self
    }

    /// Results for subscribe calls; `Ok` once exhausted.
    #[must_use]
    pub fn with_subscribe_results(self, results: Vec<Result<(), ExecutionError>>) -> Self {
        *self.subscribe_results.lock() = results.into();
        self
    }

    /// Make every cancel fail with `error`.
    pub fn fail_cancels(&self, error: ExecutionError) {
        *self.cancel_error.lock() = Some(error);
    }

    /// Push an arbitrary event, e.g. a replayed fill or a disconnect.
    pub fn push(&self, event: BrokerEvent) {
        let _ = self.events.send(event);
    }

    /// Sender for the event channel.
    #[must_use]
    pub fn event_sender(&self) -> mpsc::UnboundedSender<BrokerEvent> {
        self.events.clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.lock().clone()
    }

    /// Every submitted order, accepted or not.
    #[must_use]
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match &call.kind {
                CallKind::Submit(order) => Some(order.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn market_orders(&self) -> Vec<OrderRequest> {
        self.orders().into_iter().filter(OrderRequest::is_market).collect()
    }

    #[must_use]
    pub fn cancels(&self) -> Vec<OrderId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match &call.kind {
                CallKind::Cancel(order_id) => Some(order_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Orders accepted and neither fully filled nor canceled.
    #[must_use]
    pub fn working_orders(&self) -> usize {
        self.working.len()
    }

    fn record(&self, ticket: &ThrottleTicket, kind: CallKind) {
        self.calls.lock().push(BrokerCall {
            at: Instant::now(),
            admitted_at: ticket.issued_at(),
            kind,
        });
    }

    fn next_script(&self, order: &OrderRequest) -> OrderScript {
        let queue = if order.is_market() {
            &self.market_scripts
        } else {
            &self.limit_scripts
        };
        queue.lock().pop_front().unwrap_or(OrderScript::Fill)
    }

    fn schedule_fill(&self, order_id: OrderId, qty: Volume, price: Price, complete: bool) {
        let working = Arc::clone(&self.working);
        let events = self.events.clone();
        let delay = self.fill_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let order = if complete {
                working.remove(&order_id).map(|(_, order)| order)
            } else {
                working.get(&order_id).map(|entry| entry.value().clone())
            };
            let Some(order) = order else {
                return;
            };
            let _ = events.send(fill_event(&order_id, order, qty, price));
        });
    }

    /// Register an accepted order and return its id.
    fn accept(&self, order: &OrderRequest) -> OrderId {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let order_id = OrderId::new(format!("SCRIPT-{seq}"));
        self.working.insert(order_id.clone(), order.clone());
        order_id
    }

    async fn latency(&self) {
        if !self.call_latency.is_zero() {
            tokio::time::sleep(self.call_latency).await;
        }
    }
}

fn fill_event(order_id: &OrderId, order: OrderRequest, qty: Volume, price: Price) -> BrokerEvent {
    BrokerEvent::Fill(Fill {
        fill_id: FillId::new(format!("{order_id}-F")),
        client_order_id: order.client_order_id,
        symbol: order.symbol,
        venue: order.venue,
        side: order.side,
        qty,
        price,
        timestamp: Utc::now(),
    })
}

#[async_trait]
impl Broker for ScriptedBroker {
    async fn subscribe(
        &self,
        ticket: ThrottleTicket,
        symbol: &Symbol,
        venue: Venue,
    ) -> Result<(), ExecutionError> {
        self.record(
            &ticket,
            CallKind::Subscribe {
                symbol: symbol.clone(),
                venue,
            },
        );
        self.latency().await;
        let result = self.subscribe_results.lock().pop_front();
        result.unwrap_or(Ok(()))
    }

    async fn submit_order(
        &self,
        ticket: ThrottleTicket,
        order: &OrderRequest,
    ) -> Result<OrderId, ExecutionError> {
        self.record(&ticket, CallKind::Submit(order.clone()));
        let script = self.next_script(order);
        let price = match order.kind {
            OrderKind::Limit { price } => price,
            OrderKind::Market => order.reference_price,
        };

        if let OrderScript::StalledAck(stall) = script {
            let order_id = self.accept(order);
            let working = Arc::clone(&self.working);
            let events = self.events.clone();
            let ack = BrokerEvent::OrderAccepted {
                client_order_id: order.client_order_id.clone(),
                order_id: order_id.clone(),
            };
            let id = order_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(stall).await;
                let _ = events.send(ack);
                if let Some((_, order)) = working.remove(&id) {
                    let qty = order.qty;
                    let _ = events.send(fill_event(&id, order, qty, price));
                }
            });
            tokio::time::sleep(stall).await;
            return Ok(order_id);
        }

        self.latency().await;
        match script {
            OrderScript::Reject(reason) => return Err(ExecutionError::OrderRejected(reason)),
            OrderScript::Error(e) => return Err(e),
            _ => {}
        }

        let order_id = self.accept(order);
        self.push(BrokerEvent::OrderAccepted {
            client_order_id: order.client_order_id.clone(),
            order_id: order_id.clone(),
        });

        match script {
            OrderScript::Fill => self.schedule_fill(order_id.clone(), order.qty, price, true),
            OrderScript::FillAt(at) => self.schedule_fill(order_id.clone(), order.qty, at, true),
            OrderScript::Partial(qty) => self.schedule_fill(order_id.clone(), qty, price, false),
            OrderScript::LateReject(reason) => {
                let working = Arc::clone(&self.working);
                let events = self.events.clone();
                let delay = self.fill_delay;
                let id = order_id.clone();
                let client_order_id = order.client_order_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if working.remove(&id).is_some() {
                        let _ = events.send(BrokerEvent::OrderRejected {
                            client_order_id,
                            reason,
                        });
                    }
                });
            }
            OrderScript::NoFill
            | OrderScript::Reject(_)
            | OrderScript::Error(_)
            | OrderScript::StalledAck(_) => {}
        }
        Ok(order_id)
    }

    async fn cancel_order(
        &self,
        ticket: ThrottleTicket,
        order_id: &OrderId,
    ) -> Result<(), ExecutionError> {
        self.record(&ticket, CallKind::Cancel(order_id.clone()));
        self.latency().await;

        let cancel_error = self.cancel_error.lock().clone();
        if let Some(error) = cancel_error {
            return Err(error);
        }
        match self.working.remove(order_id) {
            Some(_) => Ok(()),
            None => Err(ExecutionError::OrderRejected(format!(
                "order {order_id} is not working"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
