//! Simulated broker for dry runs and replays.
//!
//! Every accepted order is acknowledged at once and fills in full after a
//! fixed latency: limit orders at their limit price, market orders at the
//! reference touch price. Canceling before the fill lands prevents it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::fill::Fill;
use crate::domain::id::{FillId, OrderId, Symbol};
use crate::domain::venue::Venue;
use crate::error::ExecutionError;
use crate::port::outbound::broker::{Broker, BrokerEvent, OrderKind, OrderRequest, ThrottleTicket};

/// Paper trading broker.
pub struct PaperBroker {
    latency: Duration,
    events: mpsc::UnboundedSender<BrokerEvent>,
    working: Arc<DashMap<OrderId, OrderRequest>>,
    next_id: AtomicU64,
}

impl PaperBroker {
    /// Create a broker that reports fills and session events on `events`.
    #[must_use]
    pub fn new(latency: Duration, events: mpsc::UnboundedSender<BrokerEvent>) -> Self {
        // Nobody may be listening yet; the session event is informational.
        let _ = events.send(BrokerEvent::Connected);
        Self {
            latency,
            events,
            working: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Orders accepted and neither filled nor canceled.
    #[must_use]
    pub fn working_orders(&self) -> usize {
        self.working.len()
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn subscribe(
        &self,
        _ticket: ThrottleTicket,
        symbol: &Symbol,
        venue: Venue,
    ) -> Result<(), ExecutionError> {
        debug!(symbol = %symbol, venue = %venue, "Paper subscription");
        Ok(())
    }

    async fn submit_order(
        &self,
        _ticket: ThrottleTicket,
        order: &OrderRequest,
    ) -> Result<OrderId, ExecutionError> {
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let order_id = OrderId::new(format!("PAPER-{seq}"));
        self.working.insert(order_id.clone(), order.clone());

        info!(
            order_id = %order_id,
            client_order_id = %order.client_order_id,
            symbol = %order.symbol,
            venue = %order.venue,
            side = %order.side,
            qty = %order.qty,
            "Paper order accepted"
        );
        let _ = self.events.send(BrokerEvent::OrderAccepted {
            client_order_id: order.client_order_id.clone(),
            order_id: order_id.clone(),
        });

        let working = Arc::clone(&self.working);
        let events = self.events.clone();
        let latency = self.latency;
        let id = order_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let Some((_, order)) = working.remove(&id) else {
                return;
            };
            let price = match order.kind {
                OrderKind::Limit { price } => price,
                OrderKind::Market => order.reference_price,
            };
            let fill = Fill {
                fill_id: FillId::new(format!("{id}-F")),
                client_order_id: order.client_order_id,
                symbol: order.symbol,
                venue: order.venue,
                side: order.side,
                qty: order.qty,
                price,
                timestamp: Utc::now(),
            };
            let _ = events.send(BrokerEvent::Fill(fill));
        });

        Ok(order_id)
    }

    async fn cancel_order(
        &self,
        _ticket: ThrottleTicket,
        order_id: &OrderId,
    ) -> Result<(), ExecutionError> {
        match self.working.remove(order_id) {
            Some(_) => Ok(()),
            None => Err(ExecutionError::OrderRejected(format!(
                "order {order_id} is not working"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "paper"
    }
}
