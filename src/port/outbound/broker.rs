//! Broker port for subscriptions and order routing.
//!
//! The broker session is single-threaded on the venue side, so every call
//! goes through the gateway throttler. Each method takes a [`ThrottleTicket`]
//! by value; tickets can only be minted by the throttler's rate window, which
//! makes an un-throttled broker call impossible to write.

use async_trait::async_trait;
use tokio::time::Instant;

use crate::domain::fill::Fill;
use crate::domain::id::{ClientOrderId, OrderId, Symbol};
use crate::domain::money::{Price, Volume};
use crate::domain::venue::{Side, Venue};
use crate::error::ExecutionError;

/// Admission token for exactly one broker call.
#[derive(Debug)]
pub struct ThrottleTicket {
    issued_at: Instant,
}

impl ThrottleTicket {
    pub(crate) const fn issue(issued_at: Instant) -> Self {
        Self { issued_at }
    }

    /// When the rate window granted this ticket.
    #[must_use]
    pub const fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    /// Rest at the given price or better.
    Limit { price: Price },
    /// Take whatever liquidity is available.
    Market,
}

/// Represents an order to be submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub client_order_id: ClientOrderId,
    pub symbol: Symbol,
    pub venue: Venue,
    pub side: Side,
    pub qty: Volume,
    pub kind: OrderKind,
    /// Touch price at submission time; informational for market orders.
    pub reference_price: Price,
}

impl OrderRequest {
    #[must_use]
    pub const fn is_market(&self) -> bool {
        matches!(self.kind, OrderKind::Market)
    }
}

/// A call routed through the throttler.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerRequest {
    /// Register for real-time quotes of a symbol on a venue.
    Subscribe { symbol: Symbol, venue: Venue },
    /// Submit a new order.
    Submit(OrderRequest),
    /// Cancel a working order.
    Cancel { order_id: OrderId },
}

impl BrokerRequest {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Submit(_) => "submit",
            Self::Cancel { .. } => "cancel",
        }
    }
}

/// Successful response to a [`BrokerRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerReply {
    Subscribed,
    Accepted(OrderId),
    Canceled,
}

/// Asynchronous notifications pushed by the broker session.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    /// The venue took an order. Sent for every accepted order, including one
    /// whose submit call timed out before the reply came back.
    OrderAccepted {
        client_order_id: ClientOrderId,
        order_id: OrderId,
    },
    /// An order (partially) filled.
    Fill(Fill),
    /// An accepted order was later rejected by the venue.
    OrderRejected {
        client_order_id: ClientOrderId,
        reason: String,
    },
    /// Session (re)established.
    Connected,
    /// Session lost.
    Disconnected { reason: String },
}

/// Single broker session shared by every symbol.
///
/// Implementations push fills and session events into the channel they were
/// built with; the methods here only cover request/acknowledge.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Subscribe to quotes.
    async fn subscribe(
        &self,
        ticket: ThrottleTicket,
        symbol: &Symbol,
        venue: Venue,
    ) -> Result<(), ExecutionError>;

    /// Submit an order; returns the broker's order id on acceptance.
    async fn submit_order(
        &self,
        ticket: ThrottleTicket,
        order: &OrderRequest,
    ) -> Result<OrderId, ExecutionError>;

    /// Cancel a working order.
    async fn cancel_order(
        &self,
        ticket: ThrottleTicket,
        order_id: &OrderId,
    ) -> Result<(), ExecutionError>;

    /// Broker name for logging/debugging.
    fn name(&self) -> &'static str;
}
