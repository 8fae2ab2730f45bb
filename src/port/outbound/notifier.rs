//! Notifier port: the event sink.
//!
//! This module defines the trait for publishing structured events about
//! quotes, orders, fills, and alerts for persistence or operator alerting.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::domain::fill::Fill;
use crate::domain::id::{ClientOrderId, OrderId, SessionId, Symbol};
use crate::domain::money::{Price, Volume};
use crate::domain::quote::Quote;
use crate::domain::session::SessionReport;
use crate::domain::venue::{Side, Venue};
use crate::error::RiskError;

/// How urgently an operator needs to see an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Event payloads.
#[derive(Debug, Clone)]
pub enum EventKind {
    /// A validated quote reached the detector.
    TickLogged(Quote),
    /// An order was accepted by the broker.
    OrderSubmitted(OrderEvent),
    /// A fill was applied to exposure.
    Fill(Fill),
    /// A working order was canceled.
    Cancel {
        session_id: SessionId,
        order_id: OrderId,
    },
    /// A symbol was left with inventory after a cycle that should end flat.
    ResidualAlert {
        symbol: Symbol,
        net_position: Volume,
        detail: String,
    },
    /// Broker traffic is being deferred or a call exhausted its retries.
    RateLimitWarning { detail: String, queued: usize },
    /// Trading halted process-wide.
    KillSwitchEngaged { reason: String },
    /// Operator cleared the kill switch.
    KillSwitchReset,
    /// A session reached `Done`.
    SessionCompleted(SessionReport),
    /// The risk manager dropped an intent.
    IntentRejected { symbol: Symbol, reason: String },
}

/// Order acknowledgement details.
#[derive(Debug, Clone)]
pub struct OrderEvent {
    pub session_id: SessionId,
    pub client_order_id: ClientOrderId,
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub venue: Venue,
    pub side: Side,
    pub qty: Volume,
    /// Limit price, or the reference touch price for market orders.
    pub price: Price,
    pub market: bool,
}

/// A timestamped event.
#[derive(Debug, Clone)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    /// Stamp an event with the current time.
    #[must_use]
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Create a rejection event from a risk error.
    #[must_use]
    pub fn intent_rejected(symbol: &Symbol, error: &RiskError) -> Self {
        Self::now(EventKind::IntentRejected {
            symbol: symbol.clone(),
            reason: error.to_string(),
        })
    }

    #[must_use]
    pub const fn severity(&self) -> Severity {
        match &self.kind {
            EventKind::TickLogged(_) | EventKind::IntentRejected { .. } => Severity::Debug,
            EventKind::OrderSubmitted(_)
            | EventKind::Fill(_)
            | EventKind::Cancel { .. }
            | EventKind::SessionCompleted(_)
            | EventKind::KillSwitchReset => Severity::Info,
            EventKind::RateLimitWarning { .. } => Severity::Warning,
            EventKind::ResidualAlert { .. } | EventKind::KillSwitchEngaged { .. } => {
                Severity::Critical
            }
        }
    }

    /// One-line human summary, used by text channels.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.kind {
            EventKind::TickLogged(q) => format!(
                "tick {} {} bid {} ask {}",
                q.symbol(),
                q.venue(),
                q.bid_price(),
                q.ask_price()
            ),
            EventKind::OrderSubmitted(o) => format!(
                "{} {} {} x{} @ {} on {} ({})",
                if o.market { "market" } else { "limit" },
                o.side,
                o.symbol,
                o.qty,
                o.price,
                o.venue,
                o.order_id
            ),
            EventKind::Fill(f) => format!(
                "fill {} {} x{} @ {} on {}",
                f.side, f.symbol, f.qty, f.price, f.venue
            ),
            EventKind::Cancel {
                session_id,
                order_id,
            } => format!("cancel {order_id} (session {session_id})"),
            EventKind::ResidualAlert {
                symbol,
                net_position,
                detail,
            } => format!("RESIDUAL POSITION {symbol}: {net_position} ({detail})"),
            EventKind::RateLimitWarning { detail, queued } => {
                format!("rate limit: {detail} ({queued} queued)")
            }
            EventKind::KillSwitchEngaged { reason } => format!("KILL SWITCH ENGAGED: {reason}"),
            EventKind::KillSwitchReset => "kill switch reset by operator".to_string(),
            EventKind::SessionCompleted(r) => format!(
                "session {} {} done: filled {} spread {} in {}ms ({:?})",
                r.session_id,
                r.symbol,
                r.filled_qty,
                r.realized_spread,
                r.duration.as_millis(),
                r.outcome
            ),
            EventKind::IntentRejected { symbol, reason } => {
                format!("intent rejected {symbol}: {reason}")
            }
        }
    }
}

/// Trait for event sinks.
///
/// Delivery is fire-and-forget and must never block the trading path.
///
/// # Implementation Notes
///
/// - Implementations must be thread-safe (`Send + Sync`)
/// - For slow operations (e.g., HTTP calls), spawn an async task
pub trait Notifier: Send + Sync {
    /// Handle an event.
    fn notify(&self, event: Event);
}

/// Registry of notifiers (composite pattern).
///
/// Broadcasts events to all registered notifiers.
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { notifiers: vec![] }
    }

    /// Register a notifier.
    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Notify all registered notifiers.
    pub fn notify_all(&self, event: Event) {
        for notifier in &self.notifiers {
            notifier.notify(event.clone());
        }
    }

    /// Number of registered notifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Check if registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Default for NotifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for NotifierRegistry {
    fn notify(&self, event: Event) {
        self.notify_all(event);
    }
}

/// A no-op notifier for testing or when notifications are disabled.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: Event) {}
}

/// A notifier that writes every event to the tracing log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: Event) {
        let summary = event.summary();
        match event.severity() {
            Severity::Debug => debug!(at = %event.timestamp, "{summary}"),
            Severity::Info => info!(at = %event.timestamp, "{summary}"),
            Severity::Warning => warn!(at = %event.timestamp, "{summary}"),
            Severity::Critical => error!(at = %event.timestamp, "{summary}"),
        }
    }
}
