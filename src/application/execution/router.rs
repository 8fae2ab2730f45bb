//! Routes broker order reports to the session that owns the order.

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::domain::fill::Fill;
use crate::domain::id::{ClientOrderId, OrderId};

/// Per-order broker report delivered to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum LegEvent {
    /// Venue acknowledgement carrying the broker order id.
    Accepted {
        client_order_id: ClientOrderId,
        order_id: OrderId,
    },
    Fill(Fill),
    Rejected {
        client_order_id: ClientOrderId,
        reason: String,
    },
}

impl LegEvent {
    #[must_use]
    pub const fn client_order_id(&self) -> &ClientOrderId {
        match self {
            Self::Accepted {
                client_order_id, ..
            } => client_order_id,
            Self::Fill(fill) => &fill.client_order_id,
            Self::Rejected {
                client_order_id, ..
            } => client_order_id,
        }
    }
}

/// Map from client order id to the owning session's inbox.
///
/// Registration happens before the order is submitted, so a fill that races
/// ahead of the submit acknowledgement still finds its session.
#[derive(Debug, Default)]
pub struct FillRouter {
    routes: DashMap<ClientOrderId, mpsc::UnboundedSender<LegEvent>>,
}

impl FillRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ClientOrderId, inbox: mpsc::UnboundedSender<LegEvent>) {
        self.routes.insert(id, inbox);
    }

    pub fn unregister(&self, id: &ClientOrderId) {
        self.routes.remove(id);
    }

    /// Deliver an event. Gives it back when no live session owns the order.
    pub fn route(&self, event: LegEvent) -> Result<(), LegEvent> {
        let Some(inbox) = self.routes.get(event.client_order_id()) else {
            return Err(event);
        };
        inbox.send(event).map_err(|e| e.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
