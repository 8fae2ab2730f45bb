//! Risk approval result types.
//!
//! The approval logic itself lives in `application::risk::RiskManager`.

use crate::domain::id::SessionId;
use crate::domain::intent::TradeIntent;
use crate::error::RiskError;

/// An intent that now owns its symbol's session slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedIntent {
    pub session_id: SessionId,
    pub intent: TradeIntent,
}

/// Result of submitting a [`TradeIntent`] to the risk manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalResult {
    /// The intent may be executed; the session slot is held.
    Approved(ApprovedIntent),

    /// The intent is dropped.
    Rejected(RiskError),
}

impl ApprovalResult {
    /// Return `true` if the intent was approved.
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved(_))
    }

    /// Return the rejection error if the intent was rejected.
    #[must_use]
    pub const fn rejection_error(&self) -> Option<&RiskError> {
        match self {
            Self::Rejected(e) => Some(e),
            Self::Approved(_) => None,
        }
    }
}
