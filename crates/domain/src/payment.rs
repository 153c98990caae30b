//! Payment record and status state machine.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The status of a payment record.
///
/// Status transitions:
/// ```text
/// Pending ──► Completed ──► Refunded
///    │             │
///    │             └──► PartiallyRefunded ──► Refunded
///    └──► Failed
/// ```
///
/// Leaving `Pending` is a one-way fact; nothing ever transitions back
/// into `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Created alongside the order, awaiting gateway confirmation.
    #[default]
    Pending,

    /// Gateway reported a successful charge.
    Completed,

    /// Gateway reported a failed charge (terminal).
    Failed,

    /// Fully refunded (terminal).
    Refunded,

    /// Partially refunded; may still become fully refunded.
    PartiallyRefunded,
}

impl PaymentStatus {
    /// Returns true if `next` is a legal transition from this status.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Completed, PaymentStatus::Refunded)
                | (PaymentStatus::Completed, PaymentStatus::PartiallyRefunded)
                | (PaymentStatus::PartiallyRefunded, PaymentStatus::Refunded)
        )
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
        }
    }

    /// Parses a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            "PARTIALLY_REFUNDED" => Some(PaymentStatus::PartiallyRefunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment record, paired 1:1 with an order.
///
/// `amount` equals the order's `total_amount` at creation.
/// `gateway_response` is an opaque audit payload; it is stored verbatim
/// and never interpreted beyond event-type/reference extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub method: String,
    pub transaction_ref: String,
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
