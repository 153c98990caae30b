//! Order model and status state machine.

use chrono::{DateTime, Utc};
use common::{AddressId, OrderId, OrderItemId, ProductId, UserId, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The status of an order in its fulfillment lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Confirmed ──► Preparing ──► InTransit ──► Delivered
///    │
///    └──► Cancelled
///
/// any non-refunded state ──► Refunded   (external refund flow)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order placed, awaiting payment confirmation.
    #[default]
    Pending,

    /// Payment confirmed by the gateway, fulfillment may begin.
    Confirmed,

    /// Order is being prepared.
    Preparing,

    /// Order has been handed to delivery.
    InTransit,

    /// Order delivered (terminal for the fulfillment flow).
    Delivered,

    /// Cancelled by the owning user while still pending (terminal).
    Cancelled,

    /// Refunded through the external refund flow (terminal).
    Refunded,
}

impl OrderStatus {
    /// Returns true if `next` is a legal transition from this status.
    ///
    /// `Refunded` is reachable from any other status because the refund
    /// flow lives outside this service and is authoritative.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Confirmed, OrderStatus::Preparing)
                | (OrderStatus::Preparing, OrderStatus::InTransit)
                | (OrderStatus::InTransit, OrderStatus::Delivered)
        ) || (next == OrderStatus::Refunded && self != OrderStatus::Refunded)
    }

    /// Returns true if the owning user may still delete the order.
    pub fn can_delete(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if no further fulfillment transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    /// Parses a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "PREPARING" => Some(OrderStatus::Preparing),
            "IN_TRANSIT" => Some(OrderStatus::InTransit),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "REFUNDED" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted order.
///
/// Invariant: `total_amount` equals the sum of `quantity × unit_price`
/// over the order's items; items are written once at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub delivery_address_id: AddressId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted order line with the price snapshot taken at order time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    /// Returns `quantity × unit_price` for this line.
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// An order line joined with catalog names for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemDetail {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItemDetail {
    /// Returns `quantity × unit_price` for this line.
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// An order together with its presentation-ready items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItemDetail>,
}
