//! Checkout error types.

use common::{AddressId, OrderId, ProductId, VariantId};
use domain::OrderStatus;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while placing, deleting, or advancing an order.
///
/// Every failure before or during the placement transaction aborts the
/// whole unit of work; callers may safely retry.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request contained no items.
    #[error("order must contain at least one item")]
    EmptyOrder,

    /// A line carried a non-positive quantity.
    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity {
        product_id: ProductId,
        quantity: i32,
    },

    /// Delivery address absent or owned by a different user.
    #[error("delivery address {address_id} not found for this user")]
    AddressNotFound { address_id: AddressId },

    /// Product absent or inactive.
    #[error("product {product_id} not found")]
    ProductNotFound { product_id: ProductId },

    /// Variant absent or belonging to a different product.
    #[error("variant {variant_id} not found for product {product_id}")]
    VariantNotFound {
        variant_id: VariantId,
        product_id: ProductId,
    },

    /// Not enough stock; names the offending product and what is left.
    #[error("insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: i32,
        available: i32,
    },

    /// A concurrent placement holds the inventory lock (fail-fast policy).
    #[error("inventory for product {product_id} is contended, retry the placement")]
    StockContended { product_id: ProductId },

    /// Order absent or owned by a different user.
    #[error("order {order_id} not found")]
    OrderNotFound { order_id: OrderId },

    /// Delete requested on an order that has left `PENDING`.
    #[error("cannot delete order {order_id} in {status} status")]
    NotDeletable {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// Administrative status update violating the transition table.
    #[error("illegal order status transition {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    /// Persistence failure; the transaction was aborted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
