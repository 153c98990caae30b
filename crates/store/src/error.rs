//! Store error types.

use common::ProductId;
use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Not enough stock (or no inventory row) for a reservation.
    #[error("insufficient stock for product {product_id}: available {available}")]
    InsufficientStock {
        product_id: ProductId,
        available: i32,
    },

    /// The inventory row is locked by a concurrent transaction (fail-fast
    /// locking: reported immediately instead of queuing on the lock).
    #[error("inventory for product {product_id} is locked by a concurrent transaction")]
    StockContended { product_id: ProductId },

    /// A payment with this externally-unique transaction reference exists.
    #[error("transaction reference {reference} already exists")]
    DuplicateReference { reference: String },

    /// A stored value could not be decoded into its domain type.
    #[error("invalid {column} value stored in row: {value}")]
    InvalidColumn {
        column: &'static str,
        value: String,
    },
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
