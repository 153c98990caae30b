//! Shared identifier types for the ordering service.

pub mod types;

pub use types::{AddressId, OrderId, OrderItemId, PaymentId, ProductId, UserId, VariantId};
