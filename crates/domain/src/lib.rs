//! Domain model for the ordering service.
//!
//! This crate defines the persisted entities (orders, items, payments,
//! inventory levels), the read models for external catalog/address
//! collaborators, the order and payment status state machines, and the
//! exact-decimal pricing helpers.

pub mod catalog;
pub mod order;
pub mod payment;
pub mod pricing;

pub use catalog::{Address, InventoryLevel, Product, ProductVariant};
pub use order::{Order, OrderItem, OrderItemDetail, OrderStatus, OrderWithItems};
pub use payment::{Payment, PaymentStatus};
pub use pricing::{order_total, unit_price};
