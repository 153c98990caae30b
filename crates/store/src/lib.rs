//! PostgreSQL persistence for the ordering service.
//!
//! Write operations take `&mut PgConnection` so that the checkout
//! coordinator owns transaction boundaries; the inventory ledger's locked
//! decrement, the order/items/payment inserts, and the reconciler's
//! payment transition all commit or abort with the caller's transaction.

pub mod catalog;
pub mod db;
pub mod error;
pub mod inventory;
pub mod orders;
pub mod payments;

pub use db::{connect, run_migrations};
pub use error::{Result, StoreError};
pub use orders::{NewOrder, NewOrderItem, NewPayment};
