//! Checkout layer: the order transaction coordinator, the post-commit
//! event publisher, and the payment-webhook reconciler.
//!
//! Placement is a single pessimistically-locked transaction; payment
//! confirmation arrives later through a signed webhook and is reconciled
//! idempotently. The two paths only meet at the persisted payment record.

pub mod coordinator;
pub mod error;
pub mod publisher;
pub mod reconciler;

pub use coordinator::{Coordinator, OrderLine, PlacementRequest, new_transaction_ref};
pub use error::CheckoutError;
pub use publisher::{EventPublisher, InMemoryPublisher, LogPublisher, PublishError};
pub use reconciler::{WebhookError, WebhookOutcome, WebhookReconciler, sign, verify_signature};
