//! Post-commit fulfillment notification.
//!
//! Publication is best-effort and fire-and-forget: it runs after the
//! placement transaction has committed, and a failure never rolls the
//! order back. Downstream consumers must be idempotent.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::OrderId;
use thiserror::Error;

/// Error raised by a publisher; observed only in logs.
#[derive(Debug, Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

/// Notifies downstream fulfillment that an order exists.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Announces a newly committed order.
    async fn order_placed(&self, order_id: OrderId) -> Result<(), PublishError>;
}

/// Publisher that records placements in the log stream only.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

impl LogPublisher {
    /// Creates a new log-only publisher.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn order_placed(&self, order_id: OrderId) -> Result<(), PublishError> {
        tracing::info!(order_id = %order_id, "order placed, notifying fulfillment");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<OrderId>,
    fail_on_publish: bool,
}

/// In-memory publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<Mutex<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail on subsequent publish calls.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.lock().unwrap().fail_on_publish = fail;
    }

    /// Returns the order ids published so far.
    pub fn published(&self) -> Vec<OrderId> {
        self.state.lock().unwrap().published.clone()
    }
}

#[async_trait]
impl EventPublisher for InMemoryPublisher {
    async fn order_placed(&self, order_id: OrderId) -> Result<(), PublishError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_on_publish {
            return Err(PublishError("publisher unavailable".to_string()));
        }
        state.published.push(order_id);
        Ok(())
    }
}
