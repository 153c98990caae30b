//! Webhook reconciler for payment-gateway callbacks.
//!
//! Callbacks are delivered at-least-once; the reconciler is an idempotent
//! consumer. The signature is verified over the exact raw request bytes
//! before anything is parsed or looked up.

use common::OrderId;
use domain::{OrderStatus, PaymentStatus};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;
use sqlx::PgPool;
use store::{StoreError, orders, payments};
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

/// The only gateway event type that drives state change.
pub const CHARGE_SUCCEEDED: &str = "charge.success";

/// Errors surfaced to the webhook endpoint.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No signature header was supplied.
    #[error("missing webhook signature")]
    MissingSignature,

    /// The signature did not match the request body.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// The verified payload was not valid JSON of the expected shape.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// A charge event arrived without a transaction reference.
    #[error("webhook payload missing transaction reference")]
    MissingReference,

    /// Persistence failure; the transition was aborted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a successfully acknowledged delivery did.
///
/// Everything here is acknowledged with success toward the gateway;
/// distinguishing the cases keeps repeated and irrelevant deliveries
/// observable without blocking gateway retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Payment completed and the order moved `PENDING -> CONFIRMED`.
    Confirmed { order_id: OrderId },

    /// The payment had already left `PENDING`; repeated delivery, no-op.
    AlreadyProcessed { reference: String },

    /// No payment matches the reference; acknowledged without mutation.
    UnknownReference { reference: String },

    /// An event type the reconciler does not act on.
    Ignored { event: String },
}

#[derive(Debug, Deserialize)]
struct GatewayEvent {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Computes the hex-encoded HMAC-SHA512 signature the gateway sends.
pub fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex HMAC-SHA512 signature over the raw request bytes.
///
/// Comparison is constant-time via [`Mac::verify_slice`].
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature: Option<&str>,
) -> Result<(), WebhookError> {
    let signature = signature.ok_or(WebhookError::MissingSignature)?;
    let sig_bytes = hex::decode(signature).map_err(|_| WebhookError::InvalidSignature)?;

    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(payload);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// Drives payment and order state forward from verified gateway callbacks.
#[derive(Clone)]
pub struct WebhookReconciler {
    pool: PgPool,
    secret: String,
}

impl WebhookReconciler {
    /// Creates a new reconciler with the shared gateway secret.
    pub fn new(pool: PgPool, secret: impl Into<String>) -> Self {
        Self {
            pool,
            secret: secret.into(),
        }
    }

    /// Processes one webhook delivery.
    ///
    /// An unverified payload is rejected before any parse or lookup. For a
    /// verified `charge.success` event the matching payment is read under
    /// a row lock; only a `PENDING` payment transitions, so redelivery of
    /// the same event is a no-op.
    #[tracing::instrument(skip_all)]
    pub async fn process(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookError> {
        verify_signature(&self.secret, payload, signature)?;

        let event: GatewayEvent = serde_json::from_slice(payload)?;
        if event.event != CHARGE_SUCCEEDED {
            tracing::debug!(event = %event.event, "ignoring gateway event type");
            return Ok(WebhookOutcome::Ignored { event: event.event });
        }

        let reference = event
            .data
            .get("reference")
            .and_then(|v| v.as_str())
            .ok_or(WebhookError::MissingReference)?
            .to_string();

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let Some(payment) = payments::payment_by_reference_for_update(&mut *tx, &reference).await?
        else {
            // Deliberately acknowledged toward the gateway; see warn + metric.
            metrics::counter!("webhook_unknown_reference_total").increment(1);
            tracing::warn!(reference = %reference, "webhook for unknown transaction reference");
            return Ok(WebhookOutcome::UnknownReference { reference });
        };

        if payment.status != PaymentStatus::Pending {
            metrics::counter!("webhook_duplicate_total").increment(1);
            tracing::debug!(reference = %reference, status = %payment.status, "payment already reconciled");
            return Ok(WebhookOutcome::AlreadyProcessed { reference });
        }

        payments::complete_payment(&mut *tx, payment.id, &event.data).await?;

        match orders::order_for_update(&mut *tx, payment.order_id).await? {
            Some(order) if order.status.can_transition_to(OrderStatus::Confirmed) => {
                orders::update_order_status(&mut *tx, order.id, OrderStatus::Confirmed).await?;
            }
            Some(order) => {
                tracing::warn!(
                    order_id = %order.id,
                    status = %order.status,
                    "payment completed but order had already left PENDING"
                );
            }
            None => {
                tracing::warn!(order_id = %payment.order_id, "payment has no matching order row");
            }
        }

        tx.commit().await.map_err(StoreError::from)?;

        metrics::counter!("webhook_confirmed_total").increment(1);
        tracing::info!(order_id = %payment.order_id, reference = %reference, "payment confirmed");
        Ok(WebhookOutcome::Confirmed {
            order_id: payment.order_id,
        })
    }
}
