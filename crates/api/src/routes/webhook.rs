//! Payment gateway webhook endpoint.
//!
//! The handler takes the raw body, not JSON: the HMAC signature is
//! computed over the exact request bytes.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use checkout::EventPublisher;

use crate::AppState;
use crate::error::ApiError;

/// Header carrying the hex-encoded HMAC-SHA512 signature of the body.
pub const SIGNATURE_HEADER: &str = "x-payment-signature";

/// POST /webhooks/payment — reconcile a gateway callback.
///
/// Every verified delivery is acknowledged identically, whatever it did;
/// the gateway only needs to know it can stop retrying.
#[tracing::instrument(skip_all)]
pub async fn receive<P: EventPublisher + 'static>(
    State(state): State<Arc<AppState<P>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    state.reconciler.process(&body, signature).await?;

    Ok(Json(serde_json::json!({ "status": "success" })))
}
