//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, WebhookError};
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or invalid request input.
    BadRequest(String),
    /// Missing/invalid credentials or a failed webhook signature.
    Unauthorized(String),
    /// Authenticated but not allowed (staff-only routes).
    Forbidden(String),
    /// Resource absent or not visible to this user.
    NotFound(String),
    /// Stock or state conflict; the request may be retried or adjusted.
    Conflict(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match &err {
            CheckoutError::EmptyOrder | CheckoutError::InvalidQuantity { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            CheckoutError::AddressNotFound { .. }
            | CheckoutError::ProductNotFound { .. }
            | CheckoutError::VariantNotFound { .. }
            | CheckoutError::OrderNotFound { .. } => ApiError::NotFound(err.to_string()),
            CheckoutError::InsufficientStock { .. }
            | CheckoutError::StockContended { .. }
            | CheckoutError::NotDeletable { .. }
            | CheckoutError::IllegalTransition { .. } => ApiError::Conflict(err.to_string()),
            CheckoutError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match &err {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                ApiError::Unauthorized(err.to_string())
            }
            WebhookError::MalformedPayload(_) | WebhookError::MissingReference => {
                ApiError::BadRequest(err.to_string())
            }
            WebhookError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
