//! Identity extraction.
//!
//! Authentication itself lives in an upstream identity provider; by the
//! time a request reaches this service, the gateway has validated the
//! session and injected the caller's id and staff flag as headers. The
//! core treats both as opaque validated inputs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated user's UUID.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the staff flag (`"true"`/`"1"` when set).
pub const USER_STAFF_HEADER: &str = "x-user-staff";

/// The authenticated caller, as asserted by the upstream gateway.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub is_staff: bool,
}

impl AuthenticatedUser {
    /// Rejects non-staff callers on staff-scoped routes.
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "you are not authorized to perform this action".to_string(),
            ))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing user identity".to_string()))?;

        let uuid = Uuid::parse_str(raw)
            .map_err(|_| ApiError::Unauthorized("invalid user identity".to_string()))?;

        let is_staff = parts
            .headers
            .get(USER_STAFF_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "true" || v == "1");

        Ok(AuthenticatedUser {
            user_id: UserId::from_uuid(uuid),
            is_staff,
        })
    }
}
