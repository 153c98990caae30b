//! Staff-scoped order administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use checkout::EventPublisher;
use common::OrderId;
use domain::OrderStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::routes::orders::OrderResponse;

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
}

#[derive(Serialize)]
pub struct StatusUpdateResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

/// GET /admin/orders — list every order (staff only).
#[tracing::instrument(skip(state, user))]
pub async fn list_all<P: EventPublisher + 'static>(
    State(state): State<Arc<AppState<P>>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    user.require_staff()?;

    let orders = store::orders::all_orders(&state.pool).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /admin/orders/:id — fetch any order by id (staff only).
#[tracing::instrument(skip(state, user))]
pub async fn get_any<P: EventPublisher + 'static>(
    State(state): State<Arc<AppState<P>>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    user.require_staff()?;

    let order_id = OrderId::from_uuid(id);
    let order = store::orders::order_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {order_id} not found")))?;

    Ok(Json(order.into()))
}

/// PUT /admin/orders/:id/status — advance an order's status (staff only).
///
/// The transition is validated against the order status table; anything
/// the table forbids is rejected as a conflict.
#[tracing::instrument(skip(state, user, req))]
pub async fn update_status<P: EventPublisher + 'static>(
    State(state): State<Arc<AppState<P>>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    user.require_staff()?;

    let order = state
        .coordinator
        .update_status(OrderId::from_uuid(id), req.status)
        .await?;

    Ok(Json(StatusUpdateResponse {
        order_id: order.id,
        status: order.status,
        updated_at: order.updated_at,
    }))
}
