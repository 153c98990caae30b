//! Order placement and owner-scoped order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AddressId, OrderId, ProductId, VariantId};
use checkout::{EventPublisher, OrderLine, PlacementRequest};
use domain::{OrderStatus, OrderWithItems};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthenticatedUser;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub delivery_address_id: AddressId,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    pub items: Vec<OrderItemRequest>,
}

fn default_payment_method() -> String {
    "card".to_string()
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub delivery_address_id: AddressId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl From<OrderWithItems> for OrderResponse {
    fn from(placed: OrderWithItems) -> Self {
        OrderResponse {
            id: placed.order.id,
            status: placed.order.status,
            total_amount: placed.order.total_amount,
            delivery_address_id: placed.order.delivery_address_id,
            created_at: placed.order.created_at,
            updated_at: placed.order.updated_at,
            items: placed
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_name: item.product_name,
                    variant_name: item.variant_name,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// POST /orders — place a new order.
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.user_id))]
pub async fn create<P: EventPublisher + 'static>(
    State(state): State<Arc<AppState<P>>>,
    user: AuthenticatedUser,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let request = PlacementRequest {
        user_id: user.user_id,
        delivery_address_id: req.delivery_address_id,
        payment_method: req.payment_method,
        lines: req
            .items
            .into_iter()
            .map(|item| OrderLine {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
            })
            .collect(),
    };

    let placed = state.coordinator.place_order(request).await?;
    Ok((StatusCode::CREATED, Json(placed.into())))
}

/// GET /orders — list the current user's orders.
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn list<P: EventPublisher + 'static>(
    State(state): State<Arc<AppState<P>>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = store::orders::orders_for_user(&state.pool, user.user_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/:id — fetch one of the current user's orders.
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn get<P: EventPublisher + 'static>(
    State(state): State<Arc<AppState<P>>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::from_uuid(id);
    let order = store::orders::order_for_user(&state.pool, order_id, user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {order_id} not found")))?;

    Ok(Json(order.into()))
}

/// DELETE /orders/:id — delete one of the current user's pending orders.
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn remove<P: EventPublisher + 'static>(
    State(state): State<Arc<AppState<P>>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .coordinator
        .delete_order(OrderId::from_uuid(id), user.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
