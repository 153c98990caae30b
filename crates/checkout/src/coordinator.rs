//! Order transaction coordinator.
//!
//! Placement runs address validation, pricing, inventory reservation, and
//! the order/items/payment inserts as one atomic unit. Deletion and the
//! administrative status update are smaller transactions with the same
//! all-or-nothing property.

use std::collections::BTreeMap;

use common::{AddressId, OrderId, PaymentId, ProductId, UserId, VariantId};
use domain::{Order, OrderItemDetail, OrderStatus, OrderWithItems, pricing};
use rust_decimal::Decimal;
use sqlx::PgPool;
use store::{NewOrder, NewOrderItem, NewPayment, StoreError, catalog, inventory, orders};
use uuid::Uuid;

use crate::error::{CheckoutError, Result};
use crate::publisher::EventPublisher;

/// One requested order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
}

/// A validated placement request.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub user_id: UserId,
    pub delivery_address_id: AddressId,
    pub payment_method: String,
    pub lines: Vec<OrderLine>,
}

/// Generates a fresh, globally unique external transaction reference.
pub fn new_transaction_ref() -> String {
    format!("TXN-{}", Uuid::new_v4().simple())
}

/// Orchestrates order placement, deletion, and status administration.
pub struct Coordinator<P: EventPublisher> {
    pool: PgPool,
    publisher: P,
}

impl<P: EventPublisher> Coordinator<P> {
    /// Creates a new coordinator on the given pool.
    pub fn new(pool: PgPool, publisher: P) -> Self {
        Self { pool, publisher }
    }

    /// Returns the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Places an order atomically.
    ///
    /// Inside one transaction: the delivery address is checked for
    /// ownership, every line is priced from the catalog, and stock is
    /// reserved under a row lock per product. Locks are acquired in
    /// ascending `(product, variant)` order so concurrent multi-product
    /// placements cannot deadlock. Any failure aborts the whole
    /// transaction; no inventory decrement, order, or payment survives.
    ///
    /// Duplicate `(product, variant)` lines are merged by summing their
    /// quantities before validation and locking.
    ///
    /// Fulfillment is notified after commit; a publisher failure is logged
    /// and never affects the already-committed order.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn place_order(&self, request: PlacementRequest) -> Result<OrderWithItems> {
        if request.lines.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }
        for line in &request.lines {
            if line.quantity <= 0 {
                return Err(CheckoutError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: line.quantity,
                });
            }
        }

        // BTreeMap keys iterate in ascending order, which doubles as the
        // deterministic lock-acquisition order across placements.
        let mut merged: BTreeMap<(ProductId, Option<VariantId>), i32> = BTreeMap::new();
        for line in &request.lines {
            *merged.entry((line.product_id, line.variant_id)).or_insert(0) += line.quantity;
        }

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let address =
            catalog::address_owned_by(&mut *tx, request.delivery_address_id, request.user_id)
                .await?
                .ok_or(CheckoutError::AddressNotFound {
                    address_id: request.delivery_address_id,
                })?;

        let mut total = Decimal::ZERO;
        let mut new_items = Vec::with_capacity(merged.len());
        let mut details = Vec::with_capacity(merged.len());

        for ((product_id, variant_id), quantity) in merged {
            let product = catalog::product_by_id(&mut *tx, product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or(CheckoutError::ProductNotFound { product_id })?;

            let variant = match variant_id {
                Some(variant_id) => Some(
                    catalog::variant_by_id(&mut *tx, variant_id)
                        .await?
                        .filter(|v| v.product_id == product_id)
                        .ok_or(CheckoutError::VariantNotFound {
                            variant_id,
                            product_id,
                        })?,
                ),
                None => None,
            };

            let unit_price = pricing::unit_price(&product, variant.as_ref());

            inventory::reserve_stock(&mut *tx, product_id, quantity)
                .await
                .map_err(|e| match e {
                    StoreError::InsufficientStock {
                        product_id,
                        available,
                    } => {
                        metrics::counter!("orders_stock_conflicts_total").increment(1);
                        CheckoutError::InsufficientStock {
                            product_id,
                            product_name: product.name.clone(),
                            requested: quantity,
                            available,
                        }
                    }
                    StoreError::StockContended { product_id } => {
                        metrics::counter!("orders_stock_conflicts_total").increment(1);
                        CheckoutError::StockContended { product_id }
                    }
                    other => CheckoutError::Store(other),
                })?;

            total += unit_price * Decimal::from(quantity);
            new_items.push(NewOrderItem {
                product_id,
                variant_id,
                quantity,
                unit_price,
            });
            details.push(OrderItemDetail {
                product_id,
                variant_id,
                product_name: product.name,
                variant_name: variant.map(|v| v.name),
                quantity,
                unit_price,
            });
        }

        let new_order = NewOrder {
            id: OrderId::new(),
            user_id: request.user_id,
            delivery_address_id: address.id,
            total_amount: total,
            items: new_items,
        };
        let new_payment = NewPayment {
            id: PaymentId::new(),
            amount: total,
            method: request.payment_method,
            transaction_ref: new_transaction_ref(),
        };

        let order = orders::insert_order(&mut *tx, &new_order, &new_payment).await?;
        tx.commit().await.map_err(StoreError::from)?;

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            total_amount = %order.total_amount,
            "order placed"
        );

        if let Err(e) = self.publisher.order_placed(order.id).await {
            tracing::warn!(order_id = %order.id, error = %e, "fulfillment notification failed");
        }

        Ok(OrderWithItems {
            order,
            items: details,
        })
    }

    /// Deletes an order owned by `user_id` while it is still `PENDING`.
    ///
    /// The order row is locked for the status check so a racing payment
    /// confirmation cannot slip between the check and the delete.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId, user_id: UserId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let order = orders::order_for_user_for_update(&mut *tx, order_id, user_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound { order_id })?;

        if !order.status.can_delete() {
            return Err(CheckoutError::NotDeletable {
                order_id,
                status: order.status,
            });
        }

        orders::delete_order(&mut *tx, order_id).await?;
        tx.commit().await.map_err(StoreError::from)?;

        tracing::info!(order_id = %order_id, "pending order deleted by owner");
        Ok(())
    }

    /// Administrative status update, validated against the transition table.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, next: OrderStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let order = orders::order_for_update(&mut *tx, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound { order_id })?;

        if !order.status.can_transition_to(next) {
            return Err(CheckoutError::IllegalTransition {
                from: order.status,
                to: next,
            });
        }

        let updated_at = orders::update_order_status(&mut *tx, order_id, next).await?;
        tx.commit().await.map_err(StoreError::from)?;

        tracing::info!(order_id = %order_id, from = %order.status, to = %next, "order status updated");
        Ok(Order {
            status: next,
            updated_at,
            ..order
        })
    }
}
