//! Order repository.
//!
//! Writes take `&mut PgConnection` so the caller owns the transaction
//! boundary; plain reads take the pool.

use common::{AddressId, OrderId, OrderItemId, PaymentId, ProductId, UserId, VariantId};
use domain::{Order, OrderItemDetail, OrderStatus, OrderWithItems};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};

use crate::error::{Result, StoreError};

/// A line to persist with a new order.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A new order with its items, written in one statement sequence inside
/// the caller's transaction.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub delivery_address_id: AddressId,
    pub total_amount: Decimal,
    pub items: Vec<NewOrderItem>,
}

/// The payment record created alongside a new order.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: PaymentId,
    pub amount: Decimal,
    pub method: String,
    pub transaction_ref: String,
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status_raw: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status_raw).ok_or(StoreError::InvalidColumn {
        column: "status",
        value: status_raw,
    })?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        status,
        total_amount: row.try_get("total_amount")?,
        delivery_address_id: AddressId::from_uuid(row.try_get("delivery_address_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const ORDER_COLUMNS: &str =
    "id, user_id, status, total_amount, delivery_address_id, created_at, updated_at";

/// Inserts an order, its items, and the paired payment record.
///
/// All rows are written inside the caller's transaction; the order, its
/// items, and the payment never partially exist. Statuses start at
/// `PENDING` for both the order and the payment.
pub async fn insert_order(
    conn: &mut PgConnection,
    order: &NewOrder,
    payment: &NewPayment,
) -> Result<Order> {
    let row = sqlx::query(
        r#"
        INSERT INTO orders (id, user_id, status, total_amount, delivery_address_id)
        VALUES ($1, $2, 'PENDING', $3, $4)
        RETURNING id, user_id, status, total_amount, delivery_address_id, created_at, updated_at
        "#,
    )
    .bind(order.id.as_uuid())
    .bind(order.user_id.as_uuid())
    .bind(order.total_amount)
    .bind(order.delivery_address_id.as_uuid())
    .fetch_one(&mut *conn)
    .await?;

    let created = row_to_order(&row)?;

    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, variant_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(OrderItemId::new().as_uuid())
        .bind(order.id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.variant_id.map(|v| v.as_uuid()))
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO payments (id, order_id, amount, status, method, transaction_ref)
        VALUES ($1, $2, $3, 'PENDING', $4, $5)
        "#,
    )
    .bind(payment.id.as_uuid())
    .bind(order.id.as_uuid())
    .bind(payment.amount)
    .bind(&payment.method)
    .bind(&payment.transaction_ref)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.constraint() == Some("payments_transaction_ref_key")
        {
            return StoreError::DuplicateReference {
                reference: payment.transaction_ref.clone(),
            };
        }
        StoreError::Database(e)
    })?;

    Ok(created)
}

async fn items_for_order(pool: &PgPool, order_id: OrderId) -> Result<Vec<OrderItemDetail>> {
    let rows = sqlx::query(
        r#"
        SELECT oi.product_id, oi.variant_id, oi.quantity, oi.unit_price,
               p.name AS product_name, v.name AS variant_name
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        LEFT JOIN product_variants v ON v.id = oi.variant_id
        WHERE oi.order_id = $1
        ORDER BY oi.product_id, oi.variant_id
        "#,
    )
    .bind(order_id.as_uuid())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(OrderItemDetail {
                product_id: ProductId::from_uuid(row.try_get("product_id")?),
                variant_id: row
                    .try_get::<Option<uuid::Uuid>, _>("variant_id")?
                    .map(VariantId::from_uuid),
                product_name: row.try_get("product_name")?,
                variant_name: row.try_get("variant_name")?,
                quantity: row.try_get("quantity")?,
                unit_price: row.try_get("unit_price")?,
            })
        })
        .collect()
}

async fn with_items(pool: &PgPool, order: Order) -> Result<OrderWithItems> {
    let items = items_for_order(pool, order.id).await?;
    Ok(OrderWithItems { order, items })
}

/// Loads an order by id regardless of owner (staff scope).
pub async fn order_by_id(pool: &PgPool, order_id: OrderId) -> Result<Option<OrderWithItems>> {
    let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(order_id.as_uuid())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(with_items(pool, row_to_order(&row)?).await?)),
        None => Ok(None),
    }
}

/// Loads an order by id, scoped to its owning user.
pub async fn order_for_user(
    pool: &PgPool,
    order_id: OrderId,
    user_id: UserId,
) -> Result<Option<OrderWithItems>> {
    let row = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
    ))
    .bind(order_id.as_uuid())
    .bind(user_id.as_uuid())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(with_items(pool, row_to_order(&row)?).await?)),
        None => Ok(None),
    }
}

/// Lists a user's orders, most recent first.
pub async fn orders_for_user(pool: &PgPool, user_id: UserId) -> Result<Vec<OrderWithItems>> {
    let rows = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id.as_uuid())
    .fetch_all(pool)
    .await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(with_items(pool, row_to_order(&row)?).await?);
    }
    Ok(orders)
}

/// Lists every order (staff scope), most recent first.
pub async fn all_orders(pool: &PgPool) -> Result<Vec<OrderWithItems>> {
    let rows = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(with_items(pool, row_to_order(&row)?).await?);
    }
    Ok(orders)
}

/// Loads an order with a row lock, scoped to its owning user.
///
/// Used before delete so the status check and the delete observe the same
/// row state even when a webhook confirmation races the request.
pub async fn order_for_user_for_update(
    conn: &mut PgConnection,
    order_id: OrderId,
    user_id: UserId,
) -> Result<Option<Order>> {
    let row = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE"
    ))
    .bind(order_id.as_uuid())
    .bind(user_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_order).transpose()
}

/// Loads an order with a row lock regardless of owner (staff scope).
pub async fn order_for_update(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<Order>> {
    let row = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(order_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_order).transpose()
}

/// Deletes an order; items and the payment cascade with it.
pub async fn delete_order(conn: &mut PgConnection, order_id: OrderId) -> Result<()> {
    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(order_id.as_uuid())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Sets an order's status and returns the refreshed `updated_at`.
/// Transition legality is the caller's concern.
pub async fn update_order_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: OrderStatus,
) -> Result<chrono::DateTime<chrono::Utc>> {
    let row = sqlx::query(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING updated_at",
    )
    .bind(order_id.as_uuid())
    .bind(status.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.try_get("updated_at")?)
}
