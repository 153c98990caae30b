//! Inventory ledger: locked stock reservation.

use common::ProductId;
use domain::InventoryLevel;
use sqlx::{PgConnection, PgPool, Row};

use crate::error::{Result, StoreError};

/// SQLSTATE reported by PostgreSQL when `FOR UPDATE NOWAIT` cannot take
/// the row lock immediately.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Reserves `quantity` units of a product inside the caller's transaction.
///
/// The inventory row is locked with `FOR UPDATE NOWAIT` before its quantity
/// is read, so concurrent reservations for the same product serialize at
/// the row lock and never observe stale stock. The decrement becomes
/// visible only when the surrounding transaction commits; an abort leaves
/// the counter untouched.
///
/// Fails with [`StoreError::InsufficientStock`] when the product has no
/// inventory row or fewer units than requested, and with
/// [`StoreError::StockContended`] when the row is already locked by a
/// concurrent transaction.
pub async fn reserve_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<InventoryLevel> {
    let row = sqlx::query(
        r#"
        SELECT quantity, low_stock_threshold
        FROM inventory
        WHERE product_id = $1
        FOR UPDATE NOWAIT
        "#,
    )
    .bind(product_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_lock_error(e, product_id))?;

    let Some(row) = row else {
        return Err(StoreError::InsufficientStock {
            product_id,
            available: 0,
        });
    };

    let available: i32 = row.try_get("quantity")?;
    let low_stock_threshold: i32 = row.try_get("low_stock_threshold")?;

    if quantity > available {
        return Err(StoreError::InsufficientStock {
            product_id,
            available,
        });
    }

    sqlx::query("UPDATE inventory SET quantity = quantity - $2 WHERE product_id = $1")
        .bind(product_id.as_uuid())
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

    let level = InventoryLevel {
        product_id,
        quantity: available - quantity,
        low_stock_threshold,
    };

    if level.is_low_stock() {
        tracing::warn!(
            product_id = %product_id,
            remaining = level.quantity,
            threshold = level.low_stock_threshold,
            "stock at or below threshold after reservation"
        );
    }

    Ok(level)
}

/// Reads the current stock level without locking.
pub async fn stock_level(pool: &PgPool, product_id: ProductId) -> Result<Option<InventoryLevel>> {
    let row = sqlx::query(
        "SELECT quantity, low_stock_threshold FROM inventory WHERE product_id = $1",
    )
    .bind(product_id.as_uuid())
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        Ok(InventoryLevel {
            product_id,
            quantity: row.try_get("quantity")?,
            low_stock_threshold: row.try_get("low_stock_threshold")?,
        })
    })
    .transpose()
}

fn map_lock_error(e: sqlx::Error, product_id: ProductId) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE)
    {
        return StoreError::StockContended { product_id };
    }
    StoreError::Database(e)
}
