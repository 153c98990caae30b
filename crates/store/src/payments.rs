//! Payment repository.

use common::{OrderId, PaymentId};
use domain::{Payment, PaymentStatus};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};

use crate::error::{Result, StoreError};

fn row_to_payment(row: &PgRow) -> Result<Payment> {
    let status_raw: String = row.try_get("status")?;
    let status = PaymentStatus::parse(&status_raw).ok_or(StoreError::InvalidColumn {
        column: "status",
        value: status_raw,
    })?;

    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        amount: row.try_get("amount")?,
        status,
        method: row.try_get("method")?,
        transaction_ref: row.try_get("transaction_ref")?,
        gateway_response: row.try_get("gateway_response")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const PAYMENT_COLUMNS: &str = "id, order_id, amount, status, method, transaction_ref, \
                               gateway_response, created_at, updated_at";

/// Loads a payment by its external transaction reference with a row lock,
/// inside the caller's transaction.
///
/// The reconciler holds this lock across its check-then-transition so two
/// deliveries of the same gateway event serialize instead of both seeing
/// `PENDING`.
pub async fn payment_by_reference_for_update(
    conn: &mut PgConnection,
    reference: &str,
) -> Result<Option<Payment>> {
    let row = sqlx::query(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_ref = $1 FOR UPDATE"
    ))
    .bind(reference)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_payment).transpose()
}

/// Marks a payment `COMPLETED` and stores the raw gateway payload for audit.
pub async fn complete_payment(
    conn: &mut PgConnection,
    payment_id: PaymentId,
    gateway_response: &serde_json::Value,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE payments
        SET status = 'COMPLETED', gateway_response = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(payment_id.as_uuid())
    .bind(gateway_response)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Loads the payment paired with an order.
pub async fn payment_for_order(pool: &PgPool, order_id: OrderId) -> Result<Option<Payment>> {
    let row = sqlx::query(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
    ))
    .bind(order_id.as_uuid())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_payment).transpose()
}
