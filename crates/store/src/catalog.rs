//! Read-only access to catalog and address collaborator tables.

use common::{AddressId, ProductId, UserId, VariantId};
use domain::{Address, Product, ProductVariant};
use sqlx::{PgConnection, Row, postgres::PgRow};

use crate::error::Result;

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        base_price: row.try_get("base_price")?,
        is_active: row.try_get("is_active")?,
    })
}

/// Looks up a product by id.
pub async fn product_by_id(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<Option<Product>> {
    let row = sqlx::query("SELECT id, name, base_price, is_active FROM products WHERE id = $1")
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(row_to_product).transpose()
}

/// Looks up a product variant by id. Callers verify the variant actually
/// belongs to the product they priced.
pub async fn variant_by_id(
    conn: &mut PgConnection,
    variant_id: VariantId,
) -> Result<Option<ProductVariant>> {
    let row = sqlx::query(
        "SELECT id, product_id, name, price_modifier FROM product_variants WHERE id = $1",
    )
    .bind(variant_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| {
        Ok(ProductVariant {
            id: VariantId::from_uuid(row.try_get("id")?),
            product_id: ProductId::from_uuid(row.try_get("product_id")?),
            name: row.try_get("name")?,
            price_modifier: row.try_get("price_modifier")?,
        })
    })
    .transpose()
}

/// Looks up an address by id, scoped to its owning user.
///
/// Returns `None` both when the address does not exist and when it belongs
/// to a different user, so callers cannot distinguish the two.
pub async fn address_owned_by(
    conn: &mut PgConnection,
    address_id: AddressId,
    user_id: UserId,
) -> Result<Option<Address>> {
    let row = sqlx::query(
        "SELECT id, user_id, line1, city, postal_code FROM addresses WHERE id = $1 AND user_id = $2",
    )
    .bind(address_id.as_uuid())
    .bind(user_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| {
        Ok(Address {
            id: AddressId::from_uuid(row.try_get("id")?),
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            line1: row.try_get("line1")?,
            city: row.try_get("city")?,
            postal_code: row.try_get("postal_code")?,
        })
    })
    .transpose()
}
