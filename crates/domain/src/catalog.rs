//! Read models for the external catalog, address book, and inventory ledger.

use common::{AddressId, ProductId, UserId, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog product as read by the core (owned by the catalog service).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub base_price: Decimal,
    pub is_active: bool,
}

/// A product variant; its price modifier is added to the base price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub price_modifier: Decimal,
}

/// A delivery address; the core only checks id and ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub line1: String,
    pub city: String,
    pub postal_code: String,
}

/// Per-product stock counter.
///
/// Invariant: `quantity >= 0`, enforced both here and by a database CHECK.
/// The counter is only mutated under a row lock inside an order-placement
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub product_id: ProductId,
    pub quantity: i32,
    pub low_stock_threshold: i32,
}

impl InventoryLevel {
    /// Returns true if stock has dropped to or below the alert threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }
}
