//! Exact-decimal price computation.
//!
//! All money math uses [`rust_decimal::Decimal`]; floating point never
//! enters a pricing path.

use rust_decimal::Decimal;

use crate::catalog::{Product, ProductVariant};

/// Computes the unit price snapshot for an order line:
/// `base_price + variant.price_modifier` (modifier is zero without a variant).
pub fn unit_price(product: &Product, variant: Option<&ProductVariant>) -> Decimal {
    product.base_price + variant.map_or(Decimal::ZERO, |v| v.price_modifier)
}

/// Sums `quantity × unit_price` over `(quantity, unit_price)` pairs.
pub fn order_total(lines: impl IntoIterator<Item = (i32, Decimal)>) -> Decimal {
    lines
        .into_iter()
        .map(|(quantity, unit_price)| unit_price * Decimal::from(quantity))
        .sum()
}
