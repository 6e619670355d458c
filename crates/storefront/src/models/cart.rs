//! Cart domain types.

use serde::Serialize;

use stride_core::{CartId, CartItemId, GuestId, Price, UserId, VariantSizeId};

use super::catalog::product_path;

/// Who a cart belongs to. A cart has exactly one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    User(UserId),
    Guest(GuestId),
}

/// One row of the cart page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CartLine {
    pub item_id: CartItemId,
    pub variant_size_id: VariantSizeId,
    pub product_name: String,
    pub product_slug: String,
    pub sku: String,
    pub color: String,
    pub size: String,
    pub image_url: Option<String>,
    /// Sale price when set, otherwise list price.
    pub unit_price: Price,
    pub quantity: i32,
    pub in_stock: i32,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    #[must_use]
    pub fn href(&self) -> String {
        product_path(&self.product_slug, &self.sku)
    }

    /// The line asks for more than is left.
    #[must_use]
    pub const fn exceeds_stock(&self) -> bool {
        self.quantity > self.in_stock
    }
}

/// A cart with its lines, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub owner: CartOwner,
    pub lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn line(unit_cents: i64, quantity: i32, in_stock: i32) -> CartLine {
        CartLine {
            item_id: CartItemId::generate(),
            variant_size_id: VariantSizeId::generate(),
            product_name: "Air Runner".to_owned(),
            product_slug: "air-runner".to_owned(),
            sku: "ar-001-blk".to_owned(),
            color: "Black".to_owned(),
            size: "9".to_owned(),
            image_url: None,
            unit_price: Price::from_cents(unit_cents),
            quantity,
            in_stock,
        }
    }

    #[test]
    fn test_subtotal_and_count() {
        let cart = Cart {
            id: CartId::generate(),
            owner: CartOwner::User(UserId::generate()),
            lines: vec![line(9_000, 2, 5), line(2_550, 1, 5)],
        };
        assert_eq!(cart.subtotal(), Price::from_cents(20_550));
        assert_eq!(cart.item_count(), 3);
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_line_helpers() {
        let l = line(9_000, 3, 2);
        assert_eq!(l.line_total(), Price::from_cents(27_000));
        assert_eq!(l.href(), "/products/air-runner/ar-001-blk");
        assert!(l.exceeds_stock());
    }

    #[test]
    fn test_line_href_is_encoded() {
        let mut l = line(9_000, 1, 2);
        l.sku = "ar 001".to_owned();
        assert_eq!(l.href(), "/products/air-runner/ar%20001");
    }
}
