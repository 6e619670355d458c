//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stride_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, Price, VariantSizeId};

use super::catalog::product_path;

/// A purchased line. The price is locked in at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub variant_size_id: VariantSizeId,
    pub product_name: String,
    pub product_slug: String,
    pub sku: String,
    pub size: String,
    pub quantity: i32,
    pub price_at_purchase: Price,
}

impl OrderItem {
    #[must_use]
    pub fn href(&self) -> String {
        product_path(&self.product_slug, &self.sku)
    }

    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price_at_purchase.times(self.quantity)
    }
}

/// An order with its items and payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub subtotal: Price,
    pub discount_amount: Price,
    pub total_amount: Price,
    pub coupon_code: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    pub shipping_address: String,
    pub billing_address: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Short reference shown to customers (first UUID group, upper-cased).
    #[must_use]
    pub fn reference(&self) -> String {
        self.id
            .to_string()
            .split('-')
            .next()
            .unwrap_or_default()
            .to_uppercase()
    }

    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Order date as shown in the history, e.g. `Mar 4, 2026`.
    #[must_use]
    pub fn placed_on(&self) -> String {
        self.created_at.format("%b %-d, %Y").to_string()
    }

    #[must_use]
    pub const fn can_cancel(&self) -> bool {
        self.status.is_customer_cancellable()
    }
}

/// What checkout hands back after committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub total_amount: Price,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_is_first_uuid_group() {
        let id: OrderId = "8a3f9c21-5b6d-4e7f-9a0b-1c2d3e4f5a6b".parse().unwrap();
        let order = Order {
            id,
            status: OrderStatus::Pending,
            subtotal: Price::from_cents(10_000),
            discount_amount: Price::ZERO,
            total_amount: Price::from_cents(10_000),
            coupon_code: None,
            payment_method: Some(PaymentMethod::Cod),
            payment_status: Some(PaymentStatus::Initiated),
            shipping_address: String::new(),
            billing_address: String::new(),
            created_at: Utc::now(),
            items: vec![],
        };
        assert_eq!(order.reference(), "8A3F9C21");
        assert!(order.can_cancel());
    }
}
