//! Checkout: turns a user's cart into a `pending` order.
//!
//! Everything runs in one transaction. Cart lines and their variant sizes
//! are locked with `FOR UPDATE`, so two checkouts racing for the last unit
//! serialize and the loser sees the reduced stock.

use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use stride_core::{
    AddressId, DiscountError, OrderId, OrderStatus, PaymentMethod, Price, UserId, VariantSizeId,
};

use crate::cache::CatalogCache;
use crate::db::carts::locked_subtotal;
use crate::db::orders::NewOrder;
use crate::db::{
    AddressRepository, CartRepository, CouponRepository, OrderRepository, RepositoryError,
};
use crate::models::{CartOwner, PlacedOrder};

/// Errors from checkout and order cancellation.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty.")]
    EmptyCart,

    #[error("Some items in your cart are no longer available in the requested quantity.")]
    InsufficientStock { variant_size_id: VariantSizeId },

    #[error("This coupon code is not valid.")]
    InvalidCoupon,

    #[error("{0}")]
    Coupon(#[from] DiscountError),

    #[error("Please choose one of your saved addresses.")]
    AddressNotFound,

    #[error("Order not found.")]
    OrderNotFound,

    #[error("This order can no longer be cancelled.")]
    NotCancellable(OrderStatus),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Submitted checkout form.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutForm {
    pub shipping_address_id: AddressId,
    pub billing_address_id: AddressId,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
}

impl CheckoutForm {
    /// The coupon code, trimmed, if one was entered.
    #[must_use]
    pub fn coupon(&self) -> Option<&str> {
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a CatalogCache) -> Self {
        Self { pool, cache }
    }

    /// Place an order for everything in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart`, `InsufficientStock`,
    /// `InvalidCoupon`, `Coupon` or `AddressNotFound` when the order cannot be
    /// placed; the database is left untouched in every error case.
    #[instrument(skip(self, form), fields(payment_method = %form.payment_method))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        form: &CheckoutForm,
    ) -> Result<PlacedOrder, CheckoutError> {
        let cart_id = CartRepository::new(self.pool)
            .find(CartOwner::User(user_id))
            .await?
            .ok_or(CheckoutError::EmptyCart)?;

        let mut tx = self.pool.begin().await?;

        let lines = CartRepository::lock_lines(&mut tx, cart_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if let Some(short) = lines.iter().find(|l| l.quantity > l.in_stock) {
            return Err(CheckoutError::InsufficientStock {
                variant_size_id: short.variant_size_id,
            });
        }

        let subtotal = locked_subtotal(&lines);

        let (coupon_id, discount_amount) = match form.coupon() {
            Some(code) => {
                let coupon = CouponRepository::lock_by_code(&mut tx, code)
                    .await?
                    .ok_or(CheckoutError::InvalidCoupon)?;
                let discount = coupon.discount();
                discount.check(Utc::now())?;
                CouponRepository::increment_usage(&mut tx, coupon.id).await?;
                (Some(coupon.id), discount.amount_off(subtotal))
            }
            None => (None, Price::ZERO),
        };

        for address_id in [form.shipping_address_id, form.billing_address_id] {
            if !AddressRepository::is_owned_by(&mut tx, user_id, address_id).await? {
                return Err(CheckoutError::AddressNotFound);
            }
        }

        let total_amount = subtotal - discount_amount;

        let order_id = OrderRepository::insert(
            &mut tx,
            NewOrder {
                user_id,
                subtotal,
                discount_amount,
                total_amount,
                coupon_id,
                shipping_address_id: form.shipping_address_id,
                billing_address_id: form.billing_address_id,
            },
        )
        .await?;

        OrderRepository::insert_items(&mut tx, order_id, &lines).await?;
        CartRepository::decrement_stock(&mut tx, &lines).await?;
        OrderRepository::insert_payment(&mut tx, order_id, form.payment_method).await?;
        CartRepository::clear(&mut tx, cart_id).await?;

        tx.commit().await?;

        self.cache.invalidate_products();

        info!(%order_id, %total_amount, "Order placed");

        Ok(PlacedOrder {
            id: order_id,
            total_amount,
        })
    }

    /// Cancel one of the user's pending orders, restoring its stock.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` for unknown or foreign orders
    /// and `CheckoutError::NotCancellable` once the order has moved on.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<(), CheckoutError> {
        let previous = OrderRepository::new(self.pool)
            .cancel_pending(user_id, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if !previous.is_customer_cancellable() {
            return Err(CheckoutError::NotCancellable(previous));
        }

        self.cache.invalidate_products();

        info!(%order_id, "Order cancelled");

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_form_coupon_trimmed() {
        let form: CheckoutForm = serde_json::from_value(serde_json::json!({
            "shipping_address_id": "3f2b8c1e-9d4a-4b7e-8f6a-1c2d3e4f5a6b",
            "billing_address_id": "3f2b8c1e-9d4a-4b7e-8f6a-1c2d3e4f5a6b",
            "coupon_code": "  SPRING10 ",
            "payment_method": "cod"
        }))
        .unwrap();
        assert_eq!(form.coupon(), Some("SPRING10"));
        assert_eq!(form.payment_method, PaymentMethod::Cod);

        let blank = CheckoutForm {
            coupon_code: Some("   ".to_owned()),
            ..form
        };
        assert_eq!(blank.coupon(), None);
    }

    #[test]
    fn test_coupon_error_message_passthrough() {
        let err = CheckoutError::from(DiscountError::Expired);
        assert_eq!(err.to_string(), "This coupon has expired.");
    }
}
