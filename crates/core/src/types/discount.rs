//! Coupon discount rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::price::Price;

/// How a coupon's `discount_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.discount_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is a percentage of the subtotal (0-100).
    Percentage,
    /// `discount_value` is a flat dollar amount.
    Fixed,
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Percentage => write!(f, "percentage"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

/// Why a coupon cannot be redeemed.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountError {
    #[error("This coupon has expired.")]
    Expired,
    #[error("This coupon has reached its usage limit.")]
    UsageLimitReached,
}

/// The redeemable part of a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub expires_at: DateTime<Utc>,
    pub max_usage: i32,
    pub used_count: i32,
}

impl Discount {
    /// Check that the coupon can still be redeemed at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::Expired`] once `expires_at` has passed and
    /// [`DiscountError::UsageLimitReached`] when `used_count >= max_usage`.
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), DiscountError> {
        if now >= self.expires_at {
            return Err(DiscountError::Expired);
        }
        if self.used_count >= self.max_usage {
            return Err(DiscountError::UsageLimitReached);
        }
        Ok(())
    }

    /// Amount taken off `subtotal`. Never exceeds the subtotal.
    #[must_use]
    pub fn amount_off(&self, subtotal: Price) -> Price {
        let off = match self.discount_type {
            DiscountType::Percentage => {
                let pct = self.value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
                subtotal * (pct / Decimal::ONE_HUNDRED)
            }
            DiscountType::Fixed => Price::new(self.value.max(Decimal::ZERO)),
        };
        off.min(subtotal)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn coupon(discount_type: DiscountType, value: Decimal) -> Discount {
        Discount {
            discount_type,
            value,
            expires_at: Utc::now() + Duration::days(1),
            max_usage: 10,
            used_count: 0,
        }
    }

    #[test]
    fn test_percentage_rounds_to_cents() {
        let discount = coupon(DiscountType::Percentage, Decimal::new(15, 0));
        // 15% of 33.33 = 4.9995
        assert_eq!(
            discount.amount_off(Price::from_cents(3_333)),
            Price::from_cents(500)
        );
    }

    #[test]
    fn test_fixed_is_capped_at_subtotal() {
        let discount = coupon(DiscountType::Fixed, Decimal::new(2_500, 2));
        assert_eq!(
            discount.amount_off(Price::from_cents(10_000)),
            Price::from_cents(2_500)
        );
        assert_eq!(
            discount.amount_off(Price::from_cents(1_000)),
            Price::from_cents(1_000)
        );
    }

    #[test]
    fn test_expired_coupon() {
        let mut discount = coupon(DiscountType::Fixed, Decimal::TEN);
        discount.expires_at = Utc::now() - Duration::minutes(1);
        assert_eq!(discount.check(Utc::now()), Err(DiscountError::Expired));
    }

    #[test]
    fn test_usage_limit() {
        let mut discount = coupon(DiscountType::Fixed, Decimal::TEN);
        discount.used_count = 10;
        assert_eq!(
            discount.check(Utc::now()),
            Err(DiscountError::UsageLimitReached)
        );
        discount.used_count = 9;
        assert_eq!(discount.check(Utc::now()), Ok(()));
    }
}
