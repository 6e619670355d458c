//! Coupon lookups for checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use stride_core::{CouponId, Discount, DiscountType};

use super::RepositoryError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub expires_at: DateTime<Utc>,
    pub max_usage: i32,
    pub used_count: i32,
}

impl Coupon {
    #[must_use]
    pub const fn discount(&self) -> Discount {
        Discount {
            discount_type: self.discount_type,
            value: self.discount_value,
            expires_at: self.expires_at,
            max_usage: self.max_usage,
            used_count: self.used_count,
        }
    }
}

/// Coupons are only read inside the checkout transaction, so there is no
/// pool-backed repository.
pub struct CouponRepository;

impl CouponRepository {
    /// Find a coupon by code (case-insensitive) and lock it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_by_code(
        conn: &mut PgConnection,
        code: &str,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(
            r"
            SELECT id, code, discount_type, discount_value, expires_at, max_usage, used_count
            FROM storefront.coupons
            WHERE UPPER(code) = UPPER($1)
            FOR UPDATE
            ",
        )
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(coupon)
    }

    /// Count one more use of the coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn increment_usage(
        conn: &mut PgConnection,
        id: CouponId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE storefront.coupons SET used_count = used_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
