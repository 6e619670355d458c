//! Product review repository.

use sqlx::PgPool;

use stride_core::{ProductId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::{Review, ReviewSummary};

#[derive(sqlx::FromRow)]
struct SummaryRow {
    count: i64,
    average: Option<f64>,
}

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(
            r"
            SELECT r.id, u.name AS author, r.rating, r.comment, r.created_at
            FROM storefront.reviews r
            INNER JOIN storefront.users u ON r.user_id = u.id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC, r.id
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(reviews)
    }

    /// Review count and average rating.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self, product_id: ProductId) -> Result<ReviewSummary, RepositoryError> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r"
            SELECT COUNT(*) AS count, AVG(rating)::float8 AS average
            FROM storefront.reviews
            WHERE product_id = $1
            ",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(ReviewSummary {
            count: row.count,
            average: row.average,
        })
    }

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the
    /// product.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<ReviewId, RepositoryError> {
        sqlx::query_scalar::<_, ReviewId>(
            r"
            INSERT INTO storefront.reviews (product_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "product already reviewed"))
    }
}
