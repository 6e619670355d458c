//! Guest session repository.
//!
//! A guest row backs the `guest_session` cookie. Deleting it cascades to the
//! guest's cart.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stride_core::GuestId;

use super::RepositoryError;

/// A guest session row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Guest {
    pub id: GuestId,
    pub session_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Guest {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Repository for guest session rows.
pub struct GuestRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GuestRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a guest by cookie token, expired or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<Guest>, RepositoryError> {
        let guest = sqlx::query_as::<_, Guest>(
            r"
            SELECT id, session_token, created_at, expires_at
            FROM storefront.guests
            WHERE session_token = $1
            ",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(guest)
    }

    /// Insert a guest session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the token is already taken.
    pub async fn create(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Guest, RepositoryError> {
        sqlx::query_as::<_, Guest>(
            r"
            INSERT INTO storefront.guests (session_token, expires_at)
            VALUES ($1, $2)
            RETURNING id, session_token, created_at, expires_at
            ",
        )
        .bind(token)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_violation(e, "guest session token already exists"))
    }

    /// Delete a guest session by token. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_by_token(&self, token: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.guests WHERE session_token = $1")
            .bind(token)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every guest whose session has expired. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.guests WHERE expires_at <= NOW()")
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        let guest = Guest {
            id: GuestId::generate(),
            session_token: "token".to_owned(),
            created_at: now - Duration::days(8),
            expires_at: now - Duration::days(1),
        };
        assert!(guest.is_expired(now));
        assert!(!guest.is_expired(now - Duration::days(2)));
    }
}
