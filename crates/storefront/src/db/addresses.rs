//! Saved address repository.

use sqlx::{PgConnection, PgPool};

use stride_core::{AddressId, AddressType, UserId};

use super::RepositoryError;
use crate::models::Address;

/// A validated address to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub address_type: AddressType,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub is_default: bool,
}

/// Repository for user addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's addresses, defaults first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let addresses = sqlx::query_as::<_, Address>(
            r"
            SELECT id, type, line1, line2, city, state, country, postal_code, is_default
            FROM storefront.addresses
            WHERE user_id = $1
            ORDER BY type, is_default DESC, created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(addresses)
    }

    /// Insert an address. The first address of a type becomes its default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn create(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let has_default = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS (
                SELECT 1 FROM storefront.addresses
                WHERE user_id = $1 AND type = $2 AND is_default
            )
            ",
        )
        .bind(user_id)
        .bind(address.address_type)
        .fetch_one(&mut *tx)
        .await?;

        let is_default = address.is_default || !has_default;
        if is_default && has_default {
            Self::clear_default(&mut tx, user_id, address.address_type).await?;
        }

        let created = sqlx::query_as::<_, Address>(
            r"
            INSERT INTO storefront.addresses
                (user_id, type, line1, line2, city, state, country, postal_code, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, type, line1, line2, city, state, country, postal_code, is_default
            ",
        )
        .bind(user_id)
        .bind(address.address_type)
        .bind(&address.line1)
        .bind(&address.line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.country)
        .bind(&address.postal_code)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    /// Delete one of the user's addresses. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while an order still references
    /// the address.
    pub async fn delete(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM storefront.addresses WHERE id = $1 AND user_id = $2")
                .bind(address_id)
                .bind(user_id)
                .execute(self.pool)
                .await
                .map_err(|e| RepositoryError::foreign_key_violation(e, "address is used by an order"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Make an address the default for its type. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn set_default(
        &self,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let address_type = sqlx::query_scalar::<_, AddressType>(
            "SELECT type FROM storefront.addresses WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(address_type) = address_type else {
            return Ok(false);
        };

        Self::clear_default(&mut tx, user_id, address_type).await?;

        sqlx::query("UPDATE storefront.addresses SET is_default = TRUE WHERE id = $1")
            .bind(address_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn clear_default(
        conn: &mut PgConnection,
        user_id: UserId,
        address_type: AddressType,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE storefront.addresses
            SET is_default = FALSE
            WHERE user_id = $1 AND type = $2 AND is_default
            ",
        )
        .bind(user_id)
        .bind(address_type)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Whether the address exists and belongs to the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_owned_by(
        conn: &mut PgConnection,
        user_id: UserId,
        address_id: AddressId,
    ) -> Result<bool, RepositoryError> {
        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM storefront.addresses WHERE id = $1 AND user_id = $2)",
        )
        .bind(address_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(owned)
    }
}
