//! Cart repository.
//!
//! A cart belongs to exactly one user or one guest (`carts_single_owner`),
//! and holds at most one line per variant size.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use stride_core::{CartId, CartItemId, GuestId, Price, UserId, VariantSizeId};

use super::RepositoryError;
use crate::models::{CartLine, CartOwner};

/// A cart line locked for checkout.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LockedLine {
    pub variant_size_id: VariantSizeId,
    pub quantity: i32,
    pub unit_price: Price,
    pub in_stock: i32,
}

/// Stock and price of a single variant size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct VariantSizeStock {
    pub in_stock: i32,
    pub is_published: bool,
}

const CART_LINES_SQL: &str = r"
    SELECT ci.id AS item_id,
           ci.variant_size_id,
           p.name AS product_name,
           p.slug AS product_slug,
           LOWER(pv.sku) AS sku,
           c.name AS color,
           s.name AS size,
           (
               SELECT pi.url
               FROM storefront.product_images pi
               WHERE pi.variant_id = pv.id
               ORDER BY pi.sort_order ASC
               LIMIT 1
           ) AS image_url,
           COALESCE(vs.sale_price, vs.price) AS unit_price,
           ci.quantity,
           vs.in_stock
    FROM storefront.cart_items ci
    INNER JOIN storefront.variant_sizes vs ON ci.variant_size_id = vs.id
    INNER JOIN storefront.product_variants pv ON vs.variant_id = pv.id
    INNER JOIN storefront.products p ON pv.product_id = p.id
    INNER JOIN storefront.colors c ON pv.color_id = c.id
    INNER JOIN storefront.sizes s ON vs.size_id = s.id
    WHERE ci.cart_id = $1
    ORDER BY ci.added_at DESC, ci.id ASC
";

/// Copy guest lines (`$2`) into the user cart (`$1`). Every resulting
/// quantity is capped at the size's current stock.
const MERGE_GUEST_LINES: &str = r"
    INSERT INTO storefront.cart_items (cart_id, variant_size_id, quantity, added_at)
    SELECT $1, gi.variant_size_id, LEAST(gi.quantity, vs.in_stock), gi.added_at
    FROM storefront.cart_items gi
    INNER JOIN storefront.variant_sizes vs ON vs.id = gi.variant_size_id
    WHERE gi.cart_id = $2 AND vs.in_stock > 0
    ON CONFLICT (cart_id, variant_size_id) DO UPDATE
        SET quantity = LEAST(
            storefront.cart_items.quantity + EXCLUDED.quantity,
            (SELECT vs.in_stock FROM storefront.variant_sizes vs
             WHERE vs.id = EXCLUDED.variant_size_id)
        )
";

/// Repository for carts and cart items.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the owner's cart, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, owner: CartOwner) -> Result<Option<CartId>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::find_with(&mut conn, owner).await
    }

    async fn find_with(
        conn: &mut PgConnection,
        owner: CartOwner,
    ) -> Result<Option<CartId>, RepositoryError> {
        let id = match owner {
            CartOwner::User(user_id) => {
                sqlx::query_scalar::<_, CartId>(
                    "SELECT id FROM storefront.carts WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?
            }
            CartOwner::Guest(guest_id) => {
                sqlx::query_scalar::<_, CartId>(
                    "SELECT id FROM storefront.carts WHERE guest_id = $1",
                )
                .bind(guest_id)
                .fetch_optional(&mut *conn)
                .await?
            }
        };

        Ok(id)
    }

    /// Return the owner's cart, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(&self, owner: CartOwner) -> Result<CartId, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::get_or_create_with(&mut conn, owner).await
    }

    async fn get_or_create_with(
        conn: &mut PgConnection,
        owner: CartOwner,
    ) -> Result<CartId, RepositoryError> {
        let (user_id, guest_id, conflict) = match owner {
            CartOwner::User(id) => (Some(id), None, "user_id"),
            CartOwner::Guest(id) => (None, Some(id), "guest_id"),
        };

        let sql = format!(
            r"
            INSERT INTO storefront.carts (user_id, guest_id)
            VALUES ($1, $2)
            ON CONFLICT ({conflict}) DO UPDATE SET updated_at = NOW()
            RETURNING id
            "
        );

        let id = sqlx::query_scalar::<_, CartId>(&sql)
            .bind(user_id)
            .bind(guest_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(id)
    }

    /// Lines of a cart, most recently added first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, CartLine>(CART_LINES_SQL)
            .bind(cart_id)
            .fetch_all(self.pool)
            .await?;

        Ok(lines)
    }

    /// Stock of a variant size and whether its product is on sale.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variant_size_stock(
        &self,
        variant_size_id: VariantSizeId,
    ) -> Result<Option<VariantSizeStock>, RepositoryError> {
        let stock = sqlx::query_as::<_, VariantSizeStock>(
            r"
            SELECT vs.in_stock, p.is_published
            FROM storefront.variant_sizes vs
            INNER JOIN storefront.product_variants pv ON vs.variant_id = pv.id
            INNER JOIN storefront.products p ON pv.product_id = p.id
            WHERE vs.id = $1
            ",
        )
        .bind(variant_size_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(stock)
    }

    /// Add `quantity` units, accumulating onto an existing line.
    ///
    /// Returns the line's new quantity, or `None` when the accumulated
    /// quantity would exceed the stock on hand.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_item(
        &self,
        cart_id: CartId,
        variant_size_id: VariantSizeId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let new_quantity = sqlx::query_scalar::<_, i32>(
            r"
            INSERT INTO storefront.cart_items (cart_id, variant_size_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, variant_size_id) DO UPDATE
                SET quantity = storefront.cart_items.quantity + EXCLUDED.quantity
                WHERE storefront.cart_items.quantity + EXCLUDED.quantity <= (
                    SELECT in_stock FROM storefront.variant_sizes WHERE id = EXCLUDED.variant_size_id
                )
            RETURNING quantity
            ",
        )
        .bind(cart_id)
        .bind(variant_size_id)
        .bind(quantity)
        .fetch_optional(self.pool)
        .await?;

        sqlx::query("UPDATE storefront.carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;

        Ok(new_quantity)
    }

    /// Set a line's quantity. Returns whether the line exists in this cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.cart_items SET quantity = $3 WHERE cart_id = $1 AND id = $2",
        )
        .bind(cart_id)
        .bind(item_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stock left for the variant size behind a line of this cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn item_stock(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<Option<i32>, RepositoryError> {
        let stock = sqlx::query_scalar::<_, i32>(
            r"
            SELECT vs.in_stock
            FROM storefront.cart_items ci
            INNER JOIN storefront.variant_sizes vs ON ci.variant_size_id = vs.id
            WHERE ci.cart_id = $1 AND ci.id = $2
            ",
        )
        .bind(cart_id)
        .bind(item_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(stock)
    }

    /// Remove a line. Returns whether it existed in this cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.cart_items WHERE cart_id = $1 AND id = $2")
            .bind(cart_id)
            .bind(item_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a guest's cart lines into the user's cart and delete the guest.
    ///
    /// Quantities for the same variant size are added together and capped at
    /// the size's stock; sold-out guest lines are dropped. Deleting the guest
    /// row cascades to the guest cart. Returns the number of lines moved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// changed in that case.
    pub async fn merge_guest_into_user(
        &self,
        guest_id: GuestId,
        user_id: UserId,
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let moved = match Self::find_with(&mut tx, CartOwner::Guest(guest_id)).await? {
            Some(guest_cart) => {
                let user_cart = Self::get_or_create_with(&mut tx, CartOwner::User(user_id)).await?;

                sqlx::query(MERGE_GUEST_LINES)
                    .bind(user_cart)
                    .bind(guest_cart)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
            }
            None => 0,
        };

        sqlx::query("DELETE FROM storefront.guests WHERE id = $1")
            .bind(guest_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(moved)
    }

    /// Lock the cart's lines and their variant sizes for checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_lines(
        conn: &mut PgConnection,
        cart_id: CartId,
    ) -> Result<Vec<LockedLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, LockedLine>(
            r"
            SELECT ci.variant_size_id,
                   ci.quantity,
                   COALESCE(vs.sale_price, vs.price) AS unit_price,
                   vs.in_stock
            FROM storefront.cart_items ci
            INNER JOIN storefront.variant_sizes vs ON ci.variant_size_id = vs.id
            WHERE ci.cart_id = $1
            ORDER BY vs.id
            FOR UPDATE OF ci, vs
            ",
        )
        .bind(cart_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    /// Delete every line of a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(conn: &mut PgConnection, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Subtract purchased quantities from stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails (including the
    /// `in_stock >= 0` check).
    pub async fn decrement_stock(
        conn: &mut PgConnection,
        lines: &[LockedLine],
    ) -> Result<(), RepositoryError> {
        let ids: Vec<VariantSizeId> = lines.iter().map(|l| l.variant_size_id).collect();
        let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();

        sqlx::query(
            r"
            UPDATE storefront.variant_sizes vs
            SET in_stock = vs.in_stock - x.quantity
            FROM UNNEST($1::uuid[], $2::int4[]) AS x(id, quantity)
            WHERE vs.id = x.id
            ",
        )
        .bind(ids)
        .bind(quantities)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

/// Sum of `unit_price * quantity` over locked lines.
#[must_use]
pub fn locked_subtotal(lines: &[LockedLine]) -> Price {
    lines
        .iter()
        .map(|l| l.unit_price.times(l.quantity))
        .sum()
}

/// Prices of locked lines as plain decimals, for `UNNEST` binds.
#[must_use]
pub fn locked_prices(lines: &[LockedLine]) -> Vec<Decimal> {
    lines.iter().map(|l| l.unit_price.amount()).collect()
}
