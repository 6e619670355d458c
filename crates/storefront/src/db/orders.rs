//! Order repository.
//!
//! Orders are written only inside the checkout transaction (see
//! [`crate::services::checkout`]); the associated functions taking a
//! `PgConnection` are the statements that transaction runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use stride_core::{
    AddressId, CouponId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Price, UserId,
    VariantSizeId,
};

use super::RepositoryError;
use super::carts::{LockedLine, locked_prices};
use crate::models::{Address, Order, OrderItem};

/// Values for a new `pending` order row.
#[derive(Debug, Clone, Copy)]
pub struct NewOrder {
    pub user_id: UserId,
    pub subtotal: Price,
    pub discount_amount: Price,
    pub total_amount: Price,
    pub coupon_id: Option<CouponId>,
    pub shipping_address_id: AddressId,
    pub billing_address_id: AddressId,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    status: OrderStatus,
    subtotal: Price,
    discount_amount: Price,
    total_amount: Price,
    coupon_code: Option<String>,
    payment_method: Option<PaymentMethod>,
    payment_status: Option<PaymentStatus>,
    shipping_address_id: AddressId,
    billing_address_id: AddressId,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    #[sqlx(flatten)]
    item: OrderItem,
}

const ORDER_SELECT: &str = r"
    SELECT o.id,
           o.status,
           o.subtotal,
           o.discount_amount,
           o.total_amount,
           cp.code AS coupon_code,
           pay.method AS payment_method,
           pay.status AS payment_status,
           o.shipping_address_id,
           o.billing_address_id,
           o.created_at
    FROM storefront.orders o
    LEFT JOIN storefront.coupons cp ON o.coupon_id = cp.id
    LEFT JOIN LATERAL (
        SELECT p.method, p.status
        FROM storefront.payments p
        WHERE p.order_id = o.id
        ORDER BY p.paid_at DESC NULLS FIRST
        LIMIT 1
    ) pay ON TRUE
    WHERE o.user_id = $1
";

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders, newest first, with items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("{ORDER_SELECT} ORDER BY o.created_at DESC, o.id");
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        self.hydrate(rows).await
    }

    /// One of the user's orders. Other users' orders are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("{ORDER_SELECT} AND o.id = $2");
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .bind(order_id)
            .fetch_all(self.pool)
            .await?;

        Ok(self.hydrate(rows).await?.into_iter().next())
    }

    /// Attach items and rendered addresses to order rows.
    async fn hydrate(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let address_ids: Vec<AddressId> = rows
            .iter()
            .flat_map(|r| [r.shipping_address_id, r.billing_address_id])
            .collect();

        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT oi.order_id,
                   oi.variant_size_id,
                   p.name AS product_name,
                   p.slug AS product_slug,
                   LOWER(pv.sku) AS sku,
                   s.name AS size,
                   oi.quantity,
                   oi.price_at_purchase
            FROM storefront.order_items oi
            INNER JOIN storefront.variant_sizes vs ON oi.variant_size_id = vs.id
            INNER JOIN storefront.product_variants pv ON vs.variant_id = pv.id
            INNER JOIN storefront.products p ON pv.product_id = p.id
            INNER JOIN storefront.sizes s ON vs.size_id = s.id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.order_id, p.name, s.sort_order
            ",
        )
        .bind(order_ids.as_slice())
        .fetch_all(self.pool)
        .await?;

        let addresses: HashMap<AddressId, String> = sqlx::query_as::<_, Address>(
            r"
            SELECT id, type, line1, line2, city, state, country, postal_code, is_default
            FROM storefront.addresses
            WHERE id = ANY($1)
            ",
        )
        .bind(address_ids.as_slice())
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|address| (address.id, address.one_line()))
        .collect();

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(row.item);
        }

        let address_line = |id: &AddressId| addresses.get(id).cloned().unwrap_or_default();

        Ok(rows
            .into_iter()
            .map(|row| Order {
                id: row.id,
                status: row.status,
                subtotal: row.subtotal,
                discount_amount: row.discount_amount,
                total_amount: row.total_amount,
                coupon_code: row.coupon_code,
                payment_method: row.payment_method,
                payment_status: row.payment_status,
                shipping_address: address_line(&row.shipping_address_id),
                billing_address: address_line(&row.billing_address_id),
                created_at: row.created_at,
                items: items.remove(&row.id).unwrap_or_default(),
            })
            .collect())
    }

    /// Cancel a user's order and put its stock back.
    ///
    /// Returns the status the order had before, or `None` when the user has
    /// no such order. The caller decides whether that status may be
    /// cancelled; the row is only changed when `pending`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails; nothing is
    /// changed in that case.
    pub async fn cancel_pending(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<OrderStatus>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let status = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT status FROM storefront.orders WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(status) = status else {
            return Ok(None);
        };

        if !status.is_customer_cancellable() {
            return Ok(Some(status));
        }

        sqlx::query("UPDATE storefront.orders SET status = 'cancelled' WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            UPDATE storefront.variant_sizes vs
            SET in_stock = vs.in_stock + oi.quantity
            FROM storefront.order_items oi
            WHERE oi.order_id = $1 AND vs.id = oi.variant_size_id
            ",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE storefront.payments SET status = 'failed' WHERE order_id = $1 AND status = 'initiated'",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(status))
    }

    /// Insert a `pending` order row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(conn: &mut PgConnection, order: NewOrder) -> Result<OrderId, RepositoryError> {
        let id = sqlx::query_scalar::<_, OrderId>(
            r"
            INSERT INTO storefront.orders
                (user_id, subtotal, discount_amount, total_amount, coupon_id,
                 shipping_address_id, billing_address_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(order.user_id)
        .bind(order.subtotal)
        .bind(order.discount_amount)
        .bind(order.total_amount)
        .bind(order.coupon_id)
        .bind(order.shipping_address_id)
        .bind(order.billing_address_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    /// Insert one order item per locked cart line, at the locked price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_items(
        conn: &mut PgConnection,
        order_id: OrderId,
        lines: &[LockedLine],
    ) -> Result<(), RepositoryError> {
        let ids: Vec<VariantSizeId> = lines.iter().map(|l| l.variant_size_id).collect();
        let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();

        sqlx::query(
            r"
            INSERT INTO storefront.order_items (order_id, variant_size_id, quantity, price_at_purchase)
            SELECT $1, x.variant_size_id, x.quantity, x.price
            FROM UNNEST($2::uuid[], $3::int4[], $4::numeric[]) AS x(variant_size_id, quantity, price)
            ",
        )
        .bind(order_id)
        .bind(ids)
        .bind(quantities)
        .bind(locked_prices(lines))
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Record an `initiated` payment for the order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_payment(
        conn: &mut PgConnection,
        order_id: OrderId,
        method: PaymentMethod,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO storefront.payments (order_id, method) VALUES ($1, $2)")
            .bind(order_id)
            .bind(method)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
