//! Product query builder.
//!
//! Listing and detail pages read products together with their variants,
//! sizes and images in a single round trip. Sizes and images are aggregated
//! per variant, and variants per product, with `json_agg`; the result decodes
//! straight into [`Product`].
//!
//! Filters are applied at two levels:
//!
//! - product level: published flag, search term, category, gender, brand and
//!   collection;
//! - variant level: stock (`in_stock > 0`), price buckets, size and colour.
//!   A variant with no qualifying size drops out, and a product with no
//!   qualifying variant drops out with it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use stride_core::{Price, PriceBucket, PriceRange, ProductFilters, ProductId, SortOrder, VariantId};

use super::{RepositoryError, escape_like};
use crate::models::{Product, ProductListing, Variant};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    slug: String,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    gender: Option<String>,
    category: Option<String>,
    brand: Option<String>,
    default_variant_id: Option<VariantId>,
    variants: Json<Vec<Variant>>,
    price_min: Option<Decimal>,
    price_max: Option<Decimal>,
}

impl ProductRow {
    fn into_product(self, with_price_range: bool) -> Product {
        let price_range = match (with_price_range, self.price_min, self.price_max) {
            (true, Some(min), Some(max)) => Some(PriceRange::new(Price::new(min), Price::new(max))),
            _ => None,
        };

        Product {
            id: self.id,
            slug: self.slug,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            gender: self.gender,
            category: self.category,
            brand: self.brand,
            default_variant_id: self.default_variant_id,
            variants: self.variants.0,
            price_range,
        }
    }
}

/// Variant-level predicates.
#[derive(Debug, Default)]
struct VariantScope<'f> {
    /// Only sizes with `in_stock > 0`.
    in_stock_only: bool,
    prices: &'f [PriceBucket],
    sizes: &'f [String],
    colors: &'f [String],
}

impl<'f> VariantScope<'f> {
    fn from_filters(filters: &'f ProductFilters) -> Self {
        Self {
            in_stock_only: true,
            prices: &filters.prices,
            sizes: &filters.sizes,
            colors: &filters.colors,
        }
    }
}

/// Push the aggregation CTEs and the product `SELECT ... FROM ... JOIN`.
///
/// The caller appends `WHERE p.is_published = TRUE` and any further clauses.
fn push_product_select(qb: &mut QueryBuilder<'_, Postgres>, scope: &VariantScope<'_>) {
    qb.push(
        r"
        WITH variant_sizes_agg AS (
            SELECT vs.variant_id,
                   json_agg(
                       json_build_object(
                           'id', vs.id,
                           'inStock', vs.in_stock,
                           'price', vs.price::text,
                           'salePrice', vs.sale_price::text,
                           'size', s.name
                       ) ORDER BY s.sort_order ASC
                   ) AS sizes,
                   MIN(vs.price) AS price_min,
                   MAX(vs.price) AS price_max
            FROM storefront.variant_sizes vs
            INNER JOIN storefront.sizes s ON vs.size_id = s.id
            WHERE TRUE",
    );

    if scope.in_stock_only {
        qb.push(" AND vs.in_stock > 0");
    }

    if !scope.prices.is_empty() {
        qb.push(" AND (");
        for (i, bucket) in scope.prices.iter().enumerate() {
            let (min, max) = bucket.bounds();
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("(vs.price >= ")
                .push_bind(min)
                .push(" AND vs.price <= ")
                .push_bind(max)
                .push(")");
        }
        qb.push(")");
    }

    if !scope.sizes.is_empty() {
        qb.push(" AND s.slug = ANY(")
            .push_bind(scope.sizes.to_vec())
            .push(")");
    }

    qb.push(
        r"
            GROUP BY vs.variant_id
        ),
        variant_images_agg AS (
            SELECT pi.variant_id,
                   json_agg(
                       json_build_object(
                           'id', pi.id,
                           'isPrimary', pi.is_primary,
                           'url', pi.url,
                           'order', pi.sort_order
                       ) ORDER BY pi.sort_order ASC
                   ) AS images
            FROM storefront.product_images pi
            GROUP BY pi.variant_id
        ),
        product_variants_agg AS (
            SELECT pv.product_id,
                   json_agg(
                       json_build_object(
                           'id', pv.id,
                           'sku', LOWER(pv.sku),
                           'color', c.name,
                           'images', via.images,
                           'sizes', vsa.sizes
                       ) ORDER BY pv.created_at ASC, pv.id ASC
                   ) AS variants,
                   MIN(vsa.price_min) AS price_min,
                   MAX(vsa.price_max) AS price_max
            FROM storefront.product_variants pv
            INNER JOIN variant_sizes_agg vsa ON pv.id = vsa.variant_id
            INNER JOIN storefront.colors c ON pv.color_id = c.id
            INNER JOIN variant_images_agg via ON pv.id = via.variant_id",
    );

    if !scope.colors.is_empty() {
        qb.push(" WHERE c.slug = ANY(")
            .push_bind(scope.colors.to_vec())
            .push(")");
    }

    qb.push(
        r"
            GROUP BY pv.product_id
        )
        SELECT p.id, p.slug, p.name, p.description, p.created_at,
               g.label AS gender,
               cat.name AS category,
               b.name AS brand,
               p.default_variant_id,
               pva.variants,
               pva.price_min,
               pva.price_max
        FROM storefront.products p
        INNER JOIN product_variants_agg pva ON p.id = pva.product_id
        LEFT JOIN storefront.categories cat ON p.category_id = cat.id
        LEFT JOIN storefront.genders g ON p.gender_id = g.id
        LEFT JOIN storefront.brands b ON p.brand_id = b.id
        WHERE p.is_published = TRUE",
    );
}

fn push_order_by(qb: &mut QueryBuilder<'_, Postgres>, sort: SortOrder) {
    qb.push(match sort {
        SortOrder::PriceHighToLow => " ORDER BY pva.price_min DESC, p.created_at DESC, p.id ASC",
        SortOrder::PriceLowToHigh => " ORDER BY pva.price_min ASC, p.created_at DESC, p.id ASC",
        SortOrder::Featured | SortOrder::Newest => " ORDER BY p.created_at DESC, p.id ASC",
    });
}

/// Build the listing query for a set of filters.
fn build_listing_query(filters: &ProductFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("");
    push_product_select(&mut qb, &VariantScope::from_filters(filters));

    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (p.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if !filters.categories.is_empty() {
        qb.push(" AND cat.slug = ANY(")
            .push_bind(filters.categories.clone())
            .push(")");
    }

    if !filters.genders.is_empty() {
        qb.push(" AND g.slug = ANY(")
            .push_bind(filters.genders.clone())
            .push(")");
    }

    if !filters.brands.is_empty() {
        qb.push(" AND b.slug = ANY(")
            .push_bind(filters.brands.clone())
            .push(")");
    }

    if !filters.collections.is_empty() {
        qb.push(
            r"
            AND EXISTS (
                SELECT 1
                FROM storefront.product_collections pc
                INNER JOIN storefront.collections col ON pc.collection_id = col.id
                WHERE pc.product_id = p.id AND col.slug = ANY(",
        )
        .push_bind(filters.collections.clone())
        .push("))");
    }

    push_order_by(&mut qb, filters.sort);
    qb
}

/// Build the detail query: every size, in stock or not.
fn build_detail_query(slug: &str) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("");
    push_product_select(&mut qb, &VariantScope::default());
    qb.push(" AND p.slug = ").push_bind(slug.to_owned());
    qb
}

/// Build the related-products query: same category, in stock, newest first.
fn build_related_query(product_id: ProductId, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("");
    push_product_select(
        &mut qb,
        &VariantScope {
            in_stock_only: true,
            ..VariantScope::default()
        },
    );
    qb.push(" AND p.id <> ")
        .push_bind(product_id)
        .push(" AND p.category_id = (SELECT category_id FROM storefront.products WHERE id = ")
        .push_bind(product_id)
        .push(")");
    push_order_by(&mut qb, SortOrder::Newest);
    qb.push(" LIMIT ").push_bind(limit);
    qb
}

/// Repository for catalog product reads.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List published, in-stock products matching `filters`.
    ///
    /// `total` is the number of matching products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails or a row does
    /// not decode.
    pub async fn list(&self, filters: &ProductFilters) -> Result<ProductListing, RepositoryError> {
        let mut qb = build_listing_query(filters);
        let rows: Vec<ProductRow> = qb
            .build_query_as()
            .fetch_all(self.pool)
            .await?;

        let products: Vec<Product> = rows.into_iter().map(|r| r.into_product(true)).collect();

        Ok(ProductListing {
            total: products.len(),
            products,
        })
    }

    /// Get a published product by slug with all of its variants and sizes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let mut qb = build_detail_query(slug);
        let row: Option<ProductRow> = qb
            .build_query_as()
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(|r| r.into_product(false)))
    }

    /// Other in-stock products from the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(
        &self,
        product_id: ProductId,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut qb = build_related_query(product_id, limit);
        let rows: Vec<ProductRow> = qb
            .build_query_as()
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_product(true)).collect())
    }

    /// Resolve a published product's ID from its slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn id_by_slug(&self, slug: &str) -> Result<Option<ProductId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, ProductId>(
            "SELECT id FROM storefront.products WHERE slug = $1 AND is_published = TRUE",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use stride_core::ProductQuery;

    use super::*;

    fn filters(query: ProductQuery) -> ProductFilters {
        ProductFilters::from_query(&query)
    }

    #[test]
    fn test_listing_always_requires_published_and_stock() {
        let qb = build_listing_query(&ProductFilters::default());
        let sql = qb.sql();
        assert!(sql.contains("p.is_published = TRUE"));
        assert!(sql.contains("vs.in_stock > 0"));
        assert!(!sql.contains("vs.price >="));
        assert!(!sql.contains("ILIKE"));
        assert!(sql.ends_with(" ORDER BY p.created_at DESC, p.id ASC"));
    }

    #[test]
    fn test_price_buckets_are_ored() {
        let qb = build_listing_query(&filters(ProductQuery {
            price: Some("0-50,150-plus".to_owned()),
            ..ProductQuery::default()
        }));
        let sql = qb.sql();
        assert!(sql.contains(
            " AND ((vs.price >= $1 AND vs.price <= $2) OR (vs.price >= $3 AND vs.price <= $4))"
        ));
    }

    #[test]
    fn test_invalid_price_bucket_adds_no_predicate() {
        let qb = build_listing_query(&filters(ProductQuery {
            price: Some("free".to_owned()),
            ..ProductQuery::default()
        }));
        assert!(!qb.sql().contains("vs.price >="));
    }

    #[test]
    fn test_product_facets() {
        let qb = build_listing_query(&filters(ProductQuery {
            search: Some("runner".to_owned()),
            gender: Some("men".to_owned()),
            category: Some("running".to_owned()),
            brand: Some("stride".to_owned()),
            collection: Some("summer".to_owned()),
            ..ProductQuery::default()
        }));
        let sql = qb.sql();
        assert!(sql.contains("(p.description ILIKE $1 OR p.name ILIKE $2)"));
        assert!(sql.contains("cat.slug = ANY($3)"));
        assert!(sql.contains("g.slug = ANY($4)"));
        assert!(sql.contains("b.slug = ANY($5)"));
        assert!(sql.contains("col.slug = ANY($6)"));
    }

    #[test]
    fn test_variant_facets() {
        let qb = build_listing_query(&filters(ProductQuery {
            size: Some("9".to_owned()),
            color: Some("black".to_owned()),
            ..ProductQuery::default()
        }));
        let sql = qb.sql();
        assert!(sql.contains("s.slug = ANY($1)"));
        assert!(sql.contains("WHERE c.slug = ANY($2)"));
    }

    #[test]
    fn test_sort_orders() {
        let high = build_listing_query(&filters(ProductQuery {
            sort: Some("price-high-to-low".to_owned()),
            ..ProductQuery::default()
        }));
        assert!(high.sql().contains("ORDER BY pva.price_min DESC"));

        let low = build_listing_query(&filters(ProductQuery {
            sort: Some("price-low-to-high".to_owned()),
            ..ProductQuery::default()
        }));
        assert!(low.sql().contains("ORDER BY pva.price_min ASC"));

        let newest = build_listing_query(&filters(ProductQuery {
            sort: Some("newest".to_owned()),
            ..ProductQuery::default()
        }));
        assert!(newest.sql().contains("ORDER BY p.created_at DESC"));
    }

    #[test]
    fn test_detail_includes_out_of_stock_sizes() {
        let qb = build_detail_query("air-runner");
        let sql = qb.sql();
        assert!(!sql.contains("in_stock > 0"));
        assert!(sql.contains("p.is_published = TRUE"));
        assert!(sql.ends_with(" AND p.slug = $1"));
    }

    #[test]
    fn test_related_excludes_self() {
        let qb = build_related_query(ProductId::generate(), 4);
        let sql = qb.sql();
        assert!(sql.contains("p.id <> $1"));
        assert!(sql.contains("vs.in_stock > 0"));
        assert!(sql.ends_with(" LIMIT $3"));
    }
}
