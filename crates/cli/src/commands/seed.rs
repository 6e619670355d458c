//! Seed the catalog from a YAML file.
//!
//! The file lists lookup values (genders, categories, brands, colours,
//! sizes, collections), coupons and products with their variants. Rows are
//! upserted by slug, SKU or code, so re-running the same file is a no-op and
//! editing it updates the catalog in place. Everything runs in one
//! transaction.
//!
//! Running servers keep serving cached catalog data until their cache TTL
//! expires.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::{error, info};
use uuid::Uuid;

use stride_core::{DiscountType, Price};

// =============================================================================
// File Format
// =============================================================================

/// Lookup row with a display name (`categories`, `brands`, `collections`).
#[derive(Debug, Clone, Deserialize)]
pub struct NamedEntry {
    pub slug: String,
    pub name: String,
}

/// `genders` row.
#[derive(Debug, Clone, Deserialize)]
pub struct GenderEntry {
    pub slug: String,
    pub label: String,
}

/// `colors` row.
#[derive(Debug, Clone, Deserialize)]
pub struct ColorEntry {
    pub slug: String,
    pub name: String,
    #[serde(default = "default_hex")]
    pub hex: String,
}

fn default_hex() -> String {
    "#000000".to_owned()
}

/// `sizes` row. `sort_order` drives the size picker order.
#[derive(Debug, Clone, Deserialize)]
pub struct SizeEntry {
    pub slug: String,
    pub name: String,
    pub sort_order: i32,
}

/// `coupons` row.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponEntry {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Price,
    pub expires_at: DateTime<Utc>,
    pub max_usage: i32,
}

/// A stocked size of a variant.
#[derive(Debug, Clone, Deserialize)]
pub struct StockEntry {
    /// Slug of a `sizes` entry.
    pub size: String,
    pub price: Price,
    #[serde(default)]
    pub sale_price: Option<Price>,
    #[serde(default)]
    pub stock: i32,
}

/// A colour variant. The first variant of a product is its default.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantEntry {
    pub sku: String,
    /// Slug of a `colors` entry.
    pub color: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub sizes: Vec<StockEntry>,
}

/// A product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductEntry {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default = "default_published")]
    pub published: bool,
    pub variants: Vec<VariantEntry>,
}

const fn default_published() -> bool {
    true
}

/// The whole seed file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSeed {
    pub genders: Vec<GenderEntry>,
    pub categories: Vec<NamedEntry>,
    pub brands: Vec<NamedEntry>,
    pub colors: Vec<ColorEntry>,
    pub sizes: Vec<SizeEntry>,
    pub collections: Vec<NamedEntry>,
    pub coupons: Vec<CouponEntry>,
    pub products: Vec<ProductEntry>,
}

// =============================================================================
// Validation
// =============================================================================

fn slugs<'a>(entries: impl IntoIterator<Item = &'a str>) -> HashSet<&'a str> {
    entries.into_iter().collect()
}

fn check_ref(errors: &mut Vec<String>, kind: &str, known: &HashSet<&str>, value: &str, owner: &str) {
    if !known.contains(value) {
        errors.push(format!("{owner}: unknown {kind} '{value}'"));
    }
}

/// Check references and values before touching the database.
///
/// Returns one message per problem found.
#[must_use]
pub fn validate_catalog(seed: &CatalogSeed) -> Vec<String> {
    let genders = slugs(seed.genders.iter().map(|g| g.slug.as_str()));
    let categories = slugs(seed.categories.iter().map(|c| c.slug.as_str()));
    let brands = slugs(seed.brands.iter().map(|b| b.slug.as_str()));
    let colors = slugs(seed.colors.iter().map(|c| c.slug.as_str()));
    let sizes = slugs(seed.sizes.iter().map(|s| s.slug.as_str()));
    let collections = slugs(seed.collections.iter().map(|c| c.slug.as_str()));

    let mut errors = Vec::new();
    let mut product_slugs = HashSet::new();
    let mut skus = HashSet::new();

    for product in &seed.products {
        let owner = product.slug.as_str();

        if !product_slugs.insert(owner) {
            errors.push(format!("{owner}: duplicate product slug"));
        }
        if product.variants.is_empty() {
            errors.push(format!("{owner}: product has no variants"));
        }
        if let Some(gender) = &product.gender {
            check_ref(&mut errors, "gender", &genders, gender, owner);
        }
        if let Some(category) = &product.category {
            check_ref(&mut errors, "category", &categories, category, owner);
        }
        if let Some(brand) = &product.brand {
            check_ref(&mut errors, "brand", &brands, brand, owner);
        }
        for collection in &product.collections {
            check_ref(&mut errors, "collection", &collections, collection, owner);
        }

        for variant in &product.variants {
            let sku = variant.sku.as_str();
            if sku != sku.to_lowercase() {
                errors.push(format!("{sku}: SKUs must be lower case"));
            }
            if !skus.insert(sku) {
                errors.push(format!("{sku}: duplicate SKU"));
            }
            check_ref(&mut errors, "color", &colors, &variant.color, sku);

            for stock in &variant.sizes {
                check_ref(&mut errors, "size", &sizes, &stock.size, sku);
                if stock.stock < 0 {
                    errors.push(format!("{sku}/{}: stock cannot be negative", stock.size));
                }
                if stock.price.amount().is_sign_negative() {
                    errors.push(format!("{sku}/{}: price cannot be negative", stock.size));
                }
                if stock.sale_price.is_some_and(|sale| sale > stock.price) {
                    errors.push(format!(
                        "{sku}/{}: sale price is above the list price",
                        stock.size
                    ));
                }
            }
        }
    }

    for coupon in &seed.coupons {
        if coupon.discount_type == DiscountType::Percentage
            && coupon.discount_value > Price::from_cents(10_000)
        {
            errors.push(format!("{}: percentage above 100", coupon.code));
        }
        if coupon.max_usage < 0 {
            errors.push(format!("{}: max_usage cannot be negative", coupon.code));
        }
    }

    errors
}

// =============================================================================
// Database
// =============================================================================

/// Row counts written by a seed run.
#[derive(Debug, Default)]
pub struct SeedSummary {
    pub lookups: usize,
    pub products: usize,
    pub variants: usize,
    pub coupons: usize,
}

const CLEAR_SQL: &str = r"
TRUNCATE storefront.product_collections, storefront.product_images,
    storefront.variant_sizes, storefront.product_variants, storefront.products,
    storefront.collections, storefront.genders, storefront.categories,
    storefront.brands, storefront.colors, storefront.sizes, storefront.coupons
CASCADE
";

async fn upsert_lookup(
    conn: &mut PgConnection,
    table: &str,
    name_column: &str,
    slug: &str,
    name: &str,
) -> Result<Uuid, sqlx::Error> {
    // Table and column names come from the fixed list in `write_catalog`.
    let sql = format!(
        "INSERT INTO storefront.{table} (slug, {name_column}) VALUES ($1, $2) \
         ON CONFLICT (slug) DO UPDATE SET {name_column} = EXCLUDED.{name_column} \
         RETURNING id"
    );
    sqlx::query_scalar(&sql)
        .bind(slug)
        .bind(name)
        .fetch_one(conn)
        .await
}

async fn write_catalog(
    conn: &mut PgConnection,
    seed: &CatalogSeed,
) -> Result<SeedSummary, sqlx::Error> {
    use std::collections::HashMap;

    let mut summary = SeedSummary::default();
    let mut ids: HashMap<(&str, &str), Uuid> = HashMap::new();

    for gender in &seed.genders {
        let id = upsert_lookup(conn, "genders", "label", &gender.slug, &gender.label).await?;
        ids.insert(("gender", gender.slug.as_str()), id);
    }
    for (kind, table, entries) in [
        ("category", "categories", &seed.categories),
        ("brand", "brands", &seed.brands),
        ("collection", "collections", &seed.collections),
    ] {
        for entry in entries {
            let id = upsert_lookup(conn, table, "name", &entry.slug, &entry.name).await?;
            ids.insert((kind, entry.slug.as_str()), id);
        }
    }
    for color in &seed.colors {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO storefront.colors (slug, name, hex_code) VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name, hex_code = EXCLUDED.hex_code \
             RETURNING id",
        )
        .bind(&color.slug)
        .bind(&color.name)
        .bind(&color.hex)
        .fetch_one(&mut *conn)
        .await?;
        ids.insert(("color", color.slug.as_str()), id);
    }
    for size in &seed.sizes {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO storefront.sizes (slug, name, sort_order) VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name, sort_order = EXCLUDED.sort_order \
             RETURNING id",
        )
        .bind(&size.slug)
        .bind(&size.name)
        .bind(size.sort_order)
        .fetch_one(&mut *conn)
        .await?;
        ids.insert(("size", size.slug.as_str()), id);
    }
    summary.lookups = ids.len();

    let lookup = |kind: &'static str, slug: Option<&String>| -> Option<Uuid> {
        slug.and_then(|s| ids.get(&(kind, s.as_str())).copied())
    };

    for product in &seed.products {
        let product_id: Uuid = sqlx::query_scalar(
            "INSERT INTO storefront.products \
                 (slug, name, description, gender_id, category_id, brand_id, is_published) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, description = EXCLUDED.description, \
                 gender_id = EXCLUDED.gender_id, category_id = EXCLUDED.category_id, \
                 brand_id = EXCLUDED.brand_id, is_published = EXCLUDED.is_published, \
                 updated_at = NOW() \
             RETURNING id",
        )
        .bind(&product.slug)
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(lookup("gender", product.gender.as_ref()))
        .bind(lookup("category", product.category.as_ref()))
        .bind(lookup("brand", product.brand.as_ref()))
        .bind(product.published)
        .fetch_one(&mut *conn)
        .await?;
        summary.products += 1;

        let mut default_variant = None;

        for variant in &product.variants {
            let variant_id: Uuid = sqlx::query_scalar(
                "INSERT INTO storefront.product_variants (product_id, sku, color_id) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (sku) DO UPDATE SET \
                     product_id = EXCLUDED.product_id, color_id = EXCLUDED.color_id \
                 RETURNING id",
            )
            .bind(product_id)
            .bind(&variant.sku)
            .bind(lookup("color", Some(&variant.color)))
            .fetch_one(&mut *conn)
            .await?;
            default_variant.get_or_insert(variant_id);
            summary.variants += 1;

            for stock in &variant.sizes {
                sqlx::query(
                    "INSERT INTO storefront.variant_sizes \
                         (variant_id, size_id, price, sale_price, in_stock) \
                     VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT (variant_id, size_id) DO UPDATE SET \
                         price = EXCLUDED.price, sale_price = EXCLUDED.sale_price, \
                         in_stock = EXCLUDED.in_stock",
                )
                .bind(variant_id)
                .bind(lookup("size", Some(&stock.size)))
                .bind(stock.price)
                .bind(stock.sale_price)
                .bind(stock.stock)
                .execute(&mut *conn)
                .await?;
            }

            sqlx::query("DELETE FROM storefront.product_images WHERE variant_id = $1")
                .bind(variant_id)
                .execute(&mut *conn)
                .await?;
            for (position, url) in (0_i32..).zip(&variant.images) {
                sqlx::query(
                    "INSERT INTO storefront.product_images (variant_id, url, sort_order, is_primary) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(variant_id)
                .bind(url)
                .bind(position)
                .bind(position == 0)
                .execute(&mut *conn)
                .await?;
            }
        }

        sqlx::query("UPDATE storefront.products SET default_variant_id = $2 WHERE id = $1")
            .bind(product_id)
            .bind(default_variant)
            .execute(&mut *conn)
            .await?;

        for collection in &product.collections {
            sqlx::query(
                "INSERT INTO storefront.product_collections (product_id, collection_id) \
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(product_id)
            .bind(lookup("collection", Some(collection)))
            .execute(&mut *conn)
            .await?;
        }
    }

    for coupon in &seed.coupons {
        sqlx::query(
            "INSERT INTO storefront.coupons \
                 (code, discount_type, discount_value, expires_at, max_usage) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (code) DO UPDATE SET \
                 discount_type = EXCLUDED.discount_type, \
                 discount_value = EXCLUDED.discount_value, \
                 expires_at = EXCLUDED.expires_at, max_usage = EXCLUDED.max_usage",
        )
        .bind(&coupon.code)
        .bind(coupon.discount_type)
        .bind(coupon.discount_value)
        .bind(coupon.expires_at)
        .bind(coupon.max_usage)
        .execute(&mut *conn)
        .await?;
        summary.coupons += 1;
    }

    Ok(summary)
}

async fn seed_database(
    pool: &PgPool,
    seed: &CatalogSeed,
    clear_existing: bool,
) -> Result<SeedSummary, sqlx::Error> {
    let mut tx = pool.begin().await?;

    if clear_existing {
        info!("Clearing existing catalog");
        sqlx::query(CLEAR_SQL).execute(&mut *tx).await?;
    }

    let summary = write_catalog(&mut tx, seed).await?;
    tx.commit().await?;

    Ok(summary)
}

/// Seed the catalog from a YAML file.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML catalog
/// * `clear_existing` - If true, empty the catalog first. This also empties
///   carts, orders and wishlists, which reference catalog rows.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, or if
/// database operations fail.
pub async fn catalog(file_path: &str, clear_existing: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;

    info!(products = seed.products.len(), "Parsed catalog");

    let errors = validate_catalog(&seed);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = super::connect().await?;
    let summary = seed_database(&pool, &seed, clear_existing).await?;

    info!("Seeding complete!");
    info!("  Lookup values: {}", summary.lookups);
    info!("  Products: {}", summary.products);
    info!("  Variants: {}", summary.variants);
    info!("  Coupons: {}", summary.coupons);

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CATALOG: &str = r##"
genders:
  - { slug: men, label: Men }
categories:
  - { slug: running, name: Running }
brands:
  - { slug: stride, name: Stride }
colors:
  - { slug: black, name: Black, hex: "#000000" }
sizes:
  - { slug: m-9, name: "M 9", sort_order: 1 }
collections:
  - { slug: new-arrivals, name: New Arrivals }
coupons:
  - code: SPRING10
    discount_type: percentage
    discount_value: "10"
    expires_at: 2030-01-01T00:00:00Z
    max_usage: 100
products:
  - slug: air-runner
    name: Air Runner
    gender: men
    category: running
    brand: stride
    collections: [new-arrivals]
    variants:
      - sku: ar-001-blk
        color: black
        images: [/static/placeholder.png]
        sizes:
          - { size: m-9, price: "90.00", stock: 5 }
"##;

    fn parse(yaml: &str) -> CatalogSeed {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_catalog() {
        let seed = parse(CATALOG);
        assert_eq!(seed.products.len(), 1);
        let product = seed.products.first().unwrap();
        assert!(product.published);
        assert_eq!(product.description, None);

        let stock = product
            .variants
            .first()
            .and_then(|v| v.sizes.first())
            .unwrap();
        assert_eq!(stock.price, Price::from_cents(9_000));
        assert_eq!(stock.sale_price, None);

        let coupon = seed.coupons.first().unwrap();
        assert_eq!(coupon.discount_type, DiscountType::Percentage);
    }

    #[test]
    fn test_valid_catalog_has_no_errors() {
        assert!(validate_catalog(&parse(CATALOG)).is_empty());
    }

    #[test]
    fn test_unknown_references_are_reported() {
        let mut seed = parse(CATALOG);
        let product = seed.products.first_mut().unwrap();
        product.brand = Some("acme".to_owned());
        let variant = product.variants.first_mut().unwrap();
        variant.color = "teal".to_owned();

        let errors = validate_catalog(&seed);
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&"air-runner: unknown brand 'acme'".to_owned()));
        assert!(errors.contains(&"ar-001-blk: unknown color 'teal'".to_owned()));
    }

    #[test]
    fn test_sku_rules() {
        let mut seed = parse(CATALOG);
        let product = seed.products.first_mut().unwrap();
        let mut duplicate = product.variants.first().unwrap().clone();
        duplicate.sku = "AR-001-BLK".to_owned();
        product.variants.push(duplicate.clone());
        duplicate.sku = "ar-001-blk".to_owned();
        product.variants.push(duplicate);

        let errors = validate_catalog(&seed);
        assert!(errors.contains(&"AR-001-BLK: SKUs must be lower case".to_owned()));
        assert!(errors.contains(&"ar-001-blk: duplicate SKU".to_owned()));
    }

    #[test]
    fn test_sale_price_above_list_price() {
        let mut seed = parse(CATALOG);
        let stock = seed
            .products
            .first_mut()
            .and_then(|p| p.variants.first_mut())
            .and_then(|v| v.sizes.first_mut())
            .unwrap();
        stock.sale_price = Some(Price::from_cents(12_000));

        assert_eq!(
            validate_catalog(&seed),
            ["ar-001-blk/m-9: sale price is above the list price"]
        );
    }
}
