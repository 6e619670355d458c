//! Catalog domain types.
//!
//! Variants, sizes and images are aggregated to JSON inside `PostgreSQL`
//! (see [`crate::db::products`]) and deserialized straight into these types,
//! so their serde field names are the JSON keys the query builds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stride_core::{
    ImageId, Price, PriceBucket, PriceRange, ProductId, VariantId, VariantSizeId,
};

/// Image shown when a variant has no photos.
pub const PLACEHOLDER_IMAGE: &str = "/static/placeholder.png";

/// `/products/{slug}` with the slug percent-encoded.
#[must_use]
pub fn product_slug_path(slug: &str) -> String {
    format!("/products/{}", urlencoding::encode(slug))
}

/// Detail page path `/products/{slug}/{sku}` with both segments
/// percent-encoded.
#[must_use]
pub fn product_path(slug: &str, sku: &str) -> String {
    format!("{}/{}", product_slug_path(slug), urlencoding::encode(sku))
}

/// A priced, stocked size of a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSize {
    pub id: VariantSizeId,
    pub in_stock: i32,
    pub price: Price,
    pub sale_price: Option<Price>,
    /// Size name, e.g. `"M 9 / W 10.5"`.
    pub size: String,
}

impl VariantSize {
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.in_stock > 0
    }

    /// Price the customer pays: the sale price when one is set.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        self.sale_price.unwrap_or(self.price)
    }

    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.sale_price.is_some_and(|sale| sale < self.price)
    }
}

/// A variant photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: ImageId,
    pub is_primary: bool,
    pub url: String,
    pub order: i32,
}

/// A colour-specific SKU grouping of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    /// Lower-cased SKU; also the last path segment of the detail URL.
    pub sku: String,
    pub color: String,
    pub images: Vec<Image>,
    /// Sizes ordered by the size table's `sort_order`.
    pub sizes: Vec<VariantSize>,
}

impl Variant {
    /// First size with stock, in size order.
    #[must_use]
    pub fn first_available_size(&self) -> Option<&VariantSize> {
        self.sizes.iter().find(|s| s.is_available())
    }

    pub fn available_sizes(&self) -> impl Iterator<Item = &VariantSize> {
        self.sizes.iter().filter(|s| s.is_available())
    }

    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        self.first_available_size().is_some()
    }

    /// URL of the first image (images are ordered by `sort_order`).
    #[must_use]
    pub fn image_url(&self) -> &str {
        self.images
            .first()
            .map_or(PLACEHOLDER_IMAGE, |img| img.url.as_str())
    }

    #[must_use]
    pub fn size(&self, id: VariantSizeId) -> Option<&VariantSize> {
        self.sizes.iter().find(|s| s.id == id)
    }
}

/// A product with its aggregated variants.
///
/// `price_range` is only present on listing rows, where it spans the sizes
/// that survived the stock and price filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub gender: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub default_variant_id: Option<VariantId>,
    pub variants: Vec<Variant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceRange>,
}

impl Product {
    /// SKU of the variant referenced by `default_variant_id`, if it exists.
    #[must_use]
    pub fn default_sku(&self) -> Option<&str> {
        self.default_variant_id.and_then(|default_id| {
            self.variants
                .iter()
                .find(|v| v.id == default_id)
                .map(|v| v.sku.as_str())
        })
    }

    /// Whether any variant carries exactly this SKU.
    #[must_use]
    pub fn is_valid_sku(&self, sku: &str) -> bool {
        self.variants.iter().any(|v| v.sku == sku)
    }

    #[must_use]
    pub fn variant_by_sku(&self, sku: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.sku == sku)
    }

    /// Variant used to represent the product in a grid: the default variant
    /// when it survived filtering, otherwise the first one.
    #[must_use]
    pub fn listing_variant(&self) -> Option<&Variant> {
        self.default_variant_id
            .and_then(|default_id| self.variants.iter().find(|v| v.id == default_id))
            .or_else(|| self.variants.first())
    }

    /// Detail page URL for the listing variant.
    #[must_use]
    pub fn href(&self) -> String {
        match self.listing_variant() {
            Some(variant) => product_path(&self.slug, &variant.sku),
            None => product_slug_path(&self.slug),
        }
    }

    /// Review form target.
    #[must_use]
    pub fn reviews_href(&self) -> String {
        format!("{}/reviews", product_slug_path(&self.slug))
    }

    #[must_use]
    pub fn thumbnail_url(&self) -> &str {
        self.listing_variant()
            .map_or(PLACEHOLDER_IMAGE, Variant::image_url)
    }

    /// Grid price label, e.g. `$90.00` or `$90.00 - $120.00`.
    #[must_use]
    pub fn price_label(&self) -> String {
        self.price_range
            .map(|range| range.to_string())
            .unwrap_or_default()
    }

    /// Number of colours on offer, for the "N Colors" grid subtitle.
    #[must_use]
    pub fn color_count(&self) -> usize {
        self.variants.len()
    }
}

/// Result of a listing query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductListing {
    pub total: usize,
    pub products: Vec<Product>,
}

/// A checkbox in the filter sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

/// Every option list shown in the filter sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub genders: Vec<FilterOption>,
    pub categories: Vec<FilterOption>,
    pub brands: Vec<FilterOption>,
    pub colors: Vec<FilterOption>,
    pub sizes: Vec<FilterOption>,
    pub price_ranges: Vec<FilterOption>,
}

impl FilterOptions {
    /// The fixed price bucket list.
    #[must_use]
    pub fn price_ranges() -> Vec<FilterOption> {
        PriceBucket::ALL
            .into_iter()
            .map(|bucket| FilterOption {
                value: bucket.slug().to_owned(),
                label: bucket.label().to_owned(),
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn size(name: &str, in_stock: i32, cents: i64) -> VariantSize {
        VariantSize {
            id: VariantSizeId::generate(),
            in_stock,
            price: Price::from_cents(cents),
            sale_price: None,
            size: name.to_owned(),
        }
    }

    pub(crate) fn variant(sku: &str, color: &str, sizes: Vec<VariantSize>) -> Variant {
        Variant {
            id: VariantId::generate(),
            sku: sku.to_owned(),
            color: color.to_owned(),
            images: vec![Image {
                id: ImageId::generate(),
                is_primary: true,
                url: format!("/static/products/{sku}.jpg"),
                order: 0,
            }],
            sizes,
        }
    }

    pub(crate) fn product(variants: Vec<Variant>, default_index: Option<usize>) -> Product {
        let default_variant_id = default_index.map(|i| variants[i].id);
        Product {
            id: ProductId::generate(),
            slug: "air-runner".to_owned(),
            name: "Air Runner".to_owned(),
            description: Some("Daily trainer".to_owned()),
            created_at: Utc::now(),
            gender: Some("Men".to_owned()),
            category: Some("Running".to_owned()),
            brand: Some("Stride".to_owned()),
            default_variant_id,
            variants,
            price_range: None,
        }
    }

    #[test]
    fn test_default_sku_follows_default_variant_id() {
        let p = product(
            vec![
                variant("ar-001-blk", "Black", vec![]),
                variant("ar-001-wht", "White", vec![]),
            ],
            Some(1),
        );
        assert_eq!(p.default_sku(), Some("ar-001-wht"));
    }

    #[test]
    fn test_default_sku_none_without_default() {
        let p = product(vec![variant("ar-001-blk", "Black", vec![])], None);
        assert_eq!(p.default_sku(), None);
    }

    #[test]
    fn test_is_valid_sku_is_exact() {
        let p = product(vec![variant("ar-001-blk", "Black", vec![])], Some(0));
        assert!(p.is_valid_sku("ar-001-blk"));
        assert!(!p.is_valid_sku("AR-001-BLK"));
        assert!(!p.is_valid_sku("ar-001"));
    }

    #[test]
    fn test_listing_variant_falls_back_to_first() {
        let mut p = product(
            vec![
                variant("ar-001-blk", "Black", vec![]),
                variant("ar-001-wht", "White", vec![]),
            ],
            None,
        );
        assert_eq!(p.listing_variant().unwrap().sku, "ar-001-blk");
        assert_eq!(p.href(), "/products/air-runner/ar-001-blk");

        p.default_variant_id = Some(p.variants[1].id);
        assert_eq!(p.href(), "/products/air-runner/ar-001-wht");
    }

    #[test]
    fn test_product_urls_encode_segments() {
        assert_eq!(
            product_path("air-runner", "ar-001-blk"),
            "/products/air-runner/ar-001-blk"
        );
        assert_eq!(product_path("a b", "x/y"), "/products/a%20b/x%2Fy");
        assert_eq!(product_slug_path("air runner"), "/products/air%20runner");

        let mut p = product(vec![variant("ar 001/blk", "Black", vec![])], Some(0));
        p.slug = "air runner".to_owned();
        assert_eq!(p.href(), "/products/air%20runner/ar%20001%2Fblk");
        assert_eq!(p.reviews_href(), "/products/air%20runner/reviews");

        p.variants.clear();
        assert_eq!(p.href(), "/products/air%20runner");
    }

    #[test]
    fn test_thumbnail_placeholder() {
        let mut v = variant("ar-001-blk", "Black", vec![]);
        v.images.clear();
        let p = product(vec![v], Some(0));
        assert_eq!(p.thumbnail_url(), PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_first_available_size_skips_sold_out() {
        let v = variant(
            "ar-001-blk",
            "Black",
            vec![size("7", 0, 9_000), size("8", 3, 9_500), size("9", 1, 9_500)],
        );
        assert_eq!(v.first_available_size().unwrap().size, "8");
        assert_eq!(v.available_sizes().count(), 2);
    }

    #[test]
    fn test_effective_price_prefers_sale() {
        let mut s = size("8", 1, 12_000);
        assert_eq!(s.effective_price(), Price::from_cents(12_000));
        s.sale_price = Some(Price::from_cents(9_000));
        assert_eq!(s.effective_price(), Price::from_cents(9_000));
        assert!(s.is_on_sale());
    }

    #[test]
    fn test_variant_json_shape() {
        let json = r#"{
            "id": "6f1c1d1e-0000-4000-8000-000000000001",
            "sku": "ar-001-blk",
            "color": "Black",
            "images": [{"id": "6f1c1d1e-0000-4000-8000-000000000002", "isPrimary": true, "url": "/a.jpg", "order": 0}],
            "sizes": [{"id": "6f1c1d1e-0000-4000-8000-000000000003", "inStock": 4, "price": "110.00", "salePrice": null, "size": "9"}]
        }"#;
        let v: Variant = serde_json::from_str(json).unwrap();
        assert_eq!(v.sizes[0].price, Price::from_cents(11_000));
        assert_eq!(v.sizes[0].sale_price, None);
        assert_eq!(v.image_url(), "/a.jpg");
    }

    #[test]
    fn test_price_ranges_fixed_list() {
        let ranges = FilterOptions::price_ranges();
        let values: Vec<&str> = ranges.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, ["0-50", "50-100", "100-150", "150-plus"]);
        assert_eq!(ranges[3].label, "Over $150");
    }
}
