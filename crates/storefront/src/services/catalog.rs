//! Catalog reads behind the cache.
//!
//! Database failures are logged and turned into empty results so a broken
//! lookup never takes the shop page down.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{error, instrument};

use stride_core::{FilterKind, ProductFilters, ProductId};

use crate::cache::{CacheKey, CacheValue, CatalogCache};
use crate::db::{CatalogRepository, ProductRepository};
use crate::models::{FilterOption, FilterOptions, Product, ProductListing};

/// How many related products the detail page shows.
pub const RELATED_LIMIT: i64 = 4;

/// Cached catalog queries.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a CatalogCache) -> Self {
        Self { pool, cache }
    }

    /// Published products matching the filters.
    #[instrument(skip(self))]
    pub async fn get_products(&self, filters: &ProductFilters) -> Arc<ProductListing> {
        let key = CacheKey::Listing(filters.clone());
        if let Some(CacheValue::Listing(listing)) = self.cache.get(&key).await {
            return listing;
        }

        match ProductRepository::new(self.pool).list(filters).await {
            Ok(listing) => {
                let listing = Arc::new(listing);
                self.cache
                    .insert(key, CacheValue::Listing(Arc::clone(&listing)))
                    .await;
                listing
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch products");
                Arc::new(ProductListing::default())
            }
        }
    }

    /// A published product by slug, with every variant.
    #[instrument(skip(self))]
    pub async fn get_product(&self, slug: &str) -> Option<Arc<Product>> {
        let key = CacheKey::Product(slug.to_owned());
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            return product;
        }

        match ProductRepository::new(self.pool).get_by_slug(slug).await {
            Ok(product) => {
                let product = product.map(Arc::new);
                self.cache
                    .insert(key, CacheValue::Product(product.clone()))
                    .await;
                product
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch product");
                None
            }
        }
    }

    /// In-stock products from the same category, newest first.
    #[instrument(skip(self))]
    pub async fn get_related(&self, product_id: ProductId) -> Arc<Vec<Product>> {
        let key = CacheKey::Related(product_id);
        if let Some(CacheValue::Related(products)) = self.cache.get(&key).await {
            return products;
        }

        match ProductRepository::new(self.pool)
            .related(product_id, RELATED_LIMIT)
            .await
        {
            Ok(products) => {
                let products = Arc::new(products);
                self.cache
                    .insert(key, CacheValue::Related(Arc::clone(&products)))
                    .await;
                products
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch related products");
                Arc::new(Vec::new())
            }
        }
    }

    /// One filter option list.
    #[instrument(skip(self))]
    pub async fn get_filter_options(&self, kind: FilterKind) -> Arc<Vec<FilterOption>> {
        let key = CacheKey::Filter(kind);
        if let Some(CacheValue::Filter(options)) = self.cache.get(&key).await {
            return options;
        }

        match CatalogRepository::new(self.pool).options(kind).await {
            Ok(options) => {
                let options = Arc::new(options);
                self.cache
                    .insert(key, CacheValue::Filter(Arc::clone(&options)))
                    .await;
                options
            }
            Err(e) => {
                error!(error = %e, %kind, "Failed to fetch filter options");
                Arc::new(Vec::new())
            }
        }
    }

    /// Every sidebar option list, fetched concurrently.
    pub async fn get_all_filter_options(&self) -> FilterOptions {
        let (genders, categories, brands, colors, sizes) = tokio::join!(
            self.get_filter_options(FilterKind::Genders),
            self.get_filter_options(FilterKind::Categories),
            self.get_filter_options(FilterKind::Brands),
            self.get_filter_options(FilterKind::Colors),
            self.get_filter_options(FilterKind::Sizes),
        );

        FilterOptions {
            genders: genders.to_vec(),
            categories: categories.to_vec(),
            brands: brands.to_vec(),
            colors: colors.to_vec(),
            sizes: sizes.to_vec(),
            price_ranges: FilterOptions::price_ranges(),
        }
    }
}
