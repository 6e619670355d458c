//! In-memory catalog cache.
//!
//! Catalog reads are cached with `moka` and expire after the configured TTL.
//! Every entry carries tags; writes that change the catalog invalidate by
//! tag so readers never see stale stock after checkout.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, warn};

use stride_core::{FilterKind, ProductFilters, ProductId};

use crate::models::{FilterOption, Product, ProductListing};

/// Cache key for catalog queries.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Listing(ProductFilters),
    Product(String),
    Related(ProductId),
    Filter(FilterKind),
}

/// Invalidation tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTag {
    /// Listings, details and related products.
    Products,
    /// Every filter option list.
    Filters,
    /// One filter option list.
    Filter(FilterKind),
}

impl CacheKey {
    #[must_use]
    pub fn has_tag(&self, tag: CacheTag) -> bool {
        match (self, tag) {
            (Self::Listing(_) | Self::Product(_) | Self::Related(_), CacheTag::Products)
            | (Self::Filter(_), CacheTag::Filters) => true,
            (Self::Filter(kind), CacheTag::Filter(tagged)) => *kind == tagged,
            _ => false,
        }
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Listing(Arc<ProductListing>),
    Product(Option<Arc<Product>>),
    Related(Arc<Vec<Product>>),
    Filter(Arc<Vec<FilterOption>>),
}

/// Catalog query cache shared through [`crate::state::AppState`].
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let value = self.cache.get(key).await;
        if value.is_some() {
            debug!(?key, "Catalog cache hit");
        }
        value
    }

    pub async fn insert(&self, key: CacheKey, value: CacheValue) {
        self.cache.insert(key, value).await;
    }

    /// Drop every entry carrying `tag`.
    pub fn invalidate_tag(&self, tag: CacheTag) {
        if let Err(e) = self
            .cache
            .invalidate_entries_if(move |key, _| key.has_tag(tag))
        {
            warn!(error = %e, ?tag, "Failed to register cache invalidation");
        }
    }

    /// Call after creating, updating or deleting products, or changing stock.
    pub fn invalidate_products(&self) {
        self.invalidate_tag(CacheTag::Products);
    }

    /// Call after modifying any filter lookup table.
    pub fn invalidate_filters(&self) {
        self.invalidate_tag(CacheTag::Filters);
    }

    pub fn invalidate_filter(&self, kind: FilterKind) {
        self.invalidate_tag(CacheTag::Filter(kind));
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
