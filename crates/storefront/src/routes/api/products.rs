//! Catalog JSON endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;
use tracing::instrument;

use stride_core::{ProductFilters, ProductQuery};

use super::ApiError;
use crate::models::{FilterOptions, Product, ProductListing};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// `GET /api/products` response.
#[derive(Debug, Serialize)]
pub struct ListingResponse {
    /// The normalized filters the listing was built from.
    pub filters: ProductFilters,
    #[serde(flatten)]
    pub listing: Arc<ProductListing>,
}

/// `GET /api/products/{slug}` response.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub product: Arc<Product>,
    pub related: Arc<Vec<Product>>,
}

/// Product listing with the same query parameters as `/products`.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Json<ListingResponse> {
    let filters = ProductFilters::from_query(&query);
    let listing = CatalogService::new(state.pool(), state.catalog_cache())
        .get_products(&filters)
        .await;

    Json(ListingResponse { filters, listing })
}

/// A published product with its related products.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let catalog = CatalogService::new(state.pool(), state.catalog_cache());

    let product = catalog
        .get_product(&slug)
        .await
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    let related = catalog.get_related(product.id).await;

    Ok(Json(ProductResponse { product, related }))
}

/// Every option list of the filter sidebar.
#[instrument(skip(state))]
pub async fn filters(State(state): State<AppState>) -> Json<FilterOptions> {
    Json(
        CatalogService::new(state.pool(), state.catalog_cache())
            .get_all_filter_options()
            .await,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    #[test]
    fn test_listing_response_flattens_listing() {
        let response = ListingResponse {
            filters: ProductFilters::default(),
            listing: Arc::new(ProductListing::default()),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["total"], 0);
        assert!(json["products"].as_array().unwrap().is_empty());
        assert_eq!(json["filters"]["sort"], "featured");
    }

    #[test]
    fn test_not_found_error_status() {
        let response = ApiError::not_found("Product not found").into_response();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
