//! Catalog route handlers: listing, product detail and reviews.

use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, instrument};

use stride_core::{Facet, ProductFilters, ProductQuery, SortOrder};

use crate::db::{ProductRepository, ReviewRepository};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::auth::{OptionalAuth, sign_in_url};
use crate::middleware::guest::GuestToken;
use crate::models::catalog::product_path;
use crate::models::{
    FilterOption, FilterOptions, Product, ProductListing, Review, ReviewSummary, Variant,
};
use crate::routes::{MessageQuery, PageContext, with_message};
use crate::services::account::{AccountError, AccountService, ReviewForm};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

// =============================================================================
// View Types
// =============================================================================

/// One checkbox in the filter sidebar.
#[derive(Clone)]
pub struct FacetOptionView {
    pub label: String,
    /// Listing URL with this option toggled.
    pub href: String,
    pub selected: bool,
}

/// A group of checkboxes in the filter sidebar.
#[derive(Clone)]
pub struct FacetView {
    pub title: &'static str,
    pub options: Vec<FacetOptionView>,
}

/// An entry of the sort menu.
#[derive(Clone)]
pub struct SortView {
    pub label: &'static str,
    pub href: String,
    pub selected: bool,
}

/// A colour swatch on the detail page.
#[derive(Clone)]
pub struct SwatchView {
    pub color: String,
    pub href: String,
    pub image_url: String,
    pub selected: bool,
}

fn listing_href(filters: &ProductFilters) -> String {
    format!("/products{}", filters.to_query_string())
}

fn facet_view(
    title: &'static str,
    facet: Facet,
    options: &[FilterOption],
    filters: &ProductFilters,
) -> FacetView {
    FacetView {
        title,
        options: options
            .iter()
            .map(|option| FacetOptionView {
                label: option.label.clone(),
                href: listing_href(&filters.toggled(facet, &option.value)),
                selected: filters.is_selected(facet, &option.value),
            })
            .collect(),
    }
}

/// Sidebar groups, in display order. Empty groups are dropped.
#[must_use]
pub fn facet_views(options: &FilterOptions, filters: &ProductFilters) -> Vec<FacetView> {
    [
        facet_view("Gender", Facet::Gender, &options.genders, filters),
        facet_view("Category", Facet::Category, &options.categories, filters),
        facet_view("Price", Facet::Price, &options.price_ranges, filters),
        facet_view("Brand", Facet::Brand, &options.brands, filters),
        facet_view("Color", Facet::Color, &options.colors, filters),
        facet_view("Size", Facet::Size, &options.sizes, filters),
    ]
    .into_iter()
    .filter(|group| !group.options.is_empty())
    .collect()
}

#[must_use]
pub fn sort_views(filters: &ProductFilters) -> Vec<SortView> {
    SortOrder::ALL
        .into_iter()
        .map(|sort| SortView {
            label: sort.label(),
            href: listing_href(&filters.with_sort(sort)),
            selected: filters.sort == sort,
        })
        .collect()
}

// =============================================================================
// Templates
// =============================================================================

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: PageContext,
    pub listing: Arc<ProductListing>,
    pub facets: Vec<FacetView>,
    pub sorts: Vec<SortView>,
    pub search: String,
    pub active_count: usize,
    pub is_filtered: bool,
    pub clear_href: String,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: Arc<Product>,
    pub variant: Variant,
    pub swatches: Vec<SwatchView>,
    pub related: Arc<Vec<Product>>,
    pub reviews: Vec<Review>,
    pub summary: ReviewSummary,
    pub wishlisted: bool,
    pub current_path: String,
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the product listing (`/` and `/products`).
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestToken,
    Query(query): Query<ProductQuery>,
) -> impl IntoResponse {
    let filters = ProductFilters::from_query(&query);
    let catalog = CatalogService::new(state.pool(), state.catalog_cache());

    let (listing, options, page) = tokio::join!(
        catalog.get_products(&filters),
        catalog.get_all_filter_options(),
        PageContext::load(&state, user, &guest),
    );

    ProductsIndexTemplate {
        page,
        listing,
        facets: facet_views(&options, &filters),
        sorts: sort_views(&filters),
        search: filters.search.clone().unwrap_or_default(),
        active_count: filters.active_count(),
        is_filtered: filters.is_filtered(),
        clear_href: listing_href(&filters.cleared()),
    }
}

/// `/products/{slug}`: send the visitor to the default SKU.
#[instrument(skip(state))]
pub async fn show_default(State(state): State<AppState>, Path(slug): Path<String>) -> Redirect {
    let catalog = CatalogService::new(state.pool(), state.catalog_cache());

    match catalog.get_product(&slug).await {
        Some(product) => match product.default_sku() {
            Some(sku) => Redirect::to(&product_path(&product.slug, sku)),
            None => Redirect::to("/"),
        },
        None => Redirect::to("/"),
    }
}

/// Display a product with one variant selected.
///
/// Unknown products redirect to `/`; an SKU that does not belong to the
/// product redirects to the default SKU, or to `/` when there is none.
#[instrument(skip(state, user, guest, messages))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestToken,
    Path((slug, sku)): Path<(String, String)>,
    Query(messages): Query<MessageQuery>,
) -> Response {
    let catalog = CatalogService::new(state.pool(), state.catalog_cache());

    let Some(product) = catalog.get_product(&slug).await else {
        return Redirect::to("/").into_response();
    };

    let Some(variant) = product.variant_by_sku(&sku).cloned() else {
        return match product.default_sku() {
            Some(default_sku) => Redirect::to(&product_path(&product.slug, default_sku)),
            None => Redirect::to("/"),
        }
        .into_response();
    };

    let reviews = ReviewRepository::new(state.pool());
    let (related, review_list, summary) = tokio::join!(
        catalog.get_related(product.id),
        reviews.list_for_product(product.id),
        reviews.summary(product.id),
    );

    let review_list = review_list.unwrap_or_else(|e| {
        error!(error = %e, product_id = %product.id, "Failed to load reviews");
        Vec::new()
    });
    let summary = summary.unwrap_or_else(|e| {
        error!(error = %e, product_id = %product.id, "Failed to load review summary");
        ReviewSummary {
            count: 0,
            average: None,
        }
    });

    let wishlisted = match &user {
        Some(user) => AccountService::new(state.pool())
            .is_wishlisted(user.id, product.id)
            .await
            .unwrap_or(false),
        None => false,
    };

    let swatches = product
        .variants
        .iter()
        .map(|v| SwatchView {
            color: v.color.clone(),
            href: product_path(&product.slug, &v.sku),
            image_url: v.image_url().to_owned(),
            selected: v.id == variant.id,
        })
        .collect();

    let page = PageContext::load(&state, user, &guest).await;

    ProductShowTemplate {
        page,
        current_path: product_path(&product.slug, &variant.sku),
        product,
        variant,
        swatches,
        related,
        reviews: review_list,
        summary,
        wishlisted,
        error: messages.error,
        success: messages.success,
    }
    .into_response()
}

/// Review form, posted from the detail page.
#[derive(Debug, Deserialize)]
pub struct ReviewSubmission {
    #[serde(default)]
    pub rating: i32,
    #[serde(default)]
    pub comment: String,
    /// SKU of the page the form was on.
    #[serde(default)]
    pub sku: String,
}

/// Post a review. One review per user per product.
#[instrument(skip(state, user, form))]
pub async fn add_review(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<String>,
    Form(form): Form<ReviewSubmission>,
) -> Result<Redirect, AppError> {
    let back = product_path(&slug, &form.sku);

    let Some(user) = user else {
        return Ok(Redirect::to(&sign_in_url(&back)));
    };

    let Some(product_id) = ProductRepository::new(state.pool())
        .id_by_slug(&slug)
        .await?
    else {
        return Ok(Redirect::to("/"));
    };

    let review = ReviewForm {
        rating: form.rating,
        comment: form.comment,
    };

    match AccountService::new(state.pool())
        .add_review(user.id, product_id, &review)
        .await
    {
        Ok(()) => {
            add_breadcrumb("review", "Posted review", Some(&[("product", slug.as_str())]));
            Ok(Redirect::to(&with_message(
                &back,
                "success",
                "Thanks for your review!",
            )))
        }
        Err(AccountError::Validation(errors)) => {
            let message = errors
                .first("rating")
                .or_else(|| errors.first("comment"))
                .unwrap_or("Please fix the errors below");
            Ok(Redirect::to(&with_message(&back, "error", message)))
        }
        Err(e @ AccountError::AlreadyReviewed) => {
            Ok(Redirect::to(&with_message(&back, "error", &e.to_string())))
        }
        Err(e) => Err(e.into()),
    }
}
