//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Product listing (same as /products)
//! GET  /health                        - Liveness check
//! GET  /health/ready                  - Readiness check (database)
//!
//! # Catalog
//! GET  /products                      - Product listing with filters
//! GET  /products/{slug}               - Redirect to the default SKU
//! GET  /products/{slug}/{sku}         - Product detail
//! POST /products/{slug}/reviews       - Post a review (signed in)
//!
//! # Auth
//! GET  /sign-in  POST /sign-in        - Sign-in page / action (rate limited)
//! GET  /sign-up  POST /sign-up        - Sign-up page / action (rate limited)
//! POST /sign-out                      - Sign out
//!
//! # Cart (users and guests)
//! GET  /cart                          - Cart page
//! POST /cart/add                      - Add a variant size
//! POST /cart/update                   - Change a line's quantity
//! POST /cart/remove                   - Remove a line
//!
//! # Checkout (signed in)
//! GET  /checkout  POST /checkout      - Checkout page / place order
//! GET  /checkout/orders/{id}          - Order confirmation
//!
//! # Account (signed in)
//! GET  /account                       - Profile and order history
//! POST /account/orders/{id}/cancel    - Cancel a pending order
//! GET  /account/addresses  POST       - Address book / add address
//! POST /account/addresses/{id}/delete - Delete an address
//! POST /account/addresses/{id}/default - Make an address the default
//! GET  /account/wishlist              - Wishlist
//! POST /account/wishlist/add|remove   - Wishlist changes
//!
//! # JSON API
//! GET  /api/products                  - Listing (same filters as /products)
//! GET  /api/products/{slug}           - Product detail
//! GET  /api/filters                   - Filter sidebar options
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::warn;

use crate::middleware::auth_rate_limiter;
use crate::middleware::guest::{GuestToken, existing_owner};
use crate::models::CurrentUser;
use crate::services::cart::CartService;
use crate::state::AppState;

// =============================================================================
// Shared page data
// =============================================================================

/// Data every page layout needs: store name, signed-in user, cart badge.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub app_name: String,
    pub user: Option<CurrentUser>,
    pub cart_count: i32,
}

impl PageContext {
    /// Build the layout context. A failing cart lookup only hides the badge.
    pub async fn load(state: &AppState, user: Option<CurrentUser>, guest: &GuestToken) -> Self {
        let cart_count = match existing_owner(state, user.as_ref(), guest).await {
            Ok(Some(owner)) => CartService::new(state.pool())
                .item_count(owner)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Failed to count cart items");
                    0
                }),
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "Failed to resolve cart owner");
                0
            }
        };

        Self {
            app_name: state.config().app_name.clone(),
            user,
            cart_count,
        }
    }

    /// `<title>` text: `"Cart | Stride"`.
    #[must_use]
    pub fn title(&self, page: &str) -> String {
        if page.is_empty() {
            self.app_name.clone()
        } else {
            format!("{page} | {}", self.app_name)
        }
    }
}

/// Query parameters carrying a one-off message after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Append a `key=message` parameter to a local URL.
#[must_use]
pub fn with_message(path: &str, key: &str, message: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{key}={}", urlencoding::encode(message))
}

// =============================================================================
// Routers
// =============================================================================

/// Create the auth routes router. The form posts are rate limited.
pub fn auth_routes() -> Router<AppState> {
    let mut actions = Router::new()
        .route("/sign-in", post(auth::sign_in))
        .route("/sign-up", post(auth::sign_up));

    match auth_rate_limiter() {
        Some(limiter) => actions = actions.layer(limiter),
        None => warn!("Auth rate limiter disabled: invalid governor configuration"),
    }

    Router::new()
        .route("/sign-in", get(auth::sign_in_page))
        .route("/sign-up", get(auth::sign_up_page))
        .route("/sign-out", post(auth::sign_out))
        .merge(actions)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show_default))
        .route("/{slug}/reviews", post(products::add_review))
        .route("/{slug}/{sku}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::place_order))
        .route("/orders/{id}", get(checkout::confirmation))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/orders/{id}/cancel", post(account::cancel_order))
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route("/addresses/{id}/delete", post(account::delete_address))
        .route("/addresses/{id}/default", post(account::set_default_address))
        .route("/wishlist", get(account::wishlist))
        .route("/wishlist/add", post(account::add_to_wishlist))
        .route("/wishlist/remove", post(account::remove_from_wishlist))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(api::products::index))
        .route("/products/{slug}", get(api::products::show))
        .route("/filters", get(api::products::filters))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .merge(auth_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/account", account_routes())
        .nest("/api", api_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_message() {
        assert_eq!(
            with_message("/cart", "error", "Only 2 left in stock"),
            "/cart?error=Only%202%20left%20in%20stock"
        );
        assert_eq!(
            with_message("/products?gender=men", "success", "ok"),
            "/products?gender=men&success=ok"
        );
    }

    #[test]
    fn test_page_title() {
        let page = PageContext {
            app_name: "Stride".to_owned(),
            ..PageContext::default()
        };
        assert_eq!(page.title("Cart"), "Cart | Stride");
        assert_eq!(page.title(""), "Stride");
    }
}
