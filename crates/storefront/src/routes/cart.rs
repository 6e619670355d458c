//! Cart route handlers.
//!
//! Signed-in users own their cart directly; everyone else gets a guest
//! session, created on the first add.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use tracing::instrument;

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::middleware::guest::{GuestToken, ensure_owner, existing_owner, with_cookie};
use crate::middleware::route_guard::is_safe_redirect;
use crate::models::Cart;
use crate::routes::{MessageQuery, PageContext, with_message};
use crate::services::cart::{AddItemForm, CartError, CartService, RemoveItemForm, UpdateItemForm};
use crate::state::AppState;

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub cart: Option<Cart>,
    /// Some line asks for more than is in stock; checkout will refuse.
    pub has_stock_problem: bool,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Turn a cart error into a redirect carrying its message, or propagate it
/// when it is a server failure.
fn error_redirect(back: &str, err: CartError) -> Result<Redirect, AppError> {
    match err {
        CartError::Repository(_) => Err(err.into()),
        other => Ok(Redirect::to(&with_message(back, "error", &other.to_string()))),
    }
}

/// Display the cart page.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestToken,
    Query(messages): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let cart = match existing_owner(&state, user.as_ref(), &guest).await? {
        Some(owner) => CartService::new(state.pool()).view(owner).await?,
        None => None,
    };

    let has_stock_problem = cart
        .as_ref()
        .is_some_and(|c| c.lines.iter().any(|line| line.exceeds_stock()));

    Ok(CartShowTemplate {
        page: PageContext::load(&state, user, &guest).await,
        cart,
        has_stock_problem,
        error: messages.error,
        success: messages.success,
    })
}

/// Add a variant size to the cart.
///
/// Starts a guest session when nobody is signed in. Errors go back to the
/// page the form was posted from.
#[instrument(skip_all, fields(variant_size_id = %form.variant_size_id, quantity = form.quantity))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestToken,
    Form(form): Form<AddItemForm>,
) -> Result<Response, AppError> {
    let back = form
        .return_to
        .as_deref()
        .filter(|target| is_safe_redirect(target))
        .unwrap_or("/cart")
        .to_owned();

    let (owner, cookie) = ensure_owner(&state, user.as_ref(), &guest).await?;

    let redirect = match CartService::new(state.pool())
        .add_item(owner, form.variant_size_id, form.quantity)
        .await
    {
        Ok(_) => {
            add_breadcrumb("cart", "Added item", None);
            Redirect::to(&with_message("/cart", "success", "Added to cart"))
        }
        Err(e) => error_redirect(&back, e)?,
    };

    Ok(with_cookie(redirect.into_response(), cookie))
}

/// Change a line's quantity. Zero removes the line.
#[instrument(skip_all, fields(item_id = %form.item_id, quantity = form.quantity))]
pub async fn update(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestToken,
    Form(form): Form<UpdateItemForm>,
) -> Result<Redirect, AppError> {
    let Some(owner) = existing_owner(&state, user.as_ref(), &guest).await? else {
        return error_redirect("/cart", CartError::ItemNotFound);
    };

    match CartService::new(state.pool())
        .update_quantity(owner, form.item_id, form.quantity)
        .await
    {
        Ok(()) => Ok(Redirect::to("/cart")),
        Err(e) => error_redirect("/cart", e),
    }
}

/// Remove a line from the cart.
#[instrument(skip_all, fields(item_id = %form.item_id))]
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestToken,
    Form(form): Form<RemoveItemForm>,
) -> Result<Redirect, AppError> {
    let Some(owner) = existing_owner(&state, user.as_ref(), &guest).await? else {
        return error_redirect("/cart", CartError::ItemNotFound);
    };

    match CartService::new(state.pool())
        .remove_item(owner, form.item_id)
        .await
    {
        Ok(()) => Ok(Redirect::to("/cart")),
        Err(e) => error_redirect("/cart", e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_error_redirect_carries_message() {
        let redirect = error_redirect("/cart", CartError::InsufficientStock { available: 3 })
            .unwrap()
            .into_response();
        assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            redirect.headers().get("location").unwrap(),
            "/cart?error=Only%203%20left%20in%20stock"
        );
    }

    #[test]
    fn test_error_redirect_propagates_server_errors() {
        let err = CartError::Repository(crate::db::RepositoryError::NotFound);
        assert!(error_redirect("/cart", err).is_err());
    }
}
