//! Account route handlers: profile, order history, address book and
//! wishlist.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use stride_core::{AddressId, AddressType, OrderId, ProductId};

use crate::db::OrderRepository;
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::middleware::guest::GuestToken;
use crate::middleware::route_guard::is_safe_redirect;
use crate::models::{Address, Order, User, WishlistItem};
use crate::routes::{MessageQuery, PageContext, with_message};
use crate::services::account::{AccountError, AccountService, AddressForm};
use crate::services::auth::AuthService;
use crate::services::checkout::{CheckoutError, CheckoutService};
use crate::services::validation::FieldErrors;
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub page: PageContext,
    pub user: User,
    pub orders: Vec<Order>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Address book template. Also re-rendered with field errors when the new
/// address form fails validation.
#[derive(Template, WebTemplate)]
#[template(path = "account/addresses.html")]
pub struct AddressesTemplate {
    pub page: PageContext,
    pub addresses: Vec<Address>,
    pub type_options: Vec<TypeOption>,
    pub form: AddressForm,
    pub field_errors: FieldErrors,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// An entry of the address type select.
pub struct TypeOption {
    pub value: String,
    pub label: &'static str,
    pub selected: bool,
}

fn type_options(form: &AddressForm) -> Vec<TypeOption> {
    [AddressType::Shipping, AddressType::Billing]
        .into_iter()
        .map(|kind| TypeOption {
            value: kind.to_string(),
            label: kind.label(),
            selected: form.address_type == Some(kind),
        })
        .collect()
}

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/wishlist.html")]
pub struct WishlistTemplate {
    pub page: PageContext,
    pub items: Vec<WishlistItem>,
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Forms
// =============================================================================

/// Wishlist add/remove form, posted from the product page or the wishlist.
#[derive(Debug, Deserialize)]
pub struct WishlistForm {
    pub product_id: ProductId,
    #[serde(default)]
    pub return_to: Option<String>,
}

impl WishlistForm {
    fn back(&self) -> &str {
        self.return_to
            .as_deref()
            .filter(|target| is_safe_redirect(target))
            .unwrap_or("/account/wishlist")
    }
}

/// Turn an account error into a redirect carrying its message.
fn account_redirect(back: &str, err: AccountError) -> Result<Redirect, AppError> {
    match err {
        AccountError::Repository(_) => Err(err.into()),
        other => Ok(Redirect::to(&with_message(back, "error", &other.to_string()))),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the profile and order history.
#[instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(current_user): RequireAuth,
    guest: GuestToken,
    Query(messages): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = AuthService::new(state.pool())
        .get_user(current_user.id)
        .await?;
    let orders = OrderRepository::new(state.pool())
        .list_for_user(current_user.id)
        .await?;

    Ok(AccountIndexTemplate {
        page: PageContext::load(&state, Some(current_user), &guest).await,
        user,
        orders,
        error: messages.error,
        success: messages.success,
    })
}

/// Cancel a pending order.
#[instrument(skip(state, user))]
pub async fn cancel_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<Redirect, AppError> {
    match CheckoutService::new(state.pool(), state.catalog_cache())
        .cancel_order(user.id, order_id)
        .await
    {
        Ok(()) => {
            add_breadcrumb("account", "Order cancelled", None);
            Ok(Redirect::to(&with_message(
                "/account",
                "success",
                "Your order has been cancelled.",
            )))
        }
        Err(e @ CheckoutError::Repository(_)) => Err(e.into()),
        Err(e) => Ok(Redirect::to(&with_message("/account", "error", &e.to_string()))),
    }
}

/// Display the address book.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    guest: GuestToken,
    Query(messages): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let addresses = AccountService::new(state.pool()).addresses(user.id).await?;

    Ok(AddressesTemplate {
        page: PageContext::load(&state, Some(user), &guest).await,
        addresses,
        type_options: type_options(&AddressForm::default()),
        form: AddressForm::default(),
        field_errors: FieldErrors::new(),
        error: messages.error,
        success: messages.success,
    })
}

/// Save a new address. Invalid forms are re-rendered with their errors.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    guest: GuestToken,
    Form(form): Form<AddressForm>,
) -> Result<Response, AppError> {
    let account = AccountService::new(state.pool());

    match account.create_address(user.id, &form).await {
        Ok(_) => Ok(Redirect::to(&with_message(
            "/account/addresses",
            "success",
            "Address saved.",
        ))
        .into_response()),
        Err(AccountError::Validation(field_errors)) => {
            let addresses = account.addresses(user.id).await?;
            let page = AddressesTemplate {
                page: PageContext::load(&state, Some(user), &guest).await,
                addresses,
                type_options: type_options(&form),
                form,
                field_errors,
                error: Some("Please fix the errors below".to_owned()),
                success: None,
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete an address that no order uses.
#[instrument(skip(state, user))]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(address_id): Path<AddressId>,
) -> Result<Redirect, AppError> {
    match AccountService::new(state.pool())
        .delete_address(user.id, address_id)
        .await
    {
        Ok(()) => Ok(Redirect::to(&with_message(
            "/account/addresses",
            "success",
            "Address deleted.",
        ))),
        Err(e) => account_redirect("/account/addresses", e),
    }
}

/// Make an address the default of its type.
#[instrument(skip(state, user))]
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(address_id): Path<AddressId>,
) -> Result<Redirect, AppError> {
    match AccountService::new(state.pool())
        .set_default_address(user.id, address_id)
        .await
    {
        Ok(()) => Ok(Redirect::to("/account/addresses")),
        Err(e) => account_redirect("/account/addresses", e),
    }
}

/// Display the wishlist.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    guest: GuestToken,
    Query(messages): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let items = AccountService::new(state.pool()).wishlist(user.id).await?;

    Ok(WishlistTemplate {
        page: PageContext::load(&state, Some(user), &guest).await,
        items,
        error: messages.error,
        success: messages.success,
    })
}

/// Add a product to the wishlist. Adding twice is a no-op.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %form.product_id))]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<WishlistForm>,
) -> Result<Redirect, AppError> {
    match AccountService::new(state.pool())
        .add_to_wishlist(user.id, form.product_id)
        .await
    {
        Ok(()) => Ok(Redirect::to(&with_message(
            form.back(),
            "success",
            "Saved to your wishlist.",
        ))),
        Err(e) => account_redirect(form.back(), e),
    }
}

/// Remove a product from the wishlist.
#[instrument(skip_all, fields(user_id = %user.id, product_id = %form.product_id))]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<WishlistForm>,
) -> Result<Redirect, AppError> {
    match AccountService::new(state.pool())
        .remove_from_wishlist(user.id, form.product_id)
        .await
    {
        Ok(()) => Ok(Redirect::to(form.back())),
        Err(e) => account_redirect(form.back(), e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::header;

    use super::*;

    fn wishlist_form(return_to: Option<&str>) -> WishlistForm {
        WishlistForm {
            product_id: ProductId::generate(),
            return_to: return_to.map(str::to_owned),
        }
    }

    #[test]
    fn test_wishlist_back_defaults_to_wishlist() {
        assert_eq!(wishlist_form(None).back(), "/account/wishlist");
        assert_eq!(
            wishlist_form(Some("https://evil.example")).back(),
            "/account/wishlist"
        );
        assert_eq!(
            wishlist_form(Some("/products/air-runner/ar-001-blk")).back(),
            "/products/air-runner/ar-001-blk"
        );
    }

    #[test]
    fn test_type_options_keep_selection() {
        let form = AddressForm {
            address_type: Some(AddressType::Billing),
            ..AddressForm::default()
        };
        let options = type_options(&form);
        assert_eq!(
            options.iter().map(|o| o.value.as_str()).collect::<Vec<_>>(),
            ["shipping", "billing"]
        );
        assert!(!options.iter().any(|o| o.selected && o.value == "shipping"));
        assert!(options.iter().any(|o| o.selected && o.value == "billing"));
    }

    #[test]
    fn test_account_redirect_messages() {
        let response = account_redirect("/account/addresses", AccountError::AddressInUse)
            .unwrap()
            .into_response();
        let location = response.headers().get(header::LOCATION).unwrap();
        assert!(
            location
                .to_str()
                .unwrap()
                .starts_with("/account/addresses?error=This%20address%20is%20used")
        );
    }
}
