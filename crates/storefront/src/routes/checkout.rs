//! Checkout route handlers.
//!
//! Everything here sits behind the route guard, so the handlers also ask for
//! [`RequireAuth`] to get hold of the user.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use stride_core::{AddressId, AddressType, OrderId, PaymentMethod};

use crate::db::OrderRepository;
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::middleware::guest::GuestToken;
use crate::models::{Address, Cart, CartOwner, Order};
use crate::routes::{MessageQuery, PageContext, with_message};
use crate::services::account::AccountService;
use crate::services::cart::CartService;
use crate::services::checkout::{CheckoutError, CheckoutForm, CheckoutService};
use crate::state::AppState;

// =============================================================================
// Forms
// =============================================================================

/// Checkout form as posted. Parsed by hand so a missing or mangled field
/// comes back as a message instead of a bare 422.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutSubmission {
    #[serde(default)]
    pub shipping_address_id: String,
    #[serde(default)]
    pub billing_address_id: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub payment_method: String,
}

impl CheckoutSubmission {
    /// Parse into the service form.
    ///
    /// # Errors
    ///
    /// Returns the message to show when an address or the payment method is
    /// missing or invalid.
    pub fn parse(self) -> Result<CheckoutForm, &'static str> {
        const ADDRESS: &str = "Please choose one of your saved addresses.";

        let shipping_address_id = self
            .shipping_address_id
            .parse::<AddressId>()
            .map_err(|_| ADDRESS)?;
        let billing_address_id = self
            .billing_address_id
            .parse::<AddressId>()
            .map_err(|_| ADDRESS)?;
        let payment_method = self
            .payment_method
            .parse::<PaymentMethod>()
            .map_err(|_| "Please choose a payment method.")?;

        Ok(CheckoutForm {
            shipping_address_id,
            billing_address_id,
            coupon_code: self.coupon_code,
            payment_method,
        })
    }
}

// =============================================================================
// Templates
// =============================================================================

/// A payment method radio button.
pub struct PaymentOption {
    pub value: String,
    pub label: &'static str,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub cart: Cart,
    pub shipping_addresses: Vec<Address>,
    pub billing_addresses: Vec<Address>,
    pub payment_methods: Vec<PaymentOption>,
    pub error: Option<String>,
}

/// Order confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/confirmation.html")]
pub struct ConfirmationTemplate {
    pub page: PageContext,
    pub order: Order,
}

fn payment_options() -> Vec<PaymentOption> {
    PaymentMethod::ALL
        .into_iter()
        .map(|method| PaymentOption {
            value: method.to_string(),
            label: method.label(),
        })
        .collect()
}

/// Default addresses first, as the first option is preselected.
fn addresses_of(addresses: &[Address], kind: AddressType) -> Vec<Address> {
    let mut matching: Vec<Address> = addresses
        .iter()
        .filter(|a| a.address_type == kind)
        .cloned()
        .collect();
    matching.sort_by_key(|a| !a.is_default);
    matching
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the checkout page. An empty cart goes back to `/cart`.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    guest: GuestToken,
    Query(messages): Query<MessageQuery>,
) -> Result<Response, AppError> {
    let cart = CartService::new(state.pool())
        .view(CartOwner::User(user.id))
        .await?;

    let Some(cart) = cart.filter(|c| !c.is_empty()) else {
        return Ok(Redirect::to("/cart").into_response());
    };

    let addresses = AccountService::new(state.pool())
        .addresses(user.id)
        .await?;

    Ok(CheckoutTemplate {
        shipping_addresses: addresses_of(&addresses, AddressType::Shipping),
        billing_addresses: addresses_of(&addresses, AddressType::Billing),
        page: PageContext::load(&state, Some(user), &guest).await,
        cart,
        payment_methods: payment_options(),
        error: messages.error,
    }
    .into_response())
}

/// Place the order and show its confirmation.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(submission): Form<CheckoutSubmission>,
) -> Result<Redirect, AppError> {
    let form = match submission.parse() {
        Ok(form) => form,
        Err(message) => return Ok(Redirect::to(&with_message("/checkout", "error", message))),
    };

    match CheckoutService::new(state.pool(), state.catalog_cache())
        .place_order(user.id, &form)
        .await
    {
        Ok(order) => {
            add_breadcrumb("checkout", "Order placed", None);
            Ok(Redirect::to(&format!("/checkout/orders/{}", order.id)))
        }
        Err(CheckoutError::EmptyCart) => Ok(Redirect::to("/cart")),
        Err(e @ CheckoutError::Repository(_)) => Err(e.into()),
        Err(e) => Ok(Redirect::to(&with_message(
            "/checkout",
            "error",
            &e.to_string(),
        ))),
    }
}

/// Order confirmation. Only the order's owner can see it.
#[instrument(skip(state, user, guest))]
pub async fn confirmation(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    guest: GuestToken,
    Path(order_id): Path<OrderId>,
) -> Result<impl IntoResponse, AppError> {
    let order = OrderRepository::new(state.pool())
        .get_for_user(user.id, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

    Ok(ConfirmationTemplate {
        page: PageContext::load(&state, Some(user), &guest).await,
        order,
    })
}
