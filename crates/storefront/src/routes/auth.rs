//! Authentication route handlers.
//!
//! Email and password sign-up and sign-in. On success the guest cart, if
//! any, is merged into the user's cart and the guest session ends.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, instrument, warn};

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::guest::{GuestToken, adopt_guest_cart, with_cookie};
use crate::middleware::route_guard::is_safe_redirect;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::PageContext;
use crate::services::auth::{AuthActionState, AuthError, AuthService, SignInForm, SignUpForm};
use crate::state::AppState;

// =============================================================================
// Query Types
// =============================================================================

/// `?redirect=` carried through the auth pages.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    pub redirect: Option<String>,
}

fn safe_target(redirect: Option<&str>) -> String {
    redirect
        .filter(|target| is_safe_redirect(target))
        .unwrap_or("/")
        .to_owned()
}

// =============================================================================
// Templates
// =============================================================================

/// Sign-in page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/sign_in.html")]
pub struct SignInTemplate {
    pub page: PageContext,
    pub state: AuthActionState,
    pub email: String,
    pub redirect: String,
}

/// Sign-up page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/sign_up.html")]
pub struct SignUpTemplate {
    pub page: PageContext,
    pub state: AuthActionState,
    pub name: String,
    pub email: String,
    pub redirect: String,
}

/// Status for a re-rendered form.
fn failure_status(err: &AuthError) -> StatusCode {
    if err.is_server_error() {
        error!(error = %err, "Authentication failed");
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        match err {
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::UserAlreadyExists => StatusCode::CONFLICT,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the sign-in page.
pub async fn sign_in_page(
    State(state): State<AppState>,
    guest: GuestToken,
    Query(query): Query<RedirectQuery>,
) -> impl IntoResponse {
    SignInTemplate {
        page: PageContext::load(&state, None, &guest).await,
        state: AuthActionState::default(),
        email: String::new(),
        redirect: safe_target(query.redirect.as_deref()),
    }
}

/// Display the sign-up page.
pub async fn sign_up_page(
    State(state): State<AppState>,
    guest: GuestToken,
    Query(query): Query<RedirectQuery>,
) -> impl IntoResponse {
    SignUpTemplate {
        page: PageContext::load(&state, None, &guest).await,
        state: AuthActionState::default(),
        name: String::new(),
        email: String::new(),
        redirect: safe_target(query.redirect.as_deref()),
    }
}

/// Put the user in the session, adopt the guest cart and redirect.
async fn complete_sign_in(
    state: &AppState,
    session: &Session,
    guest: &GuestToken,
    user: &User,
    redirect: Option<&str>,
) -> Result<Response, AuthError> {
    let current_user = CurrentUser::from(user);
    set_current_user(session, &current_user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    let removal = adopt_guest_cart(state, &current_user, guest).await;
    let response = Redirect::to(&safe_target(redirect)).into_response();

    Ok(with_cookie(response, removal))
}

/// Handle sign-in form submission.
#[instrument(skip_all)]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    guest: GuestToken,
    Form(form): Form<SignInForm>,
) -> Response {
    let result = match AuthService::new(state.pool()).sign_in(&form).await {
        Ok(user) => {
            complete_sign_in(&state, &session, &guest, &user, form.redirect.as_deref()).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Sign-in failed");
            let status = failure_status(&e);
            let page = SignInTemplate {
                page: PageContext::load(&state, None, &guest).await,
                state: AuthActionState::from_error(&e),
                email: form.email.trim().to_owned(),
                redirect: safe_target(form.redirect.as_deref()),
            };
            (status, page).into_response()
        }
    }
}

/// Handle sign-up form submission. A new account is signed in straight away.
#[instrument(skip_all)]
pub async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    guest: GuestToken,
    Form(form): Form<SignUpForm>,
) -> Response {
    let result = match AuthService::new(state.pool()).sign_up(&form).await {
        Ok(user) => {
            complete_sign_in(&state, &session, &guest, &user, form.redirect.as_deref()).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Sign-up failed");
            let status = failure_status(&e);
            let page = SignUpTemplate {
                page: PageContext::load(&state, None, &guest).await,
                state: AuthActionState::from_error(&e),
                name: form.name.trim().to_owned(),
                email: form.email.trim().to_owned(),
                redirect: safe_target(form.redirect.as_deref()),
            };
            (status, page).into_response()
        }
    }
}

/// Handle sign-out. Clears the session and returns to the sign-in page.
pub async fn sign_out(session: Session) -> Redirect {
    if let Err(e) = clear_current_user(&session).await {
        error!(error = %e, "Failed to clear session");
    }
    clear_sentry_user();

    Redirect::to("/sign-in")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_target() {
        assert_eq!(safe_target(Some("/checkout")), "/checkout");
        assert_eq!(safe_target(Some("https://evil.example")), "/");
        assert_eq!(safe_target(None), "/");
    }

    #[test]
    fn test_failure_status() {
        assert_eq!(
            failure_status(&AuthError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            failure_status(&AuthError::UserAlreadyExists),
            StatusCode::CONFLICT
        );
        assert_eq!(
            failure_status(&AuthError::PasswordHash),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
