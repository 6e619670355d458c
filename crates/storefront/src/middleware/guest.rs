//! Guest session cookie.
//!
//! Anonymous shoppers get a `guest_session` cookie holding a random token.
//! The token maps to a `guests` row, which owns the guest's cart until they
//! sign in and the cart is merged.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header, request::Parts},
    response::Response,
};
use tower_sessions::cookie::{Cookie, SameSite, time::Duration};
use tracing::warn;

use crate::db::RepositoryError;
use crate::models::{CartOwner, CurrentUser};
use crate::services::guest::GuestService;
use crate::state::AppState;

/// Guest cookie name.
pub const GUEST_COOKIE_NAME: &str = "guest_session";

/// Token from the request's `guest_session` cookie, if present.
pub struct GuestToken(pub Option<String>);

impl<S> FromRequestParts<S> for GuestToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(read_guest_token(&parts.headers)))
    }
}

impl GuestToken {
    #[must_use]
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Find the guest token among the request cookies.
#[must_use]
pub fn read_guest_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == GUEST_COOKIE_NAME)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
}

/// `Set-Cookie` value for a fresh guest session.
#[must_use]
pub fn guest_cookie(token: &str, days: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((GUEST_COOKIE_NAME, token.to_owned()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .path("/")
        .max_age(Duration::days(days))
        .build()
}

/// `Set-Cookie` value that deletes the guest cookie.
#[must_use]
pub fn guest_removal_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = guest_cookie("", 0, secure);
    cookie.make_removal();
    cookie
}

/// Render a cookie for a `Set-Cookie` header.
#[must_use]
pub fn set_cookie_header(cookie: &Cookie<'_>) -> Option<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string()).ok()
}

/// Append `Set-Cookie` for `cookie`, if any, to a response.
#[must_use]
pub fn with_cookie(mut response: Response, cookie: Option<Cookie<'_>>) -> Response {
    if let Some(value) = cookie.as_ref().and_then(set_cookie_header) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// Cart owner for a read-only request: the user, or an existing valid guest.
///
/// Never creates a guest session.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the guest lookup fails.
pub async fn existing_owner(
    state: &AppState,
    user: Option<&CurrentUser>,
    token: &GuestToken,
) -> Result<Option<CartOwner>, RepositoryError> {
    if let Some(user) = user {
        return Ok(Some(CartOwner::User(user.id)));
    }

    let guests = GuestService::new(state.pool(), state.config().guest_session_days);
    Ok(guests
        .validate(token.as_deref())
        .await?
        .map(|guest| CartOwner::Guest(guest.id)))
}

/// Cart owner for a write: the user, or a guest session created on demand.
///
/// Returns the cookie to set when a new guest session was started.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the guest lookup or insert fails.
pub async fn ensure_owner(
    state: &AppState,
    user: Option<&CurrentUser>,
    token: &GuestToken,
) -> Result<(CartOwner, Option<Cookie<'static>>), RepositoryError> {
    if let Some(user) = user {
        return Ok((CartOwner::User(user.id), None));
    }

    let config = state.config();
    let guests = GuestService::new(state.pool(), config.guest_session_days);
    let (guest, created) = guests.get_or_create(token.as_deref()).await?;

    let cookie = created.then(|| {
        guest_cookie(
            &guest.session_token,
            config.guest_session_days,
            config.secure_cookies(),
        )
    });

    Ok((CartOwner::Guest(guest.id), cookie))
}

/// What became of the guest session at sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adoption {
    /// Cart merged and guest row removed in one transaction.
    Merged,
    /// The cookie named no live guest session.
    NoGuest,
    /// Lookup or merge failed; the guest row and its cart are untouched.
    Failed,
}

impl Adoption {
    /// The `guest_session` removal cookie, unless the guest cart survived.
    fn removal_cookie(self, secure: bool) -> Option<Cookie<'static>> {
        match self {
            Self::Merged | Self::NoGuest => Some(guest_removal_cookie(secure)),
            Self::Failed => None,
        }
    }
}

/// After sign-in or sign-up: move the guest cart into the user's cart and
/// end the guest session.
///
/// Failures are logged and swallowed; signing in must not fail because of
/// the guest cart. The guest session is kept on failure so a later sign-in
/// can retry the merge. Returns the cookie that clears `guest_session` once
/// the guest is gone.
pub async fn adopt_guest_cart(
    state: &AppState,
    user: &CurrentUser,
    token: &GuestToken,
) -> Option<Cookie<'static>> {
    let token = token.as_deref()?;
    let guests = GuestService::new(state.pool(), state.config().guest_session_days);

    let adoption = match guests.validate(Some(token)).await {
        Ok(Some(guest)) => {
            let carts = crate::services::cart::CartService::new(state.pool());
            match carts.merge_guest_into_user(guest.id, user.id).await {
                Ok(_) => Adoption::Merged,
                Err(e) => {
                    warn!(error = %e, guest_id = %guest.id, "Failed to merge guest cart");
                    Adoption::Failed
                }
            }
        }
        Ok(None) => Adoption::NoGuest,
        Err(e) => {
            warn!(error = %e, "Failed to look up guest session");
            Adoption::Failed
        }
    };

    adoption.removal_cookie(state.config().secure_cookies())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_guest_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; guest_session=abc-123; other=1"),
        );
        assert_eq!(read_guest_token(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_read_guest_token_missing_or_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(read_guest_token(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("guest_session="));
        assert_eq!(read_guest_token(&headers), None);
    }

    #[test]
    fn test_guest_cookie_attributes() {
        let cookie = guest_cookie("tok", 7, true).to_string();
        assert!(cookie.starts_with("guest_session=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=604800"));
    }

    #[test]
    fn test_failed_adoption_keeps_guest_cookie() {
        assert!(Adoption::Failed.removal_cookie(false).is_none());

        for adoption in [Adoption::Merged, Adoption::NoGuest] {
            let cookie = adoption.removal_cookie(true).unwrap();
            assert_eq!(cookie.name(), GUEST_COOKIE_NAME);
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
    }

    #[test]
    fn test_removal_cookie_expires() {
        let cookie = guest_removal_cookie(false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert!(set_cookie_header(&cookie).is_some());
    }
}
