//! Route guard: keeps signed-out visitors out of checkout and the account
//! area, and signed-in users off the auth pages.

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use url::Url;

use super::auth::sign_in_url;
use crate::models::CurrentUser;
use crate::models::session::keys;

/// Path prefixes that require a signed-in user.
pub const PROTECTED_PREFIXES: [&str; 2] = ["/checkout", "/account"];

/// Pages only shown to signed-out visitors.
pub const AUTH_PAGES: [&str; 2] = ["/sign-in", "/sign-up"];

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether `target` is a same-origin relative path that is safe to redirect
/// to after signing in.
#[must_use]
pub fn is_safe_redirect(target: &str) -> bool {
    if !target.starts_with('/')
        || target.starts_with("//")
        || target.contains('\\')
        || target.chars().any(|c| c.is_control() || c == ' ')
    {
        return false;
    }

    let Ok(base) = Url::parse("http://storefront.invalid") else {
        return false;
    };
    base.join(target)
        .is_ok_and(|url| url.host_str() == Some("storefront.invalid"))
}

/// `redirect` query parameter, if it is safe.
#[must_use]
pub fn redirect_param(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .find(|(key, _)| key == "redirect")
        .map(|(_, value)| value.into_owned())
        .filter(|target| is_safe_redirect(target))
}

/// Decide where, if anywhere, a request should be redirected.
#[must_use]
pub fn decide(path: &str, query: Option<&str>, authenticated: bool) -> Option<String> {
    if !authenticated && PROTECTED_PREFIXES.iter().any(|p| matches_prefix(path, p)) {
        return Some(sign_in_url(path));
    }

    if authenticated && AUTH_PAGES.contains(&path) {
        return Some(redirect_param(query).unwrap_or_else(|| "/".to_owned()));
    }

    None
}

/// Middleware applying [`decide`] to every request.
///
/// Must run inside the session layer. Only `GET` and `HEAD` requests to the
/// auth pages are redirected, so a signed-in form post still reaches its
/// handler.
pub async fn route_guard_middleware(request: Request, next: Next) -> Response {
    let authenticated = match request.extensions().get::<Session>() {
        Some(session) => session
            .get::<CurrentUser>(keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
            .is_some(),
        None => false,
    };

    let uri = request.uri();
    let decision = decide(uri.path(), uri.query(), authenticated);
    let is_auth_page = AUTH_PAGES.contains(&uri.path());
    let is_read = request.method().is_safe();

    match decision {
        Some(target) if is_read || !is_auth_page => Redirect::to(&target).into_response(),
        _ => next.run(request).await,
    }
}
