//! Integration tests for the Stride storefront.
//!
//! The tests drive a running server over HTTP, the way a browser would:
//! one cookie-keeping client per test and redirects left unfollowed so
//! `Location` headers can be asserted.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database, migrate and seed the demo catalog
//! cargo run -p stride-cli -- migrate
//! cargo run -p stride-cli -- seed seed/catalog.yaml
//!
//! # Start the storefront, then in another shell
//! cargo test -p stride-integration-tests -- --ignored
//! ```
//!
//! `STOREFRONT_BASE_URL` points the tests at another server.

#![cfg_attr(not(test), forbid(unsafe_code))]

use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use uuid::Uuid;

/// Base URL of the storefront under test.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned())
}

/// Absolute URL for a storefront path.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", storefront_base_url().trim_end_matches('/'))
}

/// A client that keeps cookies and does not follow redirects.
///
/// Each client claims its own `X-Forwarded-For` address so tests do not
/// drain each other's auth rate limit bucket.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialized.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> Client {
    let [.., a, b, c] = *Uuid::new_v4().as_bytes();
    let mut headers = header::HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        header::HeaderValue::from_str(&format!("10.{a}.{b}.{c}"))
            .expect("Generated address is a valid header value"),
    );

    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to build HTTP client")
}

/// `Location` header of a redirect response, or an empty string.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

/// Credentials of an account created for a single test.
#[derive(Debug, Clone)]
pub struct TestAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl TestAccount {
    /// A fresh account with a unique email address.
    #[must_use]
    pub fn unique() -> Self {
        Self {
            name: "Test Runner".to_owned(),
            email: format!("runner-{}@example.com", Uuid::new_v4().simple()),
            password: "correct-horse-battery".to_owned(),
        }
    }
}

/// Register `account` through the sign-up form; the client ends up signed in.
///
/// # Panics
///
/// Panics if the request fails or the storefront rejects the sign-up.
#[allow(clippy::expect_used)]
pub async fn sign_up(client: &Client, account: &TestAccount) {
    let response = client
        .post(url("/sign-up"))
        .form(&[
            ("name", account.name.as_str()),
            ("email", account.email.as_str()),
            ("password", account.password.as_str()),
        ])
        .send()
        .await
        .expect("Sign-up request failed");
    assert_eq!(response.status(), StatusCode::SEE_OTHER, "sign-up rejected");
}

/// A size that can be put in a cart.
#[derive(Debug, Clone)]
pub struct StockedSize {
    pub product_slug: String,
    pub sku: String,
    pub variant_size_id: String,
    pub in_stock: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedSize {
    id: String,
    in_stock: i64,
}

#[derive(Deserialize)]
struct ListedVariant {
    sku: String,
    sizes: Vec<ListedSize>,
}

#[derive(Deserialize)]
struct ListedProduct {
    slug: String,
    variants: Vec<ListedVariant>,
}

#[derive(Deserialize)]
struct Listing {
    products: Vec<ListedProduct>,
}

/// Sign in through the sign-in form.
///
/// # Panics
///
/// Panics if the request fails or the credentials are rejected.
#[allow(clippy::expect_used)]
pub async fn sign_in(client: &Client, account: &TestAccount) {
    let response = client
        .post(url("/sign-in"))
        .form(&[
            ("email", account.email.as_str()),
            ("password", account.password.as_str()),
        ])
        .send()
        .await
        .expect("Sign-in request failed");
    assert_eq!(response.status(), StatusCode::SEE_OTHER, "sign-in rejected");
}

/// `GET /api/products?{query}` as raw JSON.
///
/// # Panics
///
/// Panics if the request fails or the body is not JSON.
#[allow(clippy::expect_used)]
pub async fn api_listing(client: &Client, query: &str) -> serde_json::Value {
    client
        .get(url(&format!("/api/products?{query}")))
        .send()
        .await
        .expect("Listing request failed")
        .json()
        .await
        .expect("Listing is not valid JSON")
}

/// Find a size with at least `min_stock` units using the JSON API.
///
/// # Panics
///
/// Panics if the request fails or the seeded catalog has no such size.
#[allow(clippy::expect_used)]
pub async fn find_stocked_size(client: &Client, min_stock: i64) -> StockedSize {
    stocked_sizes(client, min_stock)
        .await
        .into_iter()
        .next()
        .expect("Seeded catalog has no size with enough stock")
}

/// Every size with at least `min_stock` units, in listing order.
///
/// # Panics
///
/// Panics if the request fails or the body is not a listing.
#[allow(clippy::expect_used)]
pub async fn stocked_sizes(client: &Client, min_stock: i64) -> Vec<StockedSize> {
    let listing: Listing = client
        .get(url("/api/products"))
        .send()
        .await
        .expect("Listing request failed")
        .json()
        .await
        .expect("Listing is not valid JSON");

    listing
        .products
        .into_iter()
        .flat_map(|product| {
            let slug = product.slug;
            product.variants.into_iter().flat_map(move |variant| {
                let slug = slug.clone();
                variant.sizes.into_iter().map(move |size| StockedSize {
                    product_slug: slug.clone(),
                    sku: variant.sku.clone(),
                    variant_size_id: size.id,
                    in_stock: size.in_stock,
                })
            })
        })
        .filter(|size| size.in_stock >= min_stock)
        .collect()
}

/// Value of the first `<input name="{name}" value="...">` in a page.
#[must_use]
pub fn input_value(html: &str, name: &str) -> Option<String> {
    let marker = format!(r#"name="{name}" value=""#);
    let start = html.find(&marker)? + marker.len();
    let rest = html.get(start..)?;
    let end = rest.find('"')?;
    rest.get(..end).map(str::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_input_value() {
        let html = r#"<input type="radio" name="shipping_address_id" value="abc-123" checked>
<input type="radio" name="shipping_address_id" value="def-456">"#;
        assert_eq!(
            input_value(html, "shipping_address_id").as_deref(),
            Some("abc-123")
        );
        assert_eq!(input_value(html, "billing_address_id"), None);
    }

    #[test]
    fn test_unique_accounts_differ() {
        assert_ne!(TestAccount::unique().email, TestAccount::unique().email);
    }
}
