//! Integration tests for the catalog pages and JSON API.
//!
//! These tests require a running storefront over the seeded demo catalog.

use reqwest::StatusCode;
use serde_json::Value;
use stride_integration_tests::{api_listing, client, find_stocked_size, location, url};

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_health() {
    let response = client().get(url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let ready = client().get(url("/health/ready")).send().await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_listing_page_renders() {
    let response = client().get(url("/products")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = response.text().await.unwrap();
    assert!(html.contains("/products/"));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_api_listing_reports_total_and_filters() {
    let body: Value = client()
        .get(url("/api/products?gender=women,men,men&sort=price-low-to-high"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["filters"]["genders"], serde_json::json!(["men", "women"]));
    assert_eq!(body["filters"]["sort"], "price-low-to-high");

    let products = body["products"].as_array().unwrap();
    assert_eq!(body["total"].as_u64().unwrap(), products.len() as u64);

    let minimums: Vec<f64> = products
        .iter()
        .map(|p| p["priceRange"]["min"].as_str().unwrap().parse().unwrap())
        .collect();
    assert!(minimums.windows(2).all(|w| w[0] <= w[1]), "{minimums:?}");
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_unpublished_products_are_hidden() {
    let response = client()
        .get(url("/api/products/studio-slip"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_product_slug_redirects_to_default_sku() {
    let stocked = find_stocked_size(&client(), 1).await;

    let response = client()
        .get(url(&format!("/products/{}", stocked.product_slug)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with(&format!("/products/{}/", stocked.product_slug)));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_product_detail_renders_and_unknown_sku_redirects() {
    let stocked = find_stocked_size(&client(), 1).await;

    let detail = client()
        .get(url(&format!("/products/{}/{}", stocked.product_slug, stocked.sku)))
        .send()
        .await
        .unwrap();
    assert_eq!(detail.status(), StatusCode::OK);
    let html = detail.text().await.unwrap();
    assert!(html.contains(&stocked.variant_size_id));

    let missing = client()
        .get(url(&format!("/products/{}/no-such-sku", stocked.product_slug)))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::SEE_OTHER);
    assert!(location(&missing).starts_with(&format!("/products/{}/", stocked.product_slug)));
    assert!(!location(&missing).ends_with("/no-such-sku"));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_filter_options() {
    let body: Value = client()
        .get(url("/api/filters"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let buckets = body["priceRanges"].as_array().unwrap();
    assert_eq!(buckets.len(), 4);
    assert_eq!(buckets[0]["label"], "Under $50");
    assert!(!body["sizes"].as_array().unwrap().is_empty());
}

fn slugs(listing: &Value) -> Vec<&str> {
    listing["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect()
}

fn listed_sizes(listing: &Value) -> impl Iterator<Item = &Value> {
    listing["products"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|p| p["variants"].as_array().unwrap())
        .flat_map(|v| v["sizes"].as_array().unwrap())
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_listing_skips_unpublished_and_sold_out_products() {
    let listing = api_listing(&client(), "").await;
    let slugs = slugs(&listing);

    assert!(!slugs.is_empty());
    assert!(!slugs.contains(&"studio-slip"), "{slugs:?}");
    assert!(!slugs.contains(&"retro-court"), "{slugs:?}");
    assert!(listed_sizes(&listing).all(|s| s["inStock"].as_i64().unwrap() > 0));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_price_bucket_bounds_listed_prices() {
    let listing = api_listing(&client(), "price=0-50").await;
    let products = listing["products"].as_array().unwrap();

    assert!(slugs(&listing).contains(&"gym-flex"));
    for product in products {
        let min: f64 = product["priceRange"]["min"].as_str().unwrap().parse().unwrap();
        assert!((0.0..=50.0).contains(&min), "{}: {min}", product["slug"]);
    }
    for size in listed_sizes(&listing) {
        let price: f64 = size["price"].as_str().unwrap().parse().unwrap();
        assert!(price <= 50.0, "{size}");
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_size_facet_narrows_listing() {
    let all = api_listing(&client(), "").await;
    let listing = api_listing(&client(), "size=m-11").await;

    let total = listing["total"].as_u64().unwrap();
    assert!(total > 0);
    assert!(total < all["total"].as_u64().unwrap());
    assert!(slugs(&listing).contains(&"court-classic"));
    assert!(listed_sizes(&listing).all(|s| s["size"] == "M 11 / W 12.5"));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_color_facet_narrows_listing() {
    let all = api_listing(&client(), "").await;
    let listing = api_listing(&client(), "color=blue").await;

    let total = listing["total"].as_u64().unwrap();
    assert!(total > 0);
    assert!(total < all["total"].as_u64().unwrap());
    assert!(slugs(&listing).contains(&"trail-blazer"));

    let variants = listing["products"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|p| p["variants"].as_array().unwrap());
    for variant in variants {
        assert_eq!(variant["color"], "Blue", "{variant}");
    }
}
