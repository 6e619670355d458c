//! Integration tests for the cart, checkout and order cancellation.
//!
//! These tests require a running storefront over the seeded demo catalog
//! (`seed/catalog.yaml`, which includes the `SPRING10` coupon). Placing
//! orders consumes stock; cancelling restores it.

use reqwest::{Client, StatusCode};
use stride_integration_tests::{
    StockedSize, TestAccount, client, find_stocked_size, input_value, location, sign_in, sign_up,
    stocked_sizes, url,
};

async fn add_to_cart(client: &Client, size: &StockedSize, quantity: i64) -> reqwest::Response {
    client
        .post(url("/cart/add"))
        .form(&[
            ("variant_size_id", size.variant_size_id.clone()),
            ("quantity", quantity.to_string()),
        ])
        .send()
        .await
        .unwrap()
}

async fn add_address(client: &Client, address_type: &str) {
    let response = client
        .post(url("/account/addresses"))
        .form(&[
            ("address_type", address_type),
            ("line1", "1 Market Street"),
            ("city", "Springfield"),
            ("state", "Oregon"),
            ("country", "United States"),
            ("postal_code", "97477"),
            ("is_default", "on"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/account/addresses?success="));
}

/// Sign up, fill the cart with one unit and save both address types.
async fn ready_for_checkout(client: &Client) -> StockedSize {
    sign_up(client, &TestAccount::unique()).await;
    let size = find_stocked_size(client, 2).await;
    let response = add_to_cart(client, &size, 1).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    add_address(client, "shipping").await;
    add_address(client, "billing").await;
    size
}

async fn checkout_form(client: &Client) -> (String, String) {
    let page = client.get(url("/checkout")).send().await.unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    let html = page.text().await.unwrap();

    (
        input_value(&html, "shipping_address_id").unwrap(),
        input_value(&html, "billing_address_id").unwrap(),
    )
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_guest_can_add_to_cart() {
    let client = client();
    let size = find_stocked_size(&client, 1).await;

    let response = add_to_cart(&client, &size, 1).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart?success=Added%20to%20cart");

    let cart = client.get(url("/cart")).send().await.unwrap();
    assert_eq!(cart.status(), StatusCode::OK);
    let html = cart.text().await.unwrap();
    assert!(html.contains(&format!("/products/{}/{}", size.product_slug, size.sku)));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_adding_more_than_stock_is_rejected() {
    let client = client();
    let size = find_stocked_size(&client, 1).await;

    let response = add_to_cart(&client, &size, size.in_stock + 1).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/cart?error=Only%20{}%20left%20in%20stock", size.in_stock)
    );
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_guest_cart_follows_user_after_sign_up() {
    let client = client();
    let size = find_stocked_size(&client, 1).await;
    add_to_cart(&client, &size, 1).await;

    sign_up(&client, &TestAccount::unique()).await;

    let html = client
        .get(url("/cart"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains(&format!("/products/{}/{}", size.product_slug, size.sku)));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_merged_cart_quantity_is_capped_at_stock() {
    let client = client();
    let account = TestAccount::unique();
    sign_up(&client, &account).await;

    // The last size is the one other tests are least likely to order from.
    let size = stocked_sizes(&client, 2).await.pop().unwrap();
    add_to_cart(&client, &size, 1).await;

    let response = client.post(url("/sign-out")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = add_to_cart(&client, &size, size.in_stock).await;
    assert_eq!(location(&response), "/cart?success=Added%20to%20cart");

    sign_in(&client, &account).await;

    let html = client
        .get(url("/cart"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(input_value(&html, "quantity").unwrap(), size.in_stock.to_string());
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_checkout_with_empty_cart_returns_to_cart() {
    let client = client();
    sign_up(&client, &TestAccount::unique()).await;

    let response = client.get(url("/checkout")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart");
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_invalid_coupon_keeps_cart() {
    let client = client();
    ready_for_checkout(&client).await;
    let (shipping, billing) = checkout_form(&client).await;

    let response = client
        .post(url("/checkout"))
        .form(&[
            ("shipping_address_id", shipping.as_str()),
            ("billing_address_id", billing.as_str()),
            ("payment_method", "cod"),
            ("coupon_code", "NO-SUCH-CODE"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/checkout?error="));

    let page = client.get(url("/checkout")).send().await.unwrap();
    assert_eq!(page.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_place_and_cancel_order() {
    let client = client();
    let size = ready_for_checkout(&client).await;
    let (shipping, billing) = checkout_form(&client).await;

    let response = client
        .post(url("/checkout"))
        .form(&[
            ("shipping_address_id", shipping.as_str()),
            ("billing_address_id", billing.as_str()),
            ("payment_method", "cod"),
            ("coupon_code", "spring10"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let confirmation_path = location(&response);
    assert!(confirmation_path.starts_with("/checkout/orders/"));
    let order_id = confirmation_path.trim_start_matches("/checkout/orders/").to_owned();

    let confirmation = client.get(url(&confirmation_path)).send().await.unwrap();
    assert_eq!(confirmation.status(), StatusCode::OK);
    let html = confirmation.text().await.unwrap();
    assert!(html.contains("Thank you for your order"));
    assert!(html.contains("SPRING10"));
    assert!(html.contains(&format!("/products/{}/{}", size.product_slug, size.sku)));

    // The order emptied the cart.
    let checkout = client.get(url("/checkout")).send().await.unwrap();
    assert_eq!(location(&checkout), "/cart");

    // Other users cannot see the order.
    let stranger = stride_integration_tests::client();
    sign_up(&stranger, &TestAccount::unique()).await;
    let hidden = stranger.get(url(&confirmation_path)).send().await.unwrap();
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let cancel = client
        .post(url(&format!("/account/orders/{order_id}/cancel")))
        .send()
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::SEE_OTHER);
    assert!(location(&cancel).starts_with("/account?success="));

    let again = client
        .post(url(&format!("/account/orders/{order_id}/cancel")))
        .send()
        .await
        .unwrap();
    assert!(location(&again).starts_with("/account?error="));
}
