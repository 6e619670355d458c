//! Integration tests for sign-up, sign-in and the route guard.
//!
//! These tests require a running storefront with a migrated database.

use reqwest::StatusCode;
use stride_integration_tests::{TestAccount, client, location, sign_up, url};

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_sign_up_signs_in_and_guards_auth_pages() {
    let client = client();
    let account = TestAccount::unique();
    sign_up(&client, &account).await;

    let account_page = client.get(url("/account")).send().await.unwrap();
    assert_eq!(account_page.status(), StatusCode::OK);
    assert!(account_page.text().await.unwrap().contains(&account.email));

    let sign_in_page = client.get(url("/sign-in")).send().await.unwrap();
    assert_eq!(sign_in_page.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&sign_in_page), "/");
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_duplicate_sign_up_conflicts() {
    let account = TestAccount::unique();
    sign_up(&client(), &account).await;
    let shouted = account.email.to_uppercase();

    let response = client()
        .post(url("/sign-up"))
        .form(&[
            ("name", account.name.as_str()),
            ("email", shouted.as_str()),
            ("password", account.password.as_str()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_invalid_sign_up_reports_field_errors() {
    let response = client()
        .post(url("/sign-up"))
        .form(&[("name", "A"), ("email", "not-an-email"), ("password", "short")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let html = response.text().await.unwrap();
    assert!(html.contains("Password must be at least 8 characters"));
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_sign_in_honours_safe_redirect_only() {
    let account = TestAccount::unique();
    sign_up(&client(), &account).await;

    let response = client()
        .post(url("/sign-in"))
        .form(&[
            ("email", account.email.as_str()),
            ("password", account.password.as_str()),
            ("redirect", "/account/wishlist"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/account/wishlist");

    let response = client()
        .post(url("/sign-in"))
        .form(&[
            ("email", account.email.as_str()),
            ("password", account.password.as_str()),
            ("redirect", "//evil.example.com"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_wrong_password_is_unauthorized() {
    let account = TestAccount::unique();
    sign_up(&client(), &account).await;

    let response = client()
        .post(url("/sign-in"))
        .form(&[
            ("email", account.email.as_str()),
            ("password", "definitely-wrong"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_sign_out_protects_account_again() {
    let client = client();
    sign_up(&client, &TestAccount::unique()).await;

    let response = client.post(url("/sign-out")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/sign-in");

    let account_page = client.get(url("/account")).send().await.unwrap();
    assert_eq!(account_page.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&account_page), "/sign-in?redirect=%2Faccount");
}

#[tokio::test]
#[ignore = "Requires running storefront server and seeded database"]
async fn test_auth_actions_are_rate_limited() {
    let client = client();
    let mut statuses = Vec::new();
    for _ in 0..8 {
        let response = client
            .post(url("/sign-in"))
            .form(&[("email", "nobody@example.com"), ("password", "wrong-password")])
            .send()
            .await
            .unwrap();
        statuses.push(response.status());
    }

    assert_eq!(statuses[0], StatusCode::UNAUTHORIZED);
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS), "{statuses:?}");
}
