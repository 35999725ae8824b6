//! Checkout validation, authorization and stock-consistency tests.

mod common;

use axum::http::Method;
use common::{cart_line, response_json, shipping_address, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn unauthenticated_checkout_is_asked_to_sign_in() {
    let app = TestApp::new().await;
    let product = app.seed_product("Onion Hair Serum", dec!(450.00), 5).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "payment_method": "COD",
                "items": [cart_line(&product, 1, 5)],
                "shipping": shipping_address(),
            })),
            None,
        )
        .await;

    assert_eq!(response.status(), 401);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Please sign in and retry"));
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request_as_buyer(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "payment_method": "COD",
                "items": [],
                "shipping": shipping_address(),
            })),
        )
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn incomplete_address_is_rejected_naming_missing_fields() {
    let app = TestApp::new().await;
    let product = app.seed_product("Curl Defining Cream", dec!(550.00), 5).await;

    let mut address = shipping_address();
    address["phone"] = json!("");
    address["postal_code"] = json!("  ");

    let response = app
        .request_as_buyer(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "payment_method": "COD",
                "items": [cart_line(&product, 1, 5)],
                "shipping": address,
            })),
        )
        .await;

    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("phone"));
    assert!(message.contains("postal_code"));
}

#[tokio::test]
async fn stale_cart_quantity_hits_the_authoritative_stock_check() {
    let app = TestApp::new().await;
    // Cart was built when 5 were in stock; only 1 remains now.
    let product = app.seed_product("Keratin Smooth Shampoo", dec!(500.00), 1).await;

    let response = app
        .request_as_buyer(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "payment_method": "COD",
                "items": [cart_line(&product, 3, 5)],
                "shipping": shipping_address(),
            })),
        )
        .await;

    assert_eq!(response.status(), 422);

    // nothing was written: stock intact, no orders visible to the admin
    assert_eq!(app.product_stock(product.id).await, 1);
    let response = app
        .request_as_admin(Method::GET, "/api/v1/orders", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn concurrent_checkouts_for_the_last_unit_create_at_most_one_order() {
    let app = TestApp::new().await;
    let product = app.seed_product("Limited Edition Gift Set", dec!(1999.00), 1).await;

    let payload = json!({
        "payment_method": "COD",
        "items": [cart_line(&product, 1, 1)],
        "shipping": shipping_address(),
    });

    let (first, second) = tokio::join!(
        app.request_as_buyer(Method::POST, "/api/v1/orders", Some(payload.clone())),
        app.request_as_buyer(Method::POST, "/api/v1/orders", Some(payload.clone())),
    );

    let statuses = [first.status().as_u16(), second.status().as_u16()];
    let created = statuses.iter().filter(|&&s| s == 201).count();
    let conflicted = statuses.iter().filter(|&&s| s == 422).count();

    assert_eq!(created, 1, "exactly one checkout wins: {:?}", statuses);
    assert_eq!(conflicted, 1, "the loser gets a stock conflict: {:?}", statuses);
    assert_eq!(app.product_stock(product.id).await, 0);
}

#[tokio::test]
async fn client_total_must_match_the_server_computation() {
    let app = TestApp::new().await;
    let product = app.seed_product("Coconut Milk Leave-In", dec!(500.00), 5).await;

    let response = app
        .request_as_buyer(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "payment_method": "COD",
                "items": [cart_line(&product, 2, 5)],
                "shipping": shipping_address(),
                "expected_total": "900.00",
            })),
        )
        .await;

    assert_eq!(response.status(), 400);
    // the failed attempt must not consume stock
    assert_eq!(app.product_stock(product.id).await, 5);
}

#[tokio::test]
async fn stale_snapshot_price_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("Vitamin E Hair Butter", dec!(650.00), 5).await;

    let mut line = cart_line(&product, 1, 5);
    line["unit_price"] = json!("600.00");

    let response = app
        .request_as_buyer(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "payment_method": "COD",
                "items": [line],
                "shipping": shipping_address(),
            })),
        )
        .await;

    assert_eq!(response.status(), 400);
    assert_eq!(app.product_stock(product.id).await, 5);
}

#[tokio::test]
async fn buyers_cannot_drive_admin_transitions() {
    let app = TestApp::new().await;
    let product = app.seed_product("Scalp Detox Scrub", dec!(480.00), 5).await;

    let response = app
        .request_as_buyer(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "payment_method": "COD",
                "items": [cart_line(&product, 1, 5)],
                "shipping": shipping_address(),
            })),
        )
        .await;
    let body = response_json(response).await;
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();

    let response = app
        .request_as_buyer(
            Method::POST,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "CONFIRMED" })),
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn buyers_cannot_confirm_payment_on_someone_elses_order() {
    let app = TestApp::new().await;
    let product = app.seed_product("Neem Anti-Dandruff Oil", dec!(390.00), 5).await;

    let response = app
        .request_as_buyer(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "payment_method": "UPI",
                "items": [cart_line(&product, 1, 5)],
                "shipping": shipping_address(),
            })),
        )
        .await;
    let body = response_json(response).await;
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();

    let intruder = app.token_for(Uuid::new_v4(), "Someone Else");
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/payment-confirmation", order_id),
            None,
            Some(&intruder),
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn only_the_owner_or_an_admin_may_read_an_order() {
    let app = TestApp::new().await;
    let product = app.seed_product("Henna Gloss Kit", dec!(320.00), 5).await;

    let response = app
        .request_as_buyer(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "payment_method": "COD",
                "items": [cart_line(&product, 1, 5)],
                "shipping": shipping_address(),
            })),
        )
        .await;
    let body = response_json(response).await;
    let order_id = body["data"]["order"]["id"].as_str().unwrap().to_string();

    // a different buyer is refused
    let intruder = app.token_for(Uuid::new_v4(), "Someone Else");
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_id),
            None,
            Some(&intruder),
        )
        .await;
    assert_eq!(response.status(), 403);

    // the owner reads it
    let response = app
        .request_as_buyer(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), 200);

    // so does the back office
    let response = app
        .request_as_admin(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn order_listing_is_admin_only() {
    let app = TestApp::new().await;

    let response = app
        .request_as_buyer(Method::GET, "/api/v1/orders", None)
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .request_as_admin(Method::GET, "/api/v1/orders?status=pending", None)
        .await;
    assert_eq!(response.status(), 200);
}
