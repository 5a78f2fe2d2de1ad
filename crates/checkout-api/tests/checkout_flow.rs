//! End-to-end tests over the HTTP surface with the demo and Razorpay backends.

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use checkout_api::{create_router, AppConfig, AppState};
use checkout_core::{
    BoxedPaymentStrategy, Currency, DemoConfig, DemoPaymentStrategy, ExitPassConfig,
    LoggingNotifier, PaymentProvider, Price, Product,
};
use checkout_razorpay::signature::compute_hmac_sha256;
use checkout_razorpay::{RazorpayConfig, RazorpayStrategy};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const QR_SECRET: &str = "test-exit-pass-secret-0123456789abcdef";
const WEBHOOK_SECRET: &str = "whsec_integration";

struct Harness {
    server: TestServer,
    milk_id: Uuid,
}

async fn harness() -> Harness {
    harness_with(
        PaymentProvider::Demo,
        Arc::new(DemoPaymentStrategy::new(DemoConfig::instant())),
    )
    .await
}

/// Razorpay backend; no gateway call is made by the tests that use it
async fn live_harness() -> Harness {
    let config = RazorpayConfig::new("rzp_test_key", "key_secret", WEBHOOK_SECRET);
    harness_with(
        PaymentProvider::Razorpay,
        Arc::new(RazorpayStrategy::new(config).unwrap()),
    )
    .await
}

async fn harness_with(mode: PaymentProvider, strategy: BoxedPaymentStrategy) -> Harness {
    let config = AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        base_url: "http://localhost".to_string(),
        environment: "test".to_string(),
        payment_mode: mode,
        notify_webhook_url: None,
        notify_enabled: false,
        catalog_path: None,
        store_lock_timeout: Duration::from_secs(2),
    };
    let exit_config = ExitPassConfig::new(QR_SECRET, chrono::Duration::minutes(10)).unwrap();
    let state = AppState::build(
        config,
        strategy,
        &exit_config,
        Arc::new(LoggingNotifier),
        Some(WEBHOOK_SECRET.to_string()),
    );

    let milk = Product::new("MILK001", "Milk Tetra Pack", Price::new(60.0, Currency::INR), 10);
    let milk_id = milk.id;
    state.store.seed_products(vec![milk]).await.unwrap();

    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        milk_id,
    }
}

fn user_header(user: Uuid) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-user-id"),
        HeaderValue::from_str(&user.to_string()).unwrap(),
    )
}

/// Cart with two milks, converted into an order; returns the order id
async fn place_order(h: &Harness, user: Uuid) -> Uuid {
    let (name, value) = user_header(user);
    h.server
        .post("/api/v1/cart/items")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "product_id": h.milk_id, "quantity": 2 }))
        .await
        .assert_status_ok();

    let response = h
        .server
        .post("/api/v1/orders")
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::CREATED);
    let order: Value = response.json();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total"]["amount"], 12_600);
    order["id"].as_str().unwrap().parse().unwrap()
}

async fn milk_stock(h: &Harness) -> u64 {
    let products: Value = h.server.get("/api/v1/products").await.json();
    products["products"][0]["stock"].as_u64().unwrap()
}

async fn demo_webhook(h: &Harness, order_id: Uuid) -> Value {
    let body = serde_json::to_vec(&json!({
        "order_uuid": order_id.to_string(),
        "status": "success",
        "amount": 126.0,
        "payment_method": "upi"
    }))
    .unwrap();
    let response = h.server.post("/webhook/payments").bytes(Bytes::from(body)).await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_health_reports_payment_mode() {
    let h = harness().await;
    let body: Value = h.server.get("/health").await.json();
    assert_eq!(body["service"], "smart-checkout");
    assert_eq!(body["payment_mode"], "demo");
}

#[tokio::test]
async fn test_requests_without_user_are_rejected() {
    let h = harness().await;
    let response = h.server.post("/api/v1/orders").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
async fn test_empty_cart_order_is_rejected() {
    let h = harness().await;
    let (name, value) = user_header(Uuid::new_v4());
    let response = h.server.post("/api/v1/orders").add_header(name, value).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "empty_cart");
}

#[tokio::test]
async fn test_full_checkout_to_exit_gate() {
    let h = harness().await;
    let user = Uuid::new_v4();
    let (name, value) = user_header(user);
    let order_id = place_order(&h, user).await;

    let initiated: Value = h
        .server
        .post("/api/v1/payments/initiate")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "order_id": order_id, "payment_method": "upi" }))
        .await
        .json();
    assert_eq!(initiated["provider"], "demo");
    let payment_id = initiated["payment_id"].as_str().unwrap().to_string();

    // Exit pass before settlement
    let response = h
        .server
        .post("/api/v1/exit-qr/generate")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "order_id": order_id }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "order_not_paid");

    let ack = demo_webhook(&h, order_id).await;
    assert_eq!(ack["status"], "ok");
    assert_eq!(ack["outcome"]["outcome"], "applied");
    assert_eq!(milk_stock(&h).await, 8);

    let payment: Value = h
        .server
        .get(&format!("/api/v1/payments/{}", payment_id))
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert_eq!(payment["status"], "success");

    let issued: Value = h
        .server
        .post("/api/v1/exit-qr/generate")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "order_id": order_id }))
        .await
        .json();
    let token = issued["token"].as_str().unwrap().to_string();
    assert!(issued["image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));

    let order: Value = h
        .server
        .get(&format!("/api/v1/orders/{}", order_id))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(order["status"], "verified");

    let scan = serde_json::to_vec(&json!({ "qr_token": token })).unwrap();
    let first: Value = h
        .server
        .post("/api/v1/exit-qr/verify")
        .add_header(
            HeaderName::from_static("x-staff-id"),
            HeaderValue::from_static("gate-2"),
        )
        .bytes(Bytes::from(scan.clone()))
        .await
        .json();
    assert_eq!(first["status"], "authorized");
    assert_eq!(first["order"]["items"][0]["sku"], "MILK001");
    assert_eq!(first["order"]["user_id"], user.to_string());

    let second: Value = h
        .server
        .post("/api/v1/exit-qr/verify")
        .bytes(Bytes::from(scan))
        .await
        .json();
    assert_eq!(second["status"], "already_used");
}

#[tokio::test]
async fn test_webhook_replay_decrements_stock_once() {
    let h = harness().await;
    let order_id = place_order(&h, Uuid::new_v4()).await;

    demo_webhook(&h, order_id).await;
    let replay = demo_webhook(&h, order_id).await;

    assert_eq!(replay["outcome"]["outcome"], "duplicate");
    assert_eq!(milk_stock(&h).await, 8);
}

#[tokio::test]
async fn test_webhook_for_unknown_order_is_acknowledged() {
    let h = harness().await;
    let ack = demo_webhook(&h, Uuid::new_v4()).await;
    assert_eq!(ack["outcome"]["outcome"], "order_not_found");
}

#[tokio::test]
async fn test_razorpay_webhook_with_bad_signature() {
    let h = harness().await;
    let body = serde_json::to_vec(&json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": "pay_x",
            "notes": { "order_uuid": Uuid::new_v4().to_string() }
        }}}
    }))
    .unwrap();

    let response = h
        .server
        .post("/webhook/payments")
        .add_header(
            HeaderName::from_static("x-razorpay-signature"),
            HeaderValue::from_static("deadbeef"),
        )
        .bytes(Bytes::from(body))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "invalid_signature");
}

#[tokio::test]
async fn test_live_mode_rejects_unsigned_demo_notification() {
    let h = live_harness().await;
    let user = Uuid::new_v4();
    let order_id = place_order(&h, user).await;

    let body = serde_json::to_vec(&json!({
        "order_uuid": order_id.to_string(),
        "status": "success"
    }))
    .unwrap();
    let response = h.server.post("/webhook/payments").bytes(Bytes::from(body)).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let ack: Value = response.json();
    assert_eq!(ack["code"], "invalid_signature");

    let (name, value) = user_header(user);
    let order: Value = h
        .server
        .get(&format!("/api/v1/orders/{}", order_id))
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert_eq!(order["status"], "pending");
    assert_eq!(milk_stock(&h).await, 10);

    h.server
        .post("/api/v1/exit-qr/generate")
        .add_header(name, value)
        .json(&json!({ "order_id": order_id }))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_live_mode_settles_signed_capture() {
    let h = live_harness().await;
    let order_id = place_order(&h, Uuid::new_v4()).await;

    let body = serde_json::to_vec(&json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": "pay_live_1",
            "amount": 12600,
            "method": "upi",
            "notes": { "order_uuid": order_id.to_string() }
        }}}
    }))
    .unwrap();
    let signature = compute_hmac_sha256(WEBHOOK_SECRET, &body).unwrap();

    let response = h
        .server
        .post("/webhook/payments")
        .add_header(
            HeaderName::from_static("x-razorpay-signature"),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .bytes(Bytes::from(body))
        .await;
    response.assert_status_ok();
    let ack: Value = response.json();
    assert_eq!(ack["outcome"]["outcome"], "applied");
    assert_eq!(milk_stock(&h).await, 8);
}

#[tokio::test]
async fn test_garbage_scan_is_invalid_not_an_error() {
    let h = harness().await;

    let garbage: Value = h
        .server
        .post("/api/v1/exit-qr/verify")
        .bytes(Bytes::from_static(b"{not json"))
        .await
        .json();
    assert_eq!(garbage["status"], "invalid");
    assert_eq!(garbage["valid"], false);

    let forged: Value = h
        .server
        .post("/api/v1/exit-qr/verify")
        .json(&json!({ "qr_token": "eyJhbGciOiJIUzI1NiJ9.e30.forged" }))
        .await
        .json();
    assert_eq!(forged["status"], "invalid");
}

#[tokio::test]
async fn test_foreign_order_reads_as_not_found() {
    let h = harness().await;
    let order_id = place_order(&h, Uuid::new_v4()).await;

    let (name, value) = user_header(Uuid::new_v4());
    let response = h
        .server
        .get(&format!("/api/v1/orders/{}", order_id))
        .add_header(name.clone(), value.clone())
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = h
        .server
        .post("/api/v1/payments/initiate")
        .add_header(name, value)
        .json(&json!({ "order_id": order_id }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_demo_complete_then_already_paid() {
    let h = harness().await;
    let user = Uuid::new_v4();
    let (name, value) = user_header(user);
    let order_id = place_order(&h, user).await;

    let settled: Value = h
        .server
        .post(&format!("/api/v1/payments/demo/complete/{}", order_id))
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert_eq!(settled["verified"], true);
    assert_eq!(settled["order_status"], "paid");

    let response = h
        .server
        .post(&format!("/api/v1/payments/demo/complete/{}", order_id))
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], "already_paid");
}

#[tokio::test]
async fn test_clear_cart() {
    let h = harness().await;
    let (name, value) = user_header(Uuid::new_v4());

    h.server
        .post("/api/v1/cart/items")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "product_id": h.milk_id }))
        .await
        .assert_status_ok();
    h.server
        .delete("/api/v1/cart")
        .add_header(name.clone(), value.clone())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let cart: Value = h.server.get("/api/v1/cart").add_header(name, value).await.json();
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
}
