//! Integration tests for the payment lifecycle: intent creation, signature
//! verification, exactly-once order persistence, and webhook ingestion.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    payment_signature, response_json, webhook_signature, TestApp, USER_EMAIL, USER_ID,
};
use serde_json::{json, Value};

fn sample_cart() -> Value {
    json!([
        {"product_ref": "prod-1", "name": "Steel Bottle", "unit_price": 100, "quantity": 2}
    ])
}

fn sample_address() -> Value {
    json!({
        "name": "A Buyer",
        "phone": "9999999999",
        "line": "12 Test Lane",
        "locality": "Midtown",
        "city": "Pune",
        "state": "MH",
        "postal_code": "411001",
        "kind": "Home"
    })
}

async fn create_intent(app: &TestApp) -> Value {
    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(json!({
                "items": sample_cart(),
                "address": sample_address()
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await
}

async fn confirm(app: &TestApp, gateway_order_ref: &str, payment_ref: &str) -> Value {
    let signature = payment_signature(gateway_order_ref, payment_ref);
    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/payments/confirm",
            Some(json!({
                "gateway_order_ref": gateway_order_ref,
                "payment_ref": payment_ref,
                "signature": signature,
                "items": sample_cart(),
                "address": sample_address()
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await
}

#[tokio::test]
async fn create_intent_recomputes_amount_in_minor_units() {
    let app = TestApp::new().await;

    let intent = create_intent(&app).await;

    // 100 x 2 = 200 major units = 20000 minor units
    assert_eq!(intent["amount_minor"], 20000);
    assert_eq!(intent["currency"], "INR");
    assert!(intent["gateway_order_ref"].as_str().unwrap().starts_with("order_test_"));
    assert_eq!(intent["provider_public_key"], "key_test_abc");

    let created = app.gateway.created_orders.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, 20000);
}

#[tokio::test]
async fn create_intent_ignores_client_declared_total() {
    let app = TestApp::new().await;

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(json!({
                "amount": 1,
                "items": sample_cart(),
                "address": sample_address()
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let intent = response_json(response).await;
    assert_eq!(intent["amount_minor"], 20000);
}

#[tokio::test]
async fn create_intent_rejects_empty_cart() {
    let app = TestApp::new().await;

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(json!({"items": [], "address": sample_address()})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn create_intent_rejects_zero_quantity() {
    let app = TestApp::new().await;

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/payments/create-order",
            Some(json!({
                "items": [{"product_ref": "p", "name": "Thing", "unit_price": 10, "quantity": 0}],
                "address": sample_address()
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing reached the gateway
    assert!(app.gateway.created_orders.lock().unwrap().is_empty());
}

#[tokio::test]
async fn create_intent_requires_identity() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/create-order",
            &[],
            Some(json!({"items": sample_cart(), "address": sample_address()})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn confirm_persists_paid_order_end_to_end() {
    let app = TestApp::new().await;

    let intent = create_intent(&app).await;
    let order_ref = intent["gateway_order_ref"].as_str().unwrap().to_string();

    let confirmation = confirm(&app, &order_ref, "pay_e2e_1").await;
    assert_eq!(confirmation["success"], true);
    let order_id = confirmation["order_id"].as_str().unwrap().to_string();

    let response = app
        .request_as_user(Method::GET, "/api/v1/orders/mine", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let orders = response_json(response).await;
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);

    let order = &orders[0];
    assert_eq!(order["id"], order_id.as_str());
    assert_eq!(order["owner_id"], USER_ID);
    assert_eq!(order["owner_email"], USER_EMAIL);
    assert_eq!(order["amount"], "200");
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["status"], "Processing");
    assert_eq!(order["refund_status"], "none");
    assert_eq!(order["payment_ref"], "pay_e2e_1");
    assert_eq!(order["gateway_order_ref"], order_ref.as_str());
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(order["shipping_address"]["city"], "Pune");
}

#[tokio::test]
async fn confirm_is_idempotent_per_payment_ref() {
    let app = TestApp::new().await;

    let intent = create_intent(&app).await;
    let order_ref = intent["gateway_order_ref"].as_str().unwrap().to_string();

    let first = confirm(&app, &order_ref, "pay_dup_1").await;
    let second = confirm(&app, &order_ref, "pay_dup_1").await;

    assert_eq!(first["order_id"], second["order_id"]);

    let response = app
        .request_as_user(Method::GET, "/api/v1/orders/mine", None)
        .await;
    let orders = response_json(response).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn confirm_rejects_tampered_signature() {
    let app = TestApp::new().await;

    let intent = create_intent(&app).await;
    let order_ref = intent["gateway_order_ref"].as_str().unwrap().to_string();

    let mut signature = payment_signature(&order_ref, "pay_bad_1");
    // Flip one hex digit
    let last = signature.pop().unwrap();
    signature.push(if last == '0' { '1' } else { '0' });

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/payments/confirm",
            Some(json!({
                "gateway_order_ref": order_ref,
                "payment_ref": "pay_bad_1",
                "signature": signature,
                "items": sample_cart(),
                "address": sample_address()
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "Payment verification failed, please contact support"
    );

    // No order was created
    let response = app
        .request_as_user(Method::GET, "/api/v1/orders/mine", None)
        .await;
    let orders = response_json(response).await;
    assert!(orders.as_array().unwrap().is_empty());
}

fn captured_webhook_body(payment_ref: &str, gateway_order_ref: &str) -> String {
    json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_ref,
                    "order_id": gateway_order_ref,
                    "amount": 20000,
                    "currency": "INR",
                    "notes": {
                        "owner_id": USER_ID,
                        "owner_email": USER_EMAIL,
                        "items": sample_cart(),
                        "address": sample_address()
                    }
                }
            }
        }
    })
    .to_string()
}

#[tokio::test]
async fn webhook_capture_creates_order_from_metadata_alone() {
    let app = TestApp::new().await;

    let body = captured_webhook_body("pay_wh_1", "order_test_77");
    let response = app.post_webhook(&body, &webhook_signature(&body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let ack = response_json(response).await;
    assert_eq!(ack["ok"], true);

    let response = app
        .request_as_user(Method::GET, "/api/v1/orders/mine", None)
        .await;
    let orders = response_json(response).await;
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["payment_ref"], "pay_wh_1");
    assert_eq!(orders[0]["payment_status"], "paid");
}

#[tokio::test]
async fn webhook_and_confirm_share_one_idempotence_key() {
    let app = TestApp::new().await;

    let intent = create_intent(&app).await;
    let order_ref = intent["gateway_order_ref"].as_str().unwrap().to_string();

    // Client-side confirm lands first, then the provider's webhook fires for
    // the same payment.
    let confirmation = confirm(&app, &order_ref, "pay_both_1").await;

    let body = captured_webhook_body("pay_both_1", &order_ref);
    let response = app.post_webhook(&body, &webhook_signature(&body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_as_user(Method::GET, "/api/v1/orders/mine", None)
        .await;
    let orders = response_json(response).await;
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], confirmation["order_id"]);
}

#[tokio::test]
async fn remote_order_status_polls_the_provider() {
    let app = TestApp::new().await;

    let intent = create_intent(&app).await;
    let order_ref = intent["gateway_order_ref"].as_str().unwrap();

    let response = app
        .request_as_user(
            Method::GET,
            &format!("/api/v1/payments/remote/{}", order_ref),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["gateway_order_ref"], order_ref);
    assert_eq!(body["status"], "created");
}

#[tokio::test]
async fn webhook_unknown_event_is_acknowledged() {
    let app = TestApp::new().await;

    let body = json!({"event": "payment.authorized", "payload": {}}).to_string();
    let response = app.post_webhook(&body, &webhook_signature(&body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let ack = response_json(response).await;
    assert_eq!(ack["ok"], true);
}

#[tokio::test]
async fn webhook_rejects_invalid_signature() {
    let app = TestApp::new().await;

    let body = captured_webhook_body("pay_forged_1", "order_test_9");
    let response = app.post_webhook(&body, "deadbeef").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_as_user(Method::GET, "/api/v1/orders/mine", None)
        .await;
    let orders = response_json(response).await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn webhook_signature_covers_exact_bytes() {
    let app = TestApp::new().await;

    let body = captured_webhook_body("pay_bytes_1", "order_test_9");
    let signature = webhook_signature(&body);

    // Same JSON, different bytes
    let reformatted = format!(" {}", body);
    let response = app.post_webhook(&reformatted, &signature).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
