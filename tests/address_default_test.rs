//! Integration tests for the address book and its single-default invariant.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::{json, Value};

fn address_payload(name: &str, is_default: bool) -> Value {
    json!({
        "name": name,
        "phone": "9999999999",
        "line": "12 Test Lane",
        "locality": "Midtown",
        "city": "Pune",
        "state": "MH",
        "postal_code": "411001",
        "kind": "Home",
        "is_default": is_default
    })
}

async fn create_address(app: &TestApp, name: &str, is_default: bool) -> String {
    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/addresses",
            Some(address_payload(name, is_default)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn list_addresses(app: &TestApp) -> Vec<Value> {
    let response = app
        .request_as_user(Method::GET, "/api/v1/addresses/mine", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    body["data"].as_array().unwrap().clone()
}

fn default_ids(addresses: &[Value]) -> Vec<String> {
    addresses
        .iter()
        .filter(|address| address["is_default"] == true)
        .map(|address| address["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn new_default_clears_previous_default() {
    let app = TestApp::new().await;

    let first = create_address(&app, "First", true).await;
    assert_eq!(default_ids(&list_addresses(&app).await), vec![first.clone()]);

    let second = create_address(&app, "Second", true).await;
    let addresses = list_addresses(&app).await;
    assert_eq!(addresses.len(), 2);
    assert_eq!(default_ids(&addresses), vec![second]);
}

#[tokio::test]
async fn non_default_create_keeps_existing_default() {
    let app = TestApp::new().await;

    let first = create_address(&app, "First", true).await;
    create_address(&app, "Second", false).await;

    assert_eq!(default_ids(&list_addresses(&app).await), vec![first]);
}

#[tokio::test]
async fn updating_to_default_moves_the_flag() {
    let app = TestApp::new().await;

    create_address(&app, "First", true).await;
    let second = create_address(&app, "Second", false).await;

    let response = app
        .request_as_user(
            Method::PUT,
            &format!("/api/v1/addresses/{}", second),
            Some(address_payload("Second", true)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let addresses = list_addresses(&app).await;
    assert_eq!(default_ids(&addresses), vec![second.clone()]);
    // Default sorts first
    assert_eq!(addresses[0]["id"], second.as_str());
}

#[tokio::test]
async fn zero_defaults_is_legal() {
    let app = TestApp::new().await;

    create_address(&app, "Only", false).await;
    assert!(default_ids(&list_addresses(&app).await).is_empty());
}

#[tokio::test]
async fn defaults_are_scoped_per_owner() {
    let app = TestApp::new().await;

    let mine = create_address(&app, "Mine", true).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/addresses",
            &[("x-user-id", "user-2"), ("x-user-email", "other@example.com")],
            Some(address_payload("Theirs", true)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // The other owner's default does not disturb this owner's
    assert_eq!(default_ids(&list_addresses(&app).await), vec![mine]);
}

#[tokio::test]
async fn foreign_address_reads_as_not_found() {
    let app = TestApp::new().await;
    let mine = create_address(&app, "Mine", true).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/addresses/{}", mine),
            &[("x-user-id", "user-2"), ("x-user-email", "other@example.com")],
            Some(address_payload("Hijack", true)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/addresses/{}", mine),
            &[("x-user-id", "user-2"), ("x-user-email", "other@example.com")],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_leaves_other_addresses_alone() {
    let app = TestApp::new().await;

    let first = create_address(&app, "First", true).await;
    let second = create_address(&app, "Second", false).await;

    let response = app
        .request_as_user(
            Method::DELETE,
            &format!("/api/v1/addresses/{}", second),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let addresses = list_addresses(&app).await;
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0]["id"], first.as_str());
    assert_eq!(default_ids(&addresses), vec![first]);
}

#[tokio::test]
async fn deleting_an_address_never_touches_order_snapshots() {
    let app = TestApp::new().await;

    let address_id = create_address(&app, "Shipping", true).await;

    // Place an order shipped to (a snapshot of) that address
    let order_ref = "order_snap_1";
    let signature = common::payment_signature(order_ref, "pay_snap_1");
    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/payments/confirm",
            Some(json!({
                "gateway_order_ref": order_ref,
                "payment_ref": "pay_snap_1",
                "signature": signature,
                "items": [
                    {"product_ref": "prod-1", "name": "Steel Bottle", "unit_price": 100, "quantity": 1}
                ],
                "address": address_payload("Shipping", true)
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_as_user(
            Method::DELETE,
            &format!("/api/v1/addresses/{}", address_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The order still carries its own copy
    let response = app
        .request_as_user(Method::GET, "/api/v1/orders/mine", None)
        .await;
    let orders = response_json(response).await;
    assert_eq!(orders[0]["shipping_address"]["city"], "Pune");
}

#[tokio::test]
async fn address_validation_rejects_missing_fields() {
    let app = TestApp::new().await;

    let response = app
        .request_as_user(
            Method::POST,
            "/api/v1/addresses",
            Some(json!({
                "name": "",
                "phone": "99",
                "line": "",
                "city": "",
                "state": "",
                "postal_code": "41",
                "kind": "Home"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_address_kind_is_rejected_at_the_boundary() {
    let app = TestApp::new().await;

    let mut payload = address_payload("Odd", false);
    payload["kind"] = json!("Castle");
    let response = app
        .request_as_user(Method::POST, "/api/v1/addresses", Some(payload))
        .await;
    // Serde rejects the unknown variant before the service sees it
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
