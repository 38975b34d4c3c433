//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> Router {
    let state = Arc::new(api::AppState::new(InMemoryStore::new()));
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_product(app: &Router, name: &str, price: i64) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/products",
        Some(json!({ "name": name, "price": price })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

async fn create_slot(app: &Router, start: &str, end: &str) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/sales-slots",
        Some(json!({ "startTime": start, "endTime": end })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["isActive"], false);
    json["id"].as_str().unwrap().to_string()
}

/// An active slot stocking one product; returns `(slot_id, product_id)`.
async fn stocked_slot(app: &Router, price: i64, quantity: u32) -> (String, String) {
    let product_id = create_product(app, "Yakisoba", price).await;
    let slot_id = create_slot(app, "2026-11-03T11:00:00Z", "2026-11-03T11:30:00Z").await;

    let (status, _) = send(
        app,
        "POST",
        &format!("/api/v1/sales-slots/{slot_id}/products"),
        Some(json!({ "productId": product_id, "initialQuantity": quantity })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        app,
        "PUT",
        &format!("/api/v1/sales-slots/{slot_id}/activate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (slot_id, product_id)
}

async fn place_order(
    app: &Router,
    slot_id: &str,
    product_id: &str,
    quantity: u32,
    ticket: &str,
) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/v1/orders",
        Some(json!({
            "salesSlotId": slot_id,
            "items": [{ "productId": product_id, "quantity": quantity }],
            "ticketNumber": ticket,
        })),
    )
    .await
}

async fn inventory(app: &Router, slot_id: &str) -> Value {
    let (status, json) = send(
        app,
        "GET",
        &format!("/api/v1/sales-slots/{slot_id}/products"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json[0].clone()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_product_crud() {
    let app = setup();
    let id = create_product(&app, "Takoyaki", 500).await;

    let (status, json) = send(&app, "GET", &format!("/api/v1/products/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Takoyaki");
    assert_eq!(json["price"], 500);

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/api/v1/products/{id}"),
        Some(json!({ "name": "Takoyaki (8)", "price": 600 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["price"], 600);

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/products/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/api/v1/products/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send(&app, "GET", "/api/v1/products", None).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_product_validation() {
    let app = setup();

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/products",
        Some(json!({ "name": "Ramune", "price": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/products",
        Some(json!({ "name": "  ", "price": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_slot_lifecycle_and_queries() {
    let app = setup();
    let morning = create_slot(&app, "2026-11-03T10:00:00Z", "2026-11-03T10:30:00Z").await;
    let noon = create_slot(&app, "2026-11-03T12:00:00Z", "2026-11-03T12:30:00Z").await;

    let (status, json) = send(
        &app,
        "PUT",
        &format!("/api/v1/sales-slots/{noon}/activate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["isActive"], true);

    let (_, json) = send(&app, "GET", "/api/v1/sales-slots/active", None).await;
    let active = json.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], noon.as_str());

    let (status, json) = send(
        &app,
        "GET",
        "/api/v1/sales-slots/range?start=2026-11-03T10:15:00Z&end=2026-11-03T11:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let found = json.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], morning.as_str());

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/sales-slots/{noon}/deactivate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, "GET", "/api/v1/sales-slots", None).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_slot_rejects_inverted_range() {
    let app = setup();
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/sales-slots",
        Some(json!({
            "startTime": "2026-11-03T12:00:00Z",
            "endTime": "2026-11-03T11:00:00Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/sales-slots/range?start=yesterday&end=2026-11-03T11:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_inventory_conflicts() {
    let app = setup();
    let (slot_id, product_id) = stocked_slot(&app, 500, 10).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/sales-slots/{slot_id}/products"),
        Some(json!({ "productId": product_id, "initialQuantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let row = inventory(&app, &slot_id).await;
    assert_eq!(row["initialQuantity"], 10);
    assert_eq!(row["availableQuantity"], 10);
}

#[tokio::test]
async fn test_order_on_inactive_slot_is_rejected() {
    let app = setup();
    let product_id = create_product(&app, "Crepe", 400).await;
    let slot_id = create_slot(&app, "2026-11-03T13:00:00Z", "2026-11-03T13:30:00Z").await;
    send(
        &app,
        "POST",
        &format!("/api/v1/sales-slots/{slot_id}/products"),
        Some(json!({ "productId": product_id, "initialQuantity": 5 })),
    )
    .await;

    let (status, _) = place_order(&app, &slot_id, &product_id, 1, "A-001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let row = inventory(&app, &slot_id).await;
    assert_eq!(row["reservedQuantity"], 0);
}

#[tokio::test]
async fn test_create_order_reserves_stock() {
    let app = setup();
    let (slot_id, product_id) = stocked_slot(&app, 500, 10).await;

    let (status, order) = place_order(&app, &slot_id, &product_id, 3, "A-001").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "RESERVED");
    assert_eq!(order["paymentMethod"], "CASH");
    assert_eq!(order["totalAmount"], 1500);
    assert_eq!(order["items"][0]["subtotal"], 1500);
    assert_eq!(order["isPaid"], false);

    let row = inventory(&app, &slot_id).await;
    assert_eq!(row["reservedQuantity"], 3);
    assert_eq!(row["availableQuantity"], 7);

    let (status, json) = send(&app, "GET", "/api/v1/orders/number/A-001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], order["id"]);
}

#[tokio::test]
async fn test_insufficient_inventory_conflicts() {
    let app = setup();
    let (slot_id, product_id) = stocked_slot(&app, 500, 2).await;

    let (status, json) = place_order(&app, &slot_id, &product_id, 3, "A-001").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("Insufficient"));

    let (_, orders) = send(&app, "GET", "/api/v1/orders", None).await;
    assert!(orders.as_array().unwrap().is_empty());
    assert_eq!(inventory(&app, &slot_id).await["reservedQuantity"], 0);
}

#[tokio::test]
async fn test_duplicate_ticket_conflicts() {
    let app = setup();
    let (slot_id, product_id) = stocked_slot(&app, 500, 10).await;

    let (status, _) = place_order(&app, &slot_id, &product_id, 1, "A-007").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = place_order(&app, &slot_id, &product_id, 1, "A-007").await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(inventory(&app, &slot_id).await["reservedQuantity"], 1);
}

#[tokio::test]
async fn test_add_items_then_confirm_then_cancel() {
    let app = setup();
    let (slot_id, product_id) = stocked_slot(&app, 500, 10).await;
    let (_, order) = place_order(&app, &slot_id, &product_id, 2, "A-002").await;
    let id = order["id"].as_str().unwrap();

    let (status, order) = send(
        &app,
        "POST",
        &format!("/api/v1/orders/{id}/items"),
        Some(json!({ "items": [{ "productId": product_id, "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!(order["totalAmount"], 1500);

    let (status, order) = send(&app, "PUT", &format!("/api/v1/orders/{id}/confirm"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "CONFIRMED");

    let row = inventory(&app, &slot_id).await;
    assert_eq!(row["reservedQuantity"], 0);
    assert_eq!(row["soldQuantity"], 3);

    let (status, _) = send(&app, "PUT", &format!("/api/v1/orders/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/orders/{id}/items"),
        Some(json!({ "items": [{ "productId": product_id, "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(inventory(&app, &slot_id).await["soldQuantity"], 3);
}

#[tokio::test]
async fn test_update_status_endpoint() {
    let app = setup();
    let (slot_id, product_id) = stocked_slot(&app, 500, 10).await;
    let (_, order) = place_order(&app, &slot_id, &product_id, 4, "A-003").await;
    let id = order["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/orders/{id}/status"),
        Some(json!({ "status": "SHIPPED" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, order) = send(
        &app,
        "PUT",
        &format!("/api/v1/orders/{id}/status"),
        Some(json!({ "status": "CANCELLED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "CANCELLED");
    assert_eq!(inventory(&app, &slot_id).await["availableQuantity"], 10);

    let (status, json) = send(&app, "GET", "/api/v1/orders/status?status=CANCELLED", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (_, json) = send(&app, "GET", "/api/v1/orders/status?status=RESERVED", None).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_and_delivery_flags() {
    let app = setup();
    let (slot_id, product_id) = stocked_slot(&app, 500, 10).await;
    let (_, order) = place_order(&app, &slot_id, &product_id, 1, "A-004").await;
    let id = order["id"].as_str().unwrap();

    let (status, order) = send(
        &app,
        "PUT",
        &format!("/api/v1/orders/{id}/payment"),
        Some(json!({ "transactionId": "txn-42" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["isPaid"], true);
    assert_eq!(order["transactionId"], "txn-42");
    assert_eq!(order["status"], "RESERVED");

    let (status, order) = send(&app, "PUT", &format!("/api/v1/orders/{id}/delivery"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["isDelivered"], true);
}

#[tokio::test]
async fn test_manual_inventory_correction() {
    let app = setup();
    let (slot_id, product_id) = stocked_slot(&app, 500, 10).await;

    let (status, row) = send(
        &app,
        "PUT",
        &format!("/api/v1/sales-slots/{slot_id}/products/{product_id}"),
        Some(json!({ "reservedQuantity": 2, "soldQuantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["availableQuantity"], 3);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/sales-slots/{slot_id}/products/{product_id}"),
        Some(json!({ "reservedQuantity": 6, "soldQuantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invalid_ids_and_unknown_payment_method() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/api/v1/orders/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("order"));

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/orders/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (slot_id, product_id) = stocked_slot(&app, 500, 10).await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/orders",
        Some(json!({
            "salesSlotId": slot_id,
            "items": [{ "productId": product_id, "quantity": 1 }],
            "ticketNumber": "A-005",
            "paymentMethod": "BITCOIN",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, order) = send(
        &app,
        "POST",
        "/api/v1/orders",
        Some(json!({
            "salesSlotId": slot_id,
            "items": [{ "productId": product_id, "quantity": 1 }],
            "ticketNumber": "A-006",
            "paymentMethod": "PAYPAY",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["paymentMethod"], "PAYPAY");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let (slot_id, product_id) = stocked_slot(&app, 500, 10).await;
    let (status, _) = place_order(&app, &slot_id, &product_id, 1, "M-001").await;
    assert_eq!(status, StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}

#[tokio::test]
async fn test_order_total_past_money_range_is_rejected() {
    let app = setup();
    let (slot_id, product_id) = stocked_slot(&app, i64::MAX / 2 + 1, 10).await;

    let (status, json) = place_order(&app, &slot_id, &product_id, 2, "X-001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("overflows"));
    assert_eq!(inventory(&app, &slot_id).await["reservedQuantity"], 0);

    let (status, order) = place_order(&app, &slot_id, &product_id, 1, "X-002").await;
    assert_eq!(status, StatusCode::CREATED);
    let id = order["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/orders/{id}/items"),
        Some(json!({ "items": [{ "productId": product_id, "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(inventory(&app, &slot_id).await["reservedQuantity"], 1);
}
