//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::Collaborators;
use api::routes::orders::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{CustomerId, ProductId};
use dispatch::Dispatcher;
use domain::{CustomerSnapshot, CustomerTier, Money, ProductSnapshot, ProductStatus};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::OrchestratorConfig;
use serde_json::{Value, json};
use store::InMemoryOrderStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const ALICE: i64 = 1;
const WIDGET: i64 = 10;

fn collaborators() -> Collaborators {
    let collaborators = Collaborators::default();
    collaborators.inventory.upsert(ProductSnapshot {
        id: ProductId::new(WIDGET),
        name: "Widget".to_string(),
        sku: "WDG-010".to_string(),
        price: Money::from_cents(1000),
        stock_quantity: 10,
        status: ProductStatus::Active,
        available: true,
    });
    collaborators.customers.upsert(CustomerSnapshot {
        id: CustomerId::new(ALICE),
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        full_name: "Alice Liddell".to_string(),
        tier: CustomerTier::Platinum,
        loyalty_points: 0,
    });
    collaborators
}

struct TestApp {
    app: axum::Router,
    state: Arc<AppState<InMemoryOrderStore>>,
    collaborators: Collaborators,
}

fn setup() -> TestApp {
    let collaborators = collaborators();
    let state = api::create_state(
        Arc::new(InMemoryOrderStore::new()),
        &collaborators,
        OrchestratorConfig::default(),
        Dispatcher::default(),
    );
    let app = api::create_app(Arc::clone(&state), get_metrics_handle());
    TestApp {
        app,
        state,
        collaborators,
    }
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
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

async fn create_order(app: &axum::Router, quantity: u32) -> i64 {
    let (status, json) = send(
        app,
        "POST",
        "/orders",
        Some(json!({
            "customer_id": ALICE,
            "lines": [{ "product_id": WIDGET, "quantity": quantity }],
            "payment_method": "CREDIT_CARD"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();

    let (status, json) = send(&t.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["degraded"], json!([]));
}

#[tokio::test]
async fn test_create_order_returns_priced_order() {
    let t = setup();

    let (status, json) = send(
        &t.app,
        "POST",
        "/orders",
        Some(json!({
            "customer_id": ALICE,
            "lines": [{ "product_id": WIDGET, "quantity": 2 }],
            "notes": "leave at the door"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "CONFIRMED");
    assert_eq!(json["subtotal_cents"], 2000);
    assert_eq!(json["discount_cents"], 300);
    assert_eq!(json["tax_cents"], 145);
    assert_eq!(json["shipping_cents"], 999);
    assert_eq!(json["final_amount_cents"], 2844);
    assert_eq!(json["customer_name"], "Alice Liddell");
    assert_eq!(json["items"][0]["quantity"], 2);
    assert!(json["payment_transaction_id"].as_str().unwrap().starts_with("TXN_"));
}

#[tokio::test]
async fn test_create_and_get_order() {
    let t = setup();
    let id = create_order(&t.app, 1).await;

    let (status, json) = send(&t.app, "GET", &format!("/orders/{id}"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id);
    assert_eq!(json["items"][0]["product_id"], WIDGET);
}

#[tokio::test]
async fn test_get_missing_order_is_404() {
    let t = setup();

    let (status, json) = send(&t.app, "GET", "/orders/999", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_order_id_is_400() {
    let t = setup();

    let (status, json) = send(&t.app, "GET", "/orders/abc", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_create_with_empty_lines_is_400() {
    let t = setup();

    let (status, json) = send(
        &t.app,
        "POST",
        "/orders",
        Some(json!({ "customer_id": ALICE, "lines": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_create_with_insufficient_stock_is_422() {
    let t = setup();

    let (status, json) = send(
        &t.app,
        "POST",
        "/orders",
        Some(json!({
            "customer_id": ALICE,
            "lines": [{ "product_id": WIDGET, "quantity": 11 }]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn test_unknown_status_is_400() {
    let t = setup();
    let id = create_order(&t.app, 1).await;

    let (status, json) = send(
        &t.app,
        "PUT",
        &format!("/orders/{id}/status"),
        Some(json!({ "status": "LOST" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_skipping_a_step_is_409() {
    let t = setup();
    let id = create_order(&t.app, 1).await;

    let (status, json) = send(
        &t.app,
        "PUT",
        &format!("/orders/{id}/status"),
        Some(json!({ "status": "SHIPPED" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_ORDER_STATE");
}

#[tokio::test]
async fn test_process_then_ship_then_deliver() {
    let t = setup();
    let id = create_order(&t.app, 3).await;

    let (status, json) = send(&t.app, "POST", &format!("/orders/{id}/process"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "PROCESSING");
    assert_eq!(t.collaborators.inventory.stock(ProductId::new(WIDGET)), Some(7));

    let (status, json) = send(
        &t.app,
        "PUT",
        &format!("/orders/{id}/status"),
        Some(json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["tracking_number"].as_str().unwrap().starts_with("TRK"));

    let (status, json) = send(
        &t.app,
        "PUT",
        &format!("/orders/{id}/status"),
        Some(json!({ "status": "DELIVERED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "DELIVERED");
    assert!(json["delivered_at"].is_string());
}

#[tokio::test]
async fn test_cancel_processing_order_refunds_and_releases_stock() {
    let t = setup();
    let id = create_order(&t.app, 2).await;
    send(&t.app, "POST", &format!("/orders/{id}/process"), None).await;

    let (status, json) = send(
        &t.app,
        "POST",
        &format!("/orders/{id}/cancel"),
        Some(json!({ "reason": "changed my mind" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CANCELLED");
    assert_eq!(t.collaborators.inventory.stock(ProductId::new(WIDGET)), Some(10));
    assert_eq!(t.collaborators.payments.refunds().len(), 1);

    let (status, json) = send(
        &t.app,
        "POST",
        &format!("/orders/{id}/cancel"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_ORDER_STATE");
}

#[tokio::test]
async fn test_trigger_processing_is_accepted() {
    let t = setup();
    let id = create_order(&t.app, 1).await;

    let (status, _) = send(
        &t.app,
        "POST",
        &format!("/orders/{id}/trigger-processing"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, json) = send(&t.app, "POST", "/orders/999/trigger-processing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_search_and_customer_listings() {
    let t = setup();
    let small = create_order(&t.app, 1).await;
    let large = create_order(&t.app, 5).await;

    let (status, json) = send(&t.app, "GET", "/orders?status=CONFIRMED", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (status, json) = send(&t.app, "GET", "/orders?status=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_FAILED");

    let (_, json) = send(&t.app, "GET", &format!("/customers/{ALICE}/orders"), None).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let (_, json) = send(
        &t.app,
        "GET",
        &format!("/customers/{ALICE}/orders/summary"),
        None,
    )
    .await;
    let ids: Vec<i64> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["order_id"].as_i64().unwrap())
        .collect();
    assert!(ids.contains(&small) && ids.contains(&large));

    let (_, json) = send(&t.app, "GET", "/orders/high-value?min_amount_cents=4000", None).await;
    let ids: Vec<i64> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![large]);
}

#[tokio::test]
async fn test_inverted_amount_range_is_400() {
    let t = setup();

    let (status, json) = send(
        &t.app,
        "GET",
        "/orders?min_amount_cents=5000&max_amount_cents=100",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_analytics_for_customer() {
    let t = setup();
    create_order(&t.app, 1).await;
    create_order(&t.app, 2).await;

    let (status, json) = send(&t.app, "GET", &format!("/orders/analytics?customer_id={ALICE}"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status_breakdown"][0]["status"], "CONFIRMED");
    assert_eq!(json["status_breakdown"][0]["count"], 2);
    assert_eq!(json["customer"]["total_orders"], 2);
}

#[tokio::test]
async fn test_statistics_count_pending_and_delivered() {
    let t = setup();
    create_order(&t.app, 1).await;
    let id = create_order(&t.app, 1).await;
    send(&t.app, "POST", &format!("/orders/{id}/process"), None).await;
    for next in ["SHIPPED", "DELIVERED"] {
        let (status, _) = send(
            &t.app,
            "PUT",
            &format!("/orders/{id}/status"),
            Some(json!({ "status": next })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = send(&t.app, "GET", "/orders/statistics", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_orders"], 2);
    assert_eq!(json["pending_orders"], 0);
    assert_eq!(json["completed_orders"], 1);
    assert!(json["generated_at"].is_string());
}

#[tokio::test]
async fn test_bulk_operations() {
    let t = setup();
    let id = create_order(&t.app, 1).await;
    send(&t.app, "POST", &format!("/orders/{id}/process"), None).await;

    let (status, json) = send(
        &t.app,
        "POST",
        "/orders/bulk",
        Some(json!({ "operation": "update_tracking", "order_ids": [id, 999] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["operation"], "UPDATE_TRACKING");
    assert_eq!(json["affected"], 1);
    let (_, order) = send(&t.app, "GET", &format!("/orders/{id}"), None).await;
    assert!(order["tracking_number"].as_str().unwrap().starts_with("TRK"));

    let (status, json) = send(
        &t.app,
        "POST",
        "/orders/bulk",
        Some(json!({ "operation": "CANCEL_STALE" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["affected"], 0);
}

#[tokio::test]
async fn test_unsupported_bulk_operation_is_400() {
    let t = setup();

    let (status, json) = send(
        &t.app,
        "POST",
        "/orders/bulk",
        Some(json!({ "operation": "ARCHIVE" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_FAILED");
    assert!(json["message"].as_str().unwrap().contains("Unsupported operation: ARCHIVE"));
}

#[tokio::test]
async fn test_collaborator_status_reports_breakers() {
    let t = setup();

    let (status, json) = send(&t.app, "GET", "/collaborators/status", None).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["inventory", "customer"]);
    assert_eq!(json[0]["state"], "CLOSED");
}

#[tokio::test]
async fn test_open_breaker_shows_as_degraded() {
    let t = setup();
    t.state.orchestrator.inventory_guard().breaker().force_open();

    let (status, json) = send(&t.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["degraded"], json!(["inventory"]));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    create_order(&t.app, 1).await;

    let response = t
        .app
        .clone()
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
async fn test_demo_collaborators_accept_orders() {
    let state = api::create_state(
        Arc::new(InMemoryOrderStore::new()),
        &Collaborators::demo(),
        OrchestratorConfig::default(),
        Dispatcher::default(),
    );
    let app = api::create_app(state, get_metrics_handle());

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({ "customer_id": 4, "lines": [{ "product_id": 2, "quantity": 1 }] })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["customer_name"], "Maria Lopez");
    assert_eq!(json["subtotal_cents"], 2499);
}
