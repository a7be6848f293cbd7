//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Identity, Money, SessionId, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{
    CartItem, CartSnapshot, CartTotals, InMemoryCartClient, InMemoryCatalogClient,
    OrchestratorConfig,
};
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

struct TestApp {
    app: axum::Router,
    cart: Arc<InMemoryCartClient>,
    catalog: Arc<InMemoryCatalogClient>,
    user_id: UserId,
}

fn setup() -> TestApp {
    let (state, cart, catalog) = api::create_default_state(OrchestratorConfig::default());
    let app = api::create_app(state, get_metrics_handle());
    TestApp {
        app,
        cart,
        catalog,
        user_id: UserId::new(),
    }
}

fn two_widgets() -> CartSnapshot {
    let price = Money::from_cents(1000);
    CartSnapshot {
        items: vec![CartItem {
            product_id: "SKU-001".into(),
            variant_id: None,
            name: "Widget".to_string(),
            price,
            quantity: 2,
            image: None,
            product_snapshot: Default::default(),
        }],
        totals: CartTotals {
            subtotal: Money::from_cents(2000),
            tax: Money::zero(),
            shipping: Money::zero(),
            discount: Money::zero(),
            total: Money::from_cents(2000),
        },
    }
}

fn seeded() -> TestApp {
    let t = setup();
    t.catalog.set_stock("SKU-001", 10, Money::from_cents(1000));
    t.cart.set_cart(&Identity::User(t.user_id), two_widgets());
    t
}

fn checkout_body() -> String {
    serde_json::to_string(&serde_json::json!({
        "email": "asha@example.com",
        "shipping_address": {
            "full_name": "Asha Rao",
            "phone": "5550100",
            "street": "1 Main St",
            "city": "Pune",
            "state": "MH",
            "zip_code": "411001",
            "country": "India"
        },
        "payment_method": "card"
    }))
    .unwrap()
}

fn post(uri: &str, user_id: Option<UserId>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user_id) = user_id {
        builder = builder.header("X-User-Id", user_id.to_string());
    }
    builder.body(Body::from(body)).unwrap()
}

fn get(uri: &str, user_id: Option<UserId>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header("X-User-Id", user_id.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn place_order(t: &TestApp) -> serde_json::Value {
    let response = t
        .app
        .clone()
        .oneshot(post("/orders", Some(t.user_id), checkout_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();

    let response = t.app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();

    let response = t.app.oneshot(get("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_order() {
    let t = seeded();

    let json = place_order(&t).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["pricing"]["total"], 2000);
    assert!(json["data"]["order_number"].as_str().is_some());
}

#[tokio::test]
async fn test_create_order_without_user_header_is_401() {
    let t = seeded();

    let response = t
        .app
        .oneshot(post("/orders", None, checkout_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_order_with_empty_cart_is_400() {
    let t = setup();

    let response = t
        .app
        .oneshot(post("/orders", Some(t.user_id), checkout_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_create_order_without_stock_is_400() {
    let t = seeded();
    t.catalog.set_stock("SKU-001", 1, Money::from_cents(1000));

    let response = t
        .app
        .oneshot(post("/orders", Some(t.user_id), checkout_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_order_uses_guest_session_cart() {
    let t = setup();
    t.catalog.set_stock("SKU-001", 10, Money::from_cents(1000));
    t.cart
        .set_cart(&Identity::Guest(SessionId::new("sess-42")), two_widgets());

    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .header("X-User-Id", t.user_id.to_string())
        .header("X-Session-Id", "sess-42")
        .body(Body::from(checkout_body()))
        .unwrap();
    let response = t.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    assert_eq!(json["data"]["pricing"]["total"], 2000);
    assert_eq!(json["data"]["user_id"], t.user_id.to_string());
}

#[tokio::test]
async fn test_get_order_scoped_to_owner() {
    let t = seeded();
    let created = place_order(&t).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let response = t
        .app
        .clone()
        .oneshot(get(&format!("/orders/{id}"), Some(t.user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // another user cannot see it
    let response = t
        .app
        .clone()
        .oneshot(get(&format!("/orders/{id}"), Some(UserId::new())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // malformed ID is a bad request, not a 404
    let response = t
        .app
        .oneshot(get("/orders/not-a-uuid", Some(t.user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_pagination_envelope() {
    let t = seeded();
    place_order(&t).await;

    let response = t
        .app
        .oneshot(get("/orders?page=1&limit=10", Some(t.user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["data"]["total_items"], 1);
    assert_eq!(json["data"]["total_pages"], 1);
    assert_eq!(json["data"]["has_next_page"], false);
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_orders_rejects_unknown_status_filter() {
    let t = setup();

    let response = t
        .app
        .oneshot(get("/orders?status=bogus", Some(t.user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_confirm_payment_flow() {
    let t = seeded();
    let created = place_order(&t).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let response = t
        .app
        .clone()
        .oneshot(post(
            &format!("/orders/{id}/confirm-payment"),
            None,
            serde_json::json!({ "transaction_id": "txn-1" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["data"]["status"], "confirmed");
    assert_eq!(json["data"]["payment"]["status"], "completed");
    assert_eq!(t.catalog.total(&"SKU-001".into()), 8);
}

#[tokio::test]
async fn test_payment_failed_flow() {
    let t = seeded();
    let created = place_order(&t).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let response = t
        .app
        .oneshot(post(
            &format!("/orders/{id}/payment-failed"),
            None,
            serde_json::json!({ "reason": "card declined" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["data"]["status"], "payment_failed");
}

#[tokio::test]
async fn test_cancel_order_releases_stock() {
    let t = seeded();
    let created = place_order(&t).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(t.catalog.available(&"SKU-001".into()), 8);

    let response = t
        .app
        .oneshot(post(
            &format!("/orders/{id}/cancel"),
            Some(t.user_id),
            serde_json::json!({ "reason": "changed my mind" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["data"]["status"], "cancelled");
    assert_eq!(t.catalog.available(&"SKU-001".into()), 10);
}

#[tokio::test]
async fn test_cancel_twice_is_rejected() {
    let t = seeded();
    let created = place_order(&t).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let cancel_body = serde_json::json!({ "reason": "changed my mind" }).to_string();
    let response = t
        .app
        .clone()
        .oneshot(post(
            &format!("/orders/{id}/cancel"),
            Some(t.user_id),
            cancel_body.clone(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = t
        .app
        .oneshot(post(
            &format!("/orders/{id}/cancel"),
            Some(t.user_id),
            cancel_body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_stats_summarize_history() {
    let t = seeded();
    let first = place_order(&t).await;
    let first_id = first["data"]["id"].as_str().unwrap().to_string();

    // let the first order's spawned cart clear land before re-seeding
    let identity = Identity::User(t.user_id);
    for _ in 0..100 {
        if t.cart.cleared_count(&identity) == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    // second order from a fresh cart, then cancel the first one
    t.cart.set_cart(&identity, two_widgets());
    place_order(&t).await;
    let response = t
        .app
        .clone()
        .oneshot(post(
            &format!("/orders/{first_id}/cancel"),
            Some(t.user_id),
            serde_json::json!({ "reason": "changed my mind" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = t
        .app
        .clone()
        .oneshot(get("/orders/stats", Some(t.user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["data"]["total_orders"], 2);
    assert_eq!(json["data"]["cancelled_orders"], 1);
    assert_eq!(json["data"]["total_spent"], 2000);

    // identity is required here like every other customer read
    let response = t.app.oneshot(get("/orders/stats", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_update_and_tracking() {
    let t = seeded();
    let created = place_order(&t).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    for body in [
        serde_json::json!({ "status": "confirmed" }),
        serde_json::json!({ "status": "processing" }),
        serde_json::json!({
            "status": "shipped",
            "carrier": "BlueDart",
            "tracking_number": "BD123"
        }),
        serde_json::json!({ "status": "out_for_delivery" }),
        serde_json::json!({ "status": "delivered" }),
    ] {
        let response = t
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri(format!("/orders/{id}/status"))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = t
        .app
        .clone()
        .oneshot(get(&format!("/orders/{id}/tracking"), Some(t.user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["data"]["carrier"], "BlueDart");
    assert_eq!(json["data"]["tracking_number"], "BD123");
    assert!(json["data"]["actual_delivery"].as_str().is_some());
    assert!(json["data"]["status_history"].as_array().unwrap().len() >= 6);
}

#[tokio::test]
async fn test_invalid_transition_is_rejected() {
    let t = seeded();
    let created = place_order(&t).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let response = t
        .app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/orders/{id}/status"))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "status": "delivered" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_return_after_delivery() {
    let t = seeded();
    let created = place_order(&t).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    for status in ["confirmed", "processing", "shipped", "out_for_delivery", "delivered"] {
        let response = t
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri(format!("/orders/{id}/status"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "status": status }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = t
        .app
        .oneshot(post(
            &format!("/orders/{id}/return"),
            Some(t.user_id),
            serde_json::json!({ "reason": "wrong size" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["data"]["status"], "delivered");
    assert_eq!(json["data"]["return_request"]["status"], "requested");
}
