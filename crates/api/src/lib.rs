//! HTTP API server with observability for the order-fulfillment
//! workflow.
//!
//! Exposes REST endpoints over the order orchestrator, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{
    CartClient, CatalogClient, ClientError, HttpCartClient, HttpCatalogClient, InMemoryCartClient,
    InMemoryCatalogClient, InMemoryReservationStore, OrchestratorConfig, OrderOrchestrator,
    ReservationStore,
};
use order_store::{InMemoryOrderRepository, OrderRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<Cart, Catalog, Repo, Store>(
    state: Arc<AppState<Cart, Catalog, Repo, Store>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<Cart, Catalog, Repo, Store>))
        .route("/orders", get(routes::orders::list::<Cart, Catalog, Repo, Store>))
        .route(
            "/orders/stats",
            get(routes::orders::stats::<Cart, Catalog, Repo, Store>),
        )
        .route("/orders/{id}", get(routes::orders::get::<Cart, Catalog, Repo, Store>))
        .route(
            "/orders/{id}/tracking",
            get(routes::orders::tracking::<Cart, Catalog, Repo, Store>),
        )
        .route(
            "/orders/{id}/transitions",
            get(routes::orders::transitions::<Cart, Catalog, Repo, Store>),
        )
        .route(
            "/orders/{id}/cancel",
            post(routes::orders::cancel::<Cart, Catalog, Repo, Store>),
        )
        .route(
            "/orders/{id}/return",
            post(routes::orders::initiate_return::<Cart, Catalog, Repo, Store>),
        )
        .route(
            "/orders/{id}/confirm-payment",
            post(routes::orders::confirm_payment::<Cart, Catalog, Repo, Store>),
        )
        .route(
            "/orders/{id}/payment-failed",
            post(routes::orders::payment_failed::<Cart, Catalog, Repo, Store>),
        )
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<Cart, Catalog, Repo, Store>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Default application state backed by the in-memory collaborators.
///
/// The fakes are returned alongside the state so callers (tests, local
/// runs) can seed carts and stock.
pub fn create_default_state(
    config: OrchestratorConfig,
) -> (
    Arc<
        AppState<
            InMemoryCartClient,
            InMemoryCatalogClient,
            InMemoryOrderRepository,
            InMemoryReservationStore,
        >,
    >,
    Arc<InMemoryCartClient>,
    Arc<InMemoryCatalogClient>,
) {
    let cart = Arc::new(InMemoryCartClient::new());
    let catalog = Arc::new(InMemoryCatalogClient::new());
    let repo = Arc::new(InMemoryOrderRepository::new());
    let store = Arc::new(InMemoryReservationStore::new());

    let orchestrator =
        OrderOrchestrator::new(cart.clone(), catalog.clone(), repo, store, config);
    let state = Arc::new(AppState { orchestrator });

    (state, cart, catalog)
}

/// Application state talking to real collaborators over HTTP, with
/// in-memory order storage and reservation records.
pub fn create_http_state(
    config: &config::Config,
) -> Result<
    Arc<
        AppState<HttpCartClient, HttpCatalogClient, InMemoryOrderRepository, InMemoryReservationStore>,
    >,
    ClientError,
> {
    let timeout = std::time::Duration::from_secs(5);
    let cart = Arc::new(HttpCartClient::new(config.cart_service_url.clone(), timeout)?);
    let catalog = Arc::new(HttpCatalogClient::new(
        config.catalog_service_url.clone(),
        timeout,
    )?);
    let repo = Arc::new(InMemoryOrderRepository::new());
    let store = Arc::new(InMemoryReservationStore::new());

    let orchestrator =
        OrderOrchestrator::new(cart, catalog, repo, store, config.orchestrator.clone());
    Ok(Arc::new(AppState { orchestrator }))
}
