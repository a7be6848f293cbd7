//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{Identity, OrderId, SessionId, UserId};
use domain::{
    Actor, Address, Metadata, Order, OrderStatus, PaymentMethod, Tracking, allowed_transitions,
};
use orchestrator::{
    CartClient, CatalogClient, CheckoutInput, OrderOrchestrator, PaymentData, ReservationStore,
    ShipmentDetails,
};
use order_store::{ListQuery, OrderRepository, OrderStats, Page, SortField, SortOrder};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<Cart, Catalog, Repo, Store> {
    pub orchestrator: OrderOrchestrator<Cart, Catalog, Repo, Store>,
}

/// Response envelope shared by every endpoint.
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub email: String,
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort_by: Option<SortField>,
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
}

#[derive(Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct ConfirmPaymentRequest {
    pub transaction_id: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

// -- Identity extraction --

/// Reads the authenticated user from the `X-User-Id` header the gateway
/// injects. Guests cannot own orders, so a missing header is 401.
fn require_user(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;
    let uuid = uuid::Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid X-User-Id header: {e}")))?;
    Ok(UserId::from_uuid(uuid))
}

/// The identity the cart was built under. A guest cart carries the
/// gateway's `X-Session-Id` through login, so checkout still finds it.
fn cart_identity(headers: &HeaderMap, user_id: UserId) -> Identity {
    headers
        .get("X-Session-Id")
        .and_then(|v| v.to_str().ok())
        .map(|session| Identity::Guest(SessionId::new(session)))
        .unwrap_or(Identity::User(user_id))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

fn parse_status(s: &str) -> Result<OrderStatus, ApiError> {
    OrderStatus::parse(s).ok_or_else(|| ApiError::BadRequest(format!("Unknown status: {s}")))
}

// -- Handlers --

/// POST /orders — place an order from the caller's active cart.
#[tracing::instrument(skip_all)]
pub async fn create<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Envelope<Order>>), ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let user_id = require_user(&headers)?;
    let identity = cart_identity(&headers, user_id);
    let order = state
        .orchestrator
        .create_order(
            identity,
            user_id,
            req.email,
            CheckoutInput {
                shipping_address: req.shipping_address,
                billing_address: req.billing_address,
                payment_method: req.payment_method,
                metadata: req.metadata,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope {
            success: true,
            message: "Order placed successfully".to_string(),
            data: order,
        }),
    ))
}

/// GET /orders — list the caller's orders.
#[tracing::instrument(skip_all)]
pub async fn list<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Envelope<Page<Order>>>, ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let user_id = require_user(&headers)?;
    let status = params.status.as_deref().map(parse_status).transpose()?;
    let query = ListQuery {
        status,
        page: params.page.unwrap_or(1),
        limit: params.limit.unwrap_or(ListQuery::DEFAULT_LIMIT),
        sort_by: params.sort_by.unwrap_or_default(),
        sort_order: params.sort_order.unwrap_or_default(),
    };

    let page = state.orchestrator.get_user_orders(user_id, query).await?;
    Ok(Envelope::ok("Orders retrieved", page))
}

/// GET /orders/stats — aggregate figures for the caller's history.
#[tracing::instrument(skip_all)]
pub async fn stats<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    headers: HeaderMap,
) -> Result<Json<Envelope<OrderStats>>, ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let user_id = require_user(&headers)?;
    let stats = state.orchestrator.get_order_stats(user_id).await?;
    Ok(Envelope::ok("Order stats retrieved", stats))
}

/// GET /orders/:id — load one of the caller's orders.
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn get<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Order>>, ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let user_id = require_user(&headers)?;
    let order_id = parse_order_id(&id)?;
    let order = state
        .orchestrator
        .get_order(order_id, Some(user_id))
        .await?;
    Ok(Envelope::ok("Order retrieved", order))
}

/// GET /orders/:id/tracking — carrier details and status history.
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn tracking<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Tracking>>, ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let user_id = require_user(&headers)?;
    let order_id = parse_order_id(&id)?;
    let tracking = state
        .orchestrator
        .get_tracking(order_id, Some(user_id))
        .await?;
    Ok(Envelope::ok("Tracking retrieved", tracking))
}

/// POST /orders/:id/cancel — cancel one of the caller's orders.
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn cancel<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Envelope<Order>>, ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let user_id = require_user(&headers)?;
    let order_id = parse_order_id(&id)?;
    let order = state
        .orchestrator
        .cancel_order(order_id, Some(user_id), Actor::User, req.reason)
        .await?;
    Ok(Envelope::ok("Order cancelled", order))
}

/// POST /orders/:id/return — request a return on a delivered order.
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn initiate_return<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Envelope<Order>>, ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let user_id = require_user(&headers)?;
    let order_id = parse_order_id(&id)?;
    let order = state
        .orchestrator
        .initiate_return(order_id, user_id, req.reason)
        .await?;
    Ok(Envelope::ok("Return requested", order))
}

/// POST /orders/:id/confirm-payment — payment gateway settlement hook.
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn confirm_payment<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    Path(id): Path<String>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<Json<Envelope<Order>>, ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state
        .orchestrator
        .confirm_payment(
            order_id,
            PaymentData {
                transaction_id: req.transaction_id,
                details: req.details,
            },
        )
        .await?;
    Ok(Envelope::ok("Payment confirmed", order))
}

/// POST /orders/:id/payment-failed — payment gateway failure hook.
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn payment_failed<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    Path(id): Path<String>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<Envelope<Order>>, ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.orchestrator.fail_payment(order_id, req.reason).await?;
    Ok(Envelope::ok("Payment failure recorded", order))
}

/// PATCH /orders/:id/status — operator status advance.
///
/// Moving to `shipped` with a tracking number also records the carrier
/// details in the same write.
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn update_status<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Envelope<Order>>, ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let order_id = parse_order_id(&id)?;
    let next = parse_status(&req.status)?;

    let order = match (next, req.tracking_number) {
        (OrderStatus::Shipped, Some(tracking_number)) => {
            state
                .orchestrator
                .mark_shipped(
                    order_id,
                    ShipmentDetails {
                        carrier: req.carrier.unwrap_or_else(|| "unknown".to_string()),
                        tracking_number,
                        tracking_url: req.tracking_url,
                        estimated_delivery: req.estimated_delivery,
                    },
                )
                .await?
        }
        _ => {
            state
                .orchestrator
                .update_status(order_id, next, Actor::Admin, req.note)
                .await?
        }
    };
    Ok(Envelope::ok(
        format!("Order status updated to {next}"),
        order,
    ))
}

/// GET /orders/:id/transitions — statuses reachable from the current one.
#[tracing::instrument(skip_all, fields(order_id = %id))]
pub async fn transitions<Cart, Catalog, Repo, Store>(
    State(state): State<Arc<AppState<Cart, Catalog, Repo, Store>>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Vec<OrderStatus>>>, ApiError>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient + 'static,
    Repo: OrderRepository + 'static,
    Store: ReservationStore + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.orchestrator.get_order(order_id, None).await?;
    Ok(Envelope::ok(
        "Allowed transitions retrieved",
        allowed_transitions(order.status()).to_vec(),
    ))
}
