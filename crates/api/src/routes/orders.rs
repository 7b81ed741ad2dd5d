//! Order lifecycle and query endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use domain::{Address, Money, Order, OrderLine, OrderStatus, PaymentMethod};
use orchestrator::{
    BulkOperation, BulkOutcome, CreateOrderRequest, InMemoryCustomers, InMemoryInventory,
    InMemoryPaymentGateway, OrderAnalytics, OrderOrchestrator, OrderQueries, TracingSideEffects,
    TransactionStatistics,
};
use serde::{Deserialize, Serialize};
use store::{OrderQuery, OrderStore};

use crate::error::ApiError;

/// Workflows wired to the in-process collaborators.
pub type Orchestrator<S> = OrderOrchestrator<
    S,
    InMemoryInventory,
    InMemoryCustomers,
    InMemoryPaymentGateway,
    TracingSideEffects,
>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub orchestrator: Orchestrator<S>,
    pub queries: OrderQueries<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub operation: String,
    #[serde(default)]
    pub order_ids: Vec<OrderId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub customer_id: Option<i64>,
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_amount_cents: Option<i64>,
    pub max_amount_cents: Option<i64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct HighValueParams {
    pub min_amount_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    pub customer_id: Option<i64>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: Option<OrderId>,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub customer_email: String,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub items: Vec<OrderLineResponse>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub final_amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub payment_transaction_id: Option<String>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: common::ProductId,
    pub product_name: String,
    pub sku: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub discount_cents: i64,
    pub subtotal_cents: i64,
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            sku: line.sku.clone(),
            unit_price_cents: line.unit_price.cents(),
            quantity: line.quantity,
            discount_cents: line.discount.cents(),
            subtotal_cents: line.subtotal().cents(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            customer_id: order.customer_id(),
            customer_name: order.customer_name().to_string(),
            customer_email: order.customer_email().to_string(),
            order_date: order.order_date(),
            status: order.status(),
            items: order.lines().iter().map(OrderLineResponse::from).collect(),
            subtotal_cents: order.subtotal().cents(),
            tax_cents: order.tax_amount().cents(),
            shipping_cents: order.shipping_amount().cents(),
            discount_cents: order.discount_amount().cents(),
            final_amount_cents: order.final_amount().cents(),
            payment_method: order.payment_method(),
            payment_transaction_id: order.payment_transaction_id().map(str::to_owned),
            tracking_number: order.tracking_number().map(str::to_owned),
            shipped_at: order.shipped_at(),
            delivered_at: order.delivered_at(),
            notes: order.notes().map(str::to_owned),
            shipping_address: order.shipping_address().cloned(),
            billing_address: order.billing_address().cloned(),
        }
    }
}

fn respond(orders: &[Order]) -> Json<Vec<OrderResponse>> {
    Json(orders.iter().map(OrderResponse::from).collect())
}

/// Parses a path or query value, reporting failures as bad requests.
pub(crate) fn parse<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what}: {raw}")))
}

// -- Handlers --

/// POST /orders: run the create workflow.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.orchestrator.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse(&id, "order id")?;
    let order = state.queries.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders: search with optional filters, newest first.
#[tracing::instrument(skip(state))]
pub async fn search<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let query = OrderQuery {
        customer_id: params.customer_id.map(CustomerId::new),
        status: params
            .status
            .as_deref()
            .map(|s| parse::<OrderStatus>(s, "status"))
            .transpose()?,
        from_date: params.from,
        to_date: params.to,
        min_amount: params.min_amount_cents.map(Money::from_cents),
        max_amount: params.max_amount_cents.map(Money::from_cents),
        limit: params.limit,
    };
    let orders = state.queries.search(&query).await?;
    Ok(respond(&orders))
}

/// PUT /orders/{id}/status: one step along the lifecycle.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse(&id, "order id")?;
    let status: OrderStatus = parse(&req.status, "status")?;
    let order = state.orchestrator.update_status(order_id, status).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/process: deduct stock and start fulfilment.
#[tracing::instrument(skip(state))]
pub async fn process<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse(&id, "order id")?;
    let order = state.orchestrator.process_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel: refund, release stock and cancel.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse(&id, "order id")?;
    let reason = req
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "Cancelled by customer".to_string());
    let order = state.orchestrator.cancel_order(order_id, &reason).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/trigger-processing: re-run post-processing in the background.
#[tracing::instrument(skip(state))]
pub async fn trigger_processing<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id: OrderId = parse(&id, "order id")?;
    state.orchestrator.trigger_processing(order_id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /orders/high-value?min_amount_cents=
#[tracing::instrument(skip(state))]
pub async fn high_value<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<HighValueParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state
        .queries
        .high_value_orders(Money::from_cents(params.min_amount_cents))
        .await?;
    Ok(respond(&orders))
}

/// GET /orders/analytics?customer_id=
#[tracing::instrument(skip(state))]
pub async fn analytics<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<OrderAnalytics>, ApiError> {
    let analytics = state
        .queries
        .analytics(params.customer_id.map(CustomerId::new))
        .await?;
    Ok(Json(analytics))
}

/// POST /orders/bulk: CANCEL_STALE or UPDATE_TRACKING.
#[tracing::instrument(skip(state))]
pub async fn bulk<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<BulkRequest>,
) -> Result<Json<BulkOutcome>, ApiError> {
    let operation = BulkOperation::from_name(&req.operation, req.order_ids)?;
    let outcome = state.orchestrator.perform_bulk(operation).await?;
    Ok(Json(outcome))
}

/// GET /orders/statistics
#[tracing::instrument(skip(state))]
pub async fn statistics<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<TransactionStatistics>, ApiError> {
    Ok(Json(state.queries.statistics().await?))
}
