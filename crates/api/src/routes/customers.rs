//! Per-customer order listings.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::CustomerId;
use orchestrator::OrderSummary;
use store::OrderStore;

use super::orders::{AppState, OrderResponse, parse};
use crate::error::ApiError;

/// GET /customers/{id}/orders
#[tracing::instrument(skip(state))]
pub async fn orders<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let customer_id: CustomerId = parse(&id, "customer id")?;
    let orders = state.queries.list_by_customer(customer_id).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /customers/{id}/orders/summary
#[tracing::instrument(skip(state))]
pub async fn summary<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    let customer_id: CustomerId = parse(&id, "customer id")?;
    Ok(Json(state.queries.summaries_by_customer(customer_id).await?))
}
