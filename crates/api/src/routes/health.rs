//! Liveness endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use store::OrderStore;

use super::orders::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Collaborators whose breaker is currently open.
    pub degraded: Vec<String>,
}

/// GET /health: the service is up; open breakers are listed but do not fail the check.
pub async fn check<S: OrderStore>(State(state): State<Arc<AppState<S>>>) -> Json<HealthResponse> {
    let degraded = state
        .orchestrator
        .collaborator_status()
        .into_iter()
        .filter(|c| c.state == resilience::CircuitState::Open)
        .map(|c| c.name)
        .collect();
    Json(HealthResponse {
        status: "ok",
        degraded,
    })
}
