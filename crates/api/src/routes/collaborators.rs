//! Circuit breaker state of the downstream collaborators.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use orchestrator::CollaboratorStatus;
use store::OrderStore;

use super::orders::AppState;

/// GET /collaborators/status
pub async fn status<S: OrderStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Vec<CollaboratorStatus>> {
    Json(state.orchestrator.collaborator_status())
}
