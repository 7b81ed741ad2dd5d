//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orchestrator::OrchestratorError;
use serde::Serialize;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be understood.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

const INTERNAL_MESSAGE: &str = "An unexpected error occurred";

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "VALIDATION_FAILED",
            ApiError::Orchestrator(err) => err.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            "ORDER_NOT_FOUND" | "PRODUCT_NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_FAILED" | "CUSTOMER_VALIDATION_FAILED" => StatusCode::BAD_REQUEST,
            "PRODUCT_NOT_AVAILABLE" | "INSUFFICIENT_STOCK" | "PAYMENT_FAILED" => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            "INVALID_ORDER_STATE" => StatusCode::CONFLICT,
            "SERVICE_UNAVAILABLE" | "TASK_REJECTED" | "REFUND_FAILED" => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            "TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        metrics::counter!("http_errors_total", "code" => code).increment(1);

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal server error");
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { code, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, ProductId};
    use domain::OrderStatus;

    use super::*;

    fn status_of(err: OrchestratorError) -> StatusCode {
        ApiError::from(err).status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(OrchestratorError::OrderNotFound(OrderId::new(1))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(OrchestratorError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrchestratorError::InsufficientStock {
                product_id: ProductId::new(1),
                requested: 2,
                available: None,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(OrchestratorError::InvalidOrderState {
                status: OrderStatus::Delivered,
                action: "cancel".into(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(OrchestratorError::TaskRejected(dispatch::Pool::OrderProcessing)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(OrchestratorError::Timeout {
                operation: "create order"
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(OrchestratorError::Internal("pool closed".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response =
            ApiError::from(OrchestratorError::Internal("password=hunter2".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["message"], INTERNAL_MESSAGE);
    }
}
