use common::{OrderId, ProductId};
use dispatch::{DispatchError, Pool};
use domain::{OrderError, OrderStatus};
use store::StoreError;
use thiserror::Error;

use crate::clients::ClientError;

/// Errors returned by the order workflows and queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("customer validation failed: {0}")]
    CustomerValidation(String),

    #[error("cannot {action} order in {status} status")]
    InvalidOrderState {
        status: OrderStatus,
        action: String,
    },

    /// The store refused a write because a concurrent unit of work won.
    #[error("order was modified concurrently: {0}")]
    ConcurrentModification(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product {0} is not available")]
    ProductNotAvailable(ProductId),

    #[error("insufficient stock for product {product_id}: requested {requested}{}", available.map(|a| format!(", available {a}")).unwrap_or_default())]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: Option<u32>,
    },

    #[error("payment failed: {0}")]
    PaymentFailed(String),

    #[error("refund failed: {0}")]
    RefundFailed(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("{0} pool rejected the task")]
    TaskRejected(Pool),

    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            OrchestratorError::Validation(_) => "VALIDATION_FAILED",
            OrchestratorError::CustomerValidation(_) => "CUSTOMER_VALIDATION_FAILED",
            OrchestratorError::InvalidOrderState { .. }
            | OrchestratorError::ConcurrentModification(_) => "INVALID_ORDER_STATE",
            OrchestratorError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            OrchestratorError::ProductNotAvailable(_) => "PRODUCT_NOT_AVAILABLE",
            OrchestratorError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            OrchestratorError::PaymentFailed(_) => "PAYMENT_FAILED",
            OrchestratorError::RefundFailed(_) => "REFUND_FAILED",
            OrchestratorError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            OrchestratorError::TaskRejected(_) => "TASK_REJECTED",
            OrchestratorError::Timeout { .. } => "TIMEOUT",
            OrchestratorError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<OrderError> for OrchestratorError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidStateTransition {
                current_state,
                action,
            } => OrchestratorError::InvalidOrderState {
                status: current_state,
                action: action.to_string(),
            },
            other => OrchestratorError::Validation(other.to_string()),
        }
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => OrchestratorError::OrderNotFound(id),
            StoreError::Conflict(msg) => OrchestratorError::ConcurrentModification(msg),
            other => OrchestratorError::Internal(other.to_string()),
        }
    }
}

impl From<DispatchError> for OrchestratorError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Rejected { pool } => OrchestratorError::TaskRejected(pool),
            DispatchError::ShutDown { .. } => OrchestratorError::ServiceUnavailable(err.to_string()),
        }
    }
}

impl From<ClientError> for OrchestratorError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound {
                entity: "product",
                id,
            } => OrchestratorError::ProductNotFound(ProductId::new(id)),
            ClientError::NotFound { .. } | ClientError::Rejected(_) => {
                OrchestratorError::Validation(err.to_string())
            }
            ClientError::Unavailable(_) | ClientError::Timeout => {
                OrchestratorError::ServiceUnavailable(err.to_string())
            }
        }
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
