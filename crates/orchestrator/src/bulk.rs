//! Maintenance operations applied to many orders at once.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::Serialize;

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOperation {
    /// Cancel pending orders older than the configured stale age.
    CancelStale,
    /// Assign fresh tracking numbers to the listed orders.
    UpdateTracking(Vec<OrderId>),
}

impl BulkOperation {
    /// Resolves an operation by name, ignoring case. `order_ids` is only
    /// used by operations that target specific orders.
    pub fn from_name(name: &str, order_ids: Vec<OrderId>) -> Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "CANCEL_STALE" => Ok(Self::CancelStale),
            "UPDATE_TRACKING" => Ok(Self::UpdateTracking(order_ids)),
            _ => Err(OrchestratorError::Validation(format!(
                "Unsupported operation: {name}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CancelStale => "CANCEL_STALE",
            Self::UpdateTracking(_) => "UPDATE_TRACKING",
        }
    }
}

/// Result of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub operation: &'static str,
    /// Number of orders the operation changed.
    pub affected: usize,
    pub completed_at: DateTime<Utc>,
}
