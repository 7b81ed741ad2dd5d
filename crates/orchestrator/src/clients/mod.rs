//! Remote collaborators: inventory/catalog, customer/loyalty and payments.
//!
//! Each collaborator is a trait with an in-memory implementation used by
//! tests and by the standalone binary.

pub mod customer;
pub mod inventory;
pub mod payment;

use std::sync::{Mutex, MutexGuard, PoisonError};

use resilience::IsTransient;
use thiserror::Error;

pub use customer::{CustomerClient, InMemoryCustomers};
pub use inventory::{InMemoryInventory, InventoryClient, StockUpdate, StockUpdateMode};
pub use payment::{InMemoryPaymentGateway, PaymentDetails, PaymentError, PaymentGateway};

/// Errors reported by the inventory and customer collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The collaborator answered that the entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The collaborator refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The collaborator could not be reached.
    #[error("{0} unavailable")]
    Unavailable(String),

    #[error("request timed out")]
    Timeout,
}

impl IsTransient for ClientError {
    fn is_transient(&self) -> bool {
        matches!(self, ClientError::Unavailable(_) | ClientError::Timeout)
    }
}

/// Locks a fake's state, recovering from a poisoned lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
