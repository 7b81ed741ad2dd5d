//! Collaborator clients behind a [`Guard`], with their degraded fallbacks.
//!
//! A definitive answer from the collaborator (such as "not found") is passed
//! through untouched. When the breaker is open, retries are exhausted or the
//! call keeps timing out, each operation falls back as follows:
//!
//! | operation | fallback |
//! |---|---|
//! | `get_product` | [`ProductSnapshot::unavailable`] |
//! | `get_products` | the unavailable placeholder for every requested id |
//! | `update_stock` | `ClientError::Unavailable` |
//! | `check_availability` | `false` for every requested product |
//! | `get_customer` | [`CustomerSnapshot::unknown`] |
//! | `credit_loyalty_points` | silently skipped |

use std::collections::HashMap;
use std::sync::Arc;

use common::{CustomerId, ProductId};
use domain::{CustomerSnapshot, ProductSnapshot};
use resilience::{CircuitState, Guard, GuardConfig, GuardError};

use crate::clients::{ClientError, CustomerClient, InventoryClient, StockUpdateMode};

fn record_fallback(guard: &Guard, operation: &'static str, reason: &GuardError<ClientError>) {
    tracing::warn!(
        breaker = guard.name(),
        operation,
        reason = %reason,
        "collaborator degraded, using fallback"
    );
    metrics::counter!(
        "fallbacks_total",
        "breaker" => guard.name().to_string(),
        "operation" => operation
    )
    .increment(1);
}

/// Splits a guarded result into the collaborator's own error or a fallback.
fn degrade<T>(
    guard: &Guard,
    operation: &'static str,
    result: Result<T, GuardError<ClientError>>,
    fallback: impl FnOnce() -> T,
) -> Result<T, ClientError> {
    match result {
        Ok(value) => Ok(value),
        Err(GuardError::Rejected(err)) => Err(err),
        Err(reason) => {
            record_fallback(guard, operation, &reason);
            Ok(fallback())
        }
    }
}

/// Inventory client with circuit breaking, retry and fallbacks.
pub struct ResilientInventory<I> {
    inner: Arc<I>,
    guard: Guard,
}

impl<I: InventoryClient> ResilientInventory<I> {
    pub fn new(inner: Arc<I>, config: GuardConfig) -> Self {
        Self {
            inner,
            guard: Guard::new("inventory", config),
        }
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn state(&self) -> CircuitState {
        self.guard.state()
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<ProductSnapshot, ClientError> {
        let result = self
            .guard
            .call("get_product", || self.inner.get_product(id))
            .await;
        degrade(&self.guard, "get_product", result, || {
            ProductSnapshot::unavailable(id)
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<ProductSnapshot>, ClientError> {
        let result = self
            .guard
            .call("get_products", || self.inner.get_products(ids))
            .await;
        degrade(&self.guard, "get_products", result, || {
            ids.iter().copied().map(ProductSnapshot::unavailable).collect()
        })
    }

    /// Adjusts stock. There is no fallback: a degraded inventory service
    /// fails the call.
    #[tracing::instrument(skip(self))]
    pub async fn update_stock(
        &self,
        id: ProductId,
        quantity: u32,
        mode: StockUpdateMode,
    ) -> Result<ProductSnapshot, ClientError> {
        let result = self
            .guard
            .call("update_stock", || self.inner.update_stock(id, quantity, mode))
            .await;
        match result {
            Ok(product) => Ok(product),
            Err(GuardError::Rejected(err)) => Err(err),
            Err(reason) => {
                record_fallback(&self.guard, "update_stock", &reason);
                Err(ClientError::Unavailable(format!("inventory service: {reason}")))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn check_availability(
        &self,
        requests: &[(ProductId, u32)],
    ) -> Result<HashMap<ProductId, bool>, ClientError> {
        let result = self
            .guard
            .call("check_availability", || {
                self.inner.check_availability(requests)
            })
            .await;
        degrade(&self.guard, "check_availability", result, || {
            requests.iter().map(|(id, _)| (*id, false)).collect()
        })
    }
}

/// Customer client with circuit breaking, retry and fallbacks.
pub struct ResilientCustomers<C> {
    inner: Arc<C>,
    guard: Guard,
}

impl<C: CustomerClient> ResilientCustomers<C> {
    pub fn new(inner: Arc<C>, config: GuardConfig) -> Self {
        Self {
            inner,
            guard: Guard::new("customer", config),
        }
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn state(&self) -> CircuitState {
        self.guard.state()
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_customer(&self, id: CustomerId) -> Result<CustomerSnapshot, ClientError> {
        let result = self
            .guard
            .call("get_customer", || self.inner.get_customer(id))
            .await;
        degrade(&self.guard, "get_customer", result, || {
            CustomerSnapshot::unknown(id)
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn credit_loyalty_points(&self, id: CustomerId, points: i64) -> Result<(), ClientError> {
        let result = self
            .guard
            .call("credit_loyalty_points", || {
                self.inner.credit_loyalty_points(id, points)
            })
            .await;
        degrade(&self.guard, "credit_loyalty_points", result, || ())
    }
}
