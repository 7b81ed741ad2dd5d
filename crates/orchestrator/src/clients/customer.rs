//! Customer/loyalty collaborator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::CustomerId;
use domain::CustomerSnapshot;

use super::{ClientError, lock};

/// Trait for the customer/loyalty service.
#[async_trait]
pub trait CustomerClient: Send + Sync + 'static {
    async fn get_customer(&self, id: CustomerId) -> Result<CustomerSnapshot, ClientError>;

    /// Adds loyalty points to a customer's balance.
    async fn credit_loyalty_points(&self, id: CustomerId, points: i64) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
struct InMemoryCustomersState {
    customers: HashMap<CustomerId, CustomerSnapshot>,
    credits: Vec<(CustomerId, i64)>,
    unavailable: bool,
    fail_credits: bool,
    latency: Option<Duration>,
}

/// In-memory customer service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomers {
    state: Arc<Mutex<InMemoryCustomersState>>,
}

impl InMemoryCustomers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, customer: CustomerSnapshot) {
        lock(&self.state).customers.insert(customer.id, customer);
    }

    pub fn loyalty_points(&self, id: CustomerId) -> Option<i64> {
        lock(&self.state).customers.get(&id).map(|c| c.loyalty_points)
    }

    /// Loyalty credits applied so far, in order.
    pub fn credits(&self) -> Vec<(CustomerId, i64)> {
        lock(&self.state).credits.clone()
    }

    /// Makes every call fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Makes loyalty credits fail while lookups keep working.
    pub fn set_fail_credits(&self, fail: bool) {
        lock(&self.state).fail_credits = fail;
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        lock(&self.state).latency = latency;
    }

    async fn enter(&self) -> Result<(), ClientError> {
        let (latency, unavailable) = {
            let state = lock(&self.state);
            (state.latency, state.unavailable)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if unavailable {
            return Err(ClientError::Unavailable("customer service".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerClient for InMemoryCustomers {
    async fn get_customer(&self, id: CustomerId) -> Result<CustomerSnapshot, ClientError> {
        self.enter().await?;
        lock(&self.state)
            .customers
            .get(&id)
            .cloned()
            .ok_or(ClientError::NotFound {
                entity: "customer",
                id: id.as_i64(),
            })
    }

    async fn credit_loyalty_points(&self, id: CustomerId, points: i64) -> Result<(), ClientError> {
        self.enter().await?;
        let mut state = lock(&self.state);
        if state.fail_credits {
            return Err(ClientError::Unavailable("customer service".to_string()));
        }

        let customer = state.customers.get_mut(&id).ok_or(ClientError::NotFound {
            entity: "customer",
            id: id.as_i64(),
        })?;
        customer.loyalty_points += points;
        state.credits.push((id, points));
        Ok(())
    }
}
