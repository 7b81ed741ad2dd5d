//! Inventory/catalog collaborator.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use domain::ProductSnapshot;
use serde::{Deserialize, Serialize};

use super::{ClientError, lock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockUpdateMode {
    Add,
    Reduce,
}

/// A stock adjustment as received by the inventory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockUpdate {
    pub product_id: ProductId,
    pub quantity: u32,
    pub mode: StockUpdateMode,
}

/// Trait for the inventory/catalog service.
#[async_trait]
pub trait InventoryClient: Send + Sync + 'static {
    async fn get_product(&self, id: ProductId) -> Result<ProductSnapshot, ClientError>;

    /// Looks up several products at once. Unknown ids are left out.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<ProductSnapshot>, ClientError>;

    /// Adjusts the stock of a product and returns its new state.
    async fn update_stock(
        &self,
        id: ProductId,
        quantity: u32,
        mode: StockUpdateMode,
    ) -> Result<ProductSnapshot, ClientError>;

    /// Reports, per requested product, whether the quantity can be supplied.
    async fn check_availability(
        &self,
        requests: &[(ProductId, u32)],
    ) -> Result<HashMap<ProductId, bool>, ClientError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    products: HashMap<ProductId, ProductSnapshot>,
    stock_updates: Vec<StockUpdate>,
    availability_checks: usize,
    unavailable: bool,
    fail_stock_updates_for: HashSet<ProductId>,
    latency: Option<Duration>,
}

/// In-memory inventory service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventory {
    state: Arc<Mutex<InMemoryInventoryState>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog entry.
    pub fn upsert(&self, product: ProductSnapshot) {
        lock(&self.state).products.insert(product.id, product);
    }

    /// Returns the current stock of a product.
    pub fn stock(&self, id: ProductId) -> Option<u32> {
        lock(&self.state).products.get(&id).map(|p| p.stock_quantity)
    }

    /// Makes every call fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Makes stock updates for one product fail as unavailable.
    pub fn fail_stock_updates_for(&self, id: ProductId) {
        lock(&self.state).fail_stock_updates_for.insert(id);
    }

    /// Delays every call, for timeout tests.
    pub fn set_latency(&self, latency: Option<Duration>) {
        lock(&self.state).latency = latency;
    }

    /// Every stock update applied so far, in order.
    pub fn stock_updates(&self) -> Vec<StockUpdate> {
        lock(&self.state).stock_updates.clone()
    }

    pub fn availability_checks(&self) -> usize {
        lock(&self.state).availability_checks
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
            return Err(ClientError::Unavailable("inventory service".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventory {
    async fn get_product(&self, id: ProductId) -> Result<ProductSnapshot, ClientError> {
        self.enter().await?;
        lock(&self.state)
            .products
            .get(&id)
            .cloned()
            .ok_or(ClientError::NotFound {
                entity: "product",
                id: id.as_i64(),
            })
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<ProductSnapshot>, ClientError> {
        self.enter().await?;
        let state = lock(&self.state);
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn update_stock(
        &self,
        id: ProductId,
        quantity: u32,
        mode: StockUpdateMode,
    ) -> Result<ProductSnapshot, ClientError> {
        self.enter().await?;
        let mut state = lock(&self.state);

        if state.fail_stock_updates_for.contains(&id) {
            return Err(ClientError::Unavailable("inventory service".to_string()));
        }

        let product = state.products.get_mut(&id).ok_or(ClientError::NotFound {
            entity: "product",
            id: id.as_i64(),
        })?;

        match mode {
            StockUpdateMode::Add => product.stock_quantity += quantity,
            StockUpdateMode::Reduce => {
                if product.stock_quantity < quantity {
                    return Err(ClientError::Rejected(format!(
                        "insufficient stock for product {id}: {} < {quantity}",
                        product.stock_quantity
                    )));
                }
                product.stock_quantity -= quantity;
            }
        }

        let updated = product.clone();
        state.stock_updates.push(StockUpdate {
            product_id: id,
            quantity,
            mode,
        });
        Ok(updated)
    }

    async fn check_availability(
        &self,
        requests: &[(ProductId, u32)],
    ) -> Result<HashMap<ProductId, bool>, ClientError> {
        self.enter().await?;
        let mut state = lock(&self.state);
        state.availability_checks += 1;

        Ok(requests
            .iter()
            .map(|(id, quantity)| {
                let available = state
                    .products
                    .get(id)
                    .is_some_and(|p| p.is_orderable() && p.has_stock(*quantity));
                (*id, available)
            })
            .collect())
    }
}
