use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use common::{CustomerId, OrderId};
use domain::{Order, OrderStatus};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Isolation, OrderQuery, Result, StoreError,
    store::{OrderStore, OrderTransaction, newest_first},
};

/// In-memory order store.
///
/// Committed orders live behind a single `RwLock`. Each order has its own
/// row lock, taken by [`OrderTransaction::find_for_update`] and held by the
/// transaction until it finishes. Writes are buffered in the transaction
/// and published together on commit.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    orders: RwLock<BTreeMap<OrderId, Order>>,
    row_locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
    sequence: AtomicI64,
    fail_on_commit: AtomicBool,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent commit fail until switched off again.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.inner.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of committed orders.
    pub async fn len(&self) -> usize {
        self.inner.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes every committed order.
    pub async fn clear(&self) {
        self.inner.orders.write().await.clear();
    }

    async fn collect<F>(&self, filter: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let orders = self.inner.orders.read().await;
        let mut found: Vec<Order> = orders.values().filter(|&o| filter(o)).cloned().collect();
        newest_first(&mut found);
        found
    }
}

impl Inner {
    async fn row_lock(&self, id: OrderId) -> Arc<Mutex<()>> {
        let mut locks = self.row_locks.lock().await;
        locks.entry(id).or_default().clone()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self, isolation: Isolation) -> Result<Self::Tx> {
        Ok(InMemoryTransaction {
            store: Arc::clone(&self.inner),
            isolation,
            writes: BTreeMap::new(),
            held: HashMap::new(),
        })
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.orders.read().await.get(&id).cloned())
    }

    async fn find_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        Ok(self.collect(|o| o.customer_id() == customer_id).await)
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self.collect(|o| o.status() == status).await)
    }

    async fn search(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        let mut found = self.collect(|o| query.matches(o)).await;
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }
}

/// Unit of work over an [`InMemoryOrderStore`].
pub struct InMemoryTransaction {
    store: Arc<Inner>,
    isolation: Isolation,
    writes: BTreeMap<OrderId, Order>,
    held: HashMap<OrderId, OwnedMutexGuard<()>>,
}

impl InMemoryTransaction {
    pub fn isolation(&self) -> Isolation {
        self.isolation
    }

    async fn read(&self, id: OrderId) -> Option<Order> {
        if let Some(order) = self.writes.get(&id) {
            return Some(order.clone());
        }
        self.store.orders.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn insert(&mut self, order: &mut Order) -> Result<OrderId> {
        let id = OrderId::new(self.store.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        order.assign_id(id);
        self.writes.insert(id, order.clone());
        Ok(id)
    }

    async fn update(&mut self, order: &Order) -> Result<()> {
        let id = order.id().ok_or(StoreError::MissingId)?;
        if !self.writes.contains_key(&id) && !self.store.orders.read().await.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.writes.insert(id, order.clone());
        Ok(())
    }

    async fn find(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.read(id).await)
    }

    async fn find_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        if !self.held.contains_key(&id) {
            let lock = self.store.row_lock(id).await;
            let guard = lock.lock_owned().await;
            self.held.insert(id, guard);
        }
        Ok(self.read(id).await)
    }

    async fn commit(self) -> Result<()> {
        if self.store.fail_on_commit.load(Ordering::SeqCst) {
            tracing::warn!(pending = self.writes.len(), "in-memory commit failure injected");
            return Err(StoreError::CommitFailed("injected failure".to_string()));
        }

        let mut orders = self.store.orders.write().await;
        orders.extend(self.writes);
        // Row locks are released when `held` drops, after the writes are visible.
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
