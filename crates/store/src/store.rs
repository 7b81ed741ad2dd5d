use async_trait::async_trait;
use common::{CustomerId, OrderId};
use domain::{Order, OrderStatus};

use crate::{OrderQuery, Result};

/// Isolation level requested when a unit of work begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Isolation {
    #[default]
    ReadCommitted,
    Serializable,
}

impl Isolation {
    /// SQL spelling of the level.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Isolation::ReadCommitted => "READ COMMITTED",
            Isolation::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for Isolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Durable store of orders.
///
/// Writes only happen through an [`OrderTransaction`] obtained from
/// [`OrderStore::begin`]. The read methods see committed data only.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    type Tx: OrderTransaction;

    /// Starts a unit of work at the given isolation level.
    async fn begin(&self, isolation: Isolation) -> Result<Self::Tx>;

    /// Loads a committed order.
    async fn find(&self, id: OrderId) -> Result<Option<Order>>;

    /// Orders of a customer, newest first.
    async fn find_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>>;

    /// Orders in a status, newest first.
    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Orders matching every criterion of the query, newest first.
    async fn search(&self, query: &OrderQuery) -> Result<Vec<Order>>;
}

/// A unit of work against an [`OrderStore`].
///
/// Nothing written through a transaction is visible to other readers until
/// [`commit`](OrderTransaction::commit) succeeds. Dropping a transaction
/// without committing rolls it back and releases its row locks.
#[async_trait]
pub trait OrderTransaction: Send {
    /// Inserts a new order and assigns its id.
    async fn insert(&mut self, order: &mut Order) -> Result<OrderId>;

    /// Writes the current state of an existing order, lines included.
    async fn update(&mut self, order: &Order) -> Result<()>;

    /// Loads an order as seen by this transaction, without locking it.
    async fn find(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Loads an order and takes its exclusive row lock.
    ///
    /// The lock is held until the transaction commits or rolls back; a
    /// second transaction asking for the same row waits.
    async fn find_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Sorts orders newest first, breaking ties by id.
pub(crate) fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.order_date()
            .cmp(&a.order_date())
            .then_with(|| b.id().cmp(&a.id()))
    });
}
