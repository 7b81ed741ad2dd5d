use std::future::Future;

use futures_util::future::join_all;

use crate::{DispatcherConfig, Pool, PoolStats, Result, WorkerPool};

/// The four named pools behind one handle.
#[derive(Clone)]
pub struct Dispatcher {
    order_processing: WorkerPool,
    notification: WorkerPool,
    analytics: WorkerPool,
    default: WorkerPool,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            order_processing: WorkerPool::new(Pool::OrderProcessing, config.order_processing),
            notification: WorkerPool::new(Pool::Notification, config.notification),
            analytics: WorkerPool::new(Pool::Analytics, config.analytics),
            default: WorkerPool::new(Pool::Default, config.default),
        }
    }

    pub fn pool(&self, pool: Pool) -> &WorkerPool {
        match pool {
            Pool::OrderProcessing => &self.order_processing,
            Pool::Notification => &self.notification,
            Pool::Analytics => &self.analytics,
            Pool::Default => &self.default,
        }
    }

    /// Submits a fire-and-forget task to a pool.
    pub async fn submit<F, E>(&self, pool: Pool, name: &'static str, task: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        self.pool(pool).submit(name, task).await
    }

    pub fn stats(&self, pool: Pool) -> PoolStats {
        self.pool(pool).stats()
    }

    /// Shuts every pool down, each under its own policy.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down background pools");
        join_all(Pool::ALL.iter().map(|pool| self.pool(*pool).shutdown())).await;
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}
