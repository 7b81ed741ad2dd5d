use std::time::Duration;

use serde::Serialize;

/// The task classes, each served by its own pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pool {
    OrderProcessing,
    Notification,
    Analytics,
    Default,
}

impl Pool {
    pub const ALL: [Pool; 4] = [
        Pool::OrderProcessing,
        Pool::Notification,
        Pool::Analytics,
        Pool::Default,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Pool::OrderProcessing => "order-processing",
            Pool::Notification => "notification",
            Pool::Analytics => "analytics",
            Pool::Default => "default",
        }
    }
}

impl std::fmt::Display for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What happens to a submission when the queue is full and the pool is
/// already running its maximum number of workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverloadPolicy {
    /// Refuse the task and report it to the submitter.
    Reject,
    /// Run the task on the submitting task before returning.
    CallerRuns,
    /// Drop the oldest queued task and queue the new one.
    DiscardOldest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Workers kept alive for the lifetime of the pool.
    pub core_workers: usize,
    /// Upper bound on workers; extras are only started when the queue is full.
    pub max_workers: usize,
    pub queue_capacity: usize,
    pub overload: OverloadPolicy,
    /// Whether shutdown lets queued and running tasks finish.
    pub wait_on_shutdown: bool,
    /// Upper bound on how long shutdown waits for workers.
    pub await_termination: Duration,
    /// Idle time after which a worker beyond `core_workers` retires.
    pub keep_alive: Duration,
}

impl PoolConfig {
    /// Production settings for a pool.
    pub fn for_pool(pool: Pool) -> Self {
        let keep_alive = Duration::from_secs(60);
        match pool {
            Pool::OrderProcessing => Self {
                core_workers: 3,
                max_workers: 10,
                queue_capacity: 50,
                overload: OverloadPolicy::Reject,
                wait_on_shutdown: true,
                await_termination: Duration::from_secs(60),
                keep_alive,
            },
            Pool::Notification => Self {
                core_workers: 2,
                max_workers: 5,
                queue_capacity: 200,
                overload: OverloadPolicy::CallerRuns,
                wait_on_shutdown: true,
                await_termination: Duration::from_secs(45),
                keep_alive,
            },
            Pool::Analytics => Self {
                core_workers: 1,
                max_workers: 3,
                queue_capacity: 1000,
                overload: OverloadPolicy::DiscardOldest,
                wait_on_shutdown: false,
                await_termination: Duration::from_secs(10),
                keep_alive,
            },
            Pool::Default => Self {
                core_workers: 5,
                max_workers: 20,
                queue_capacity: 100,
                overload: OverloadPolicy::CallerRuns,
                wait_on_shutdown: true,
                await_termination: Duration::from_secs(30),
                keep_alive,
            },
        }
    }
}

/// Settings for all four pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub order_processing: PoolConfig,
    pub notification: PoolConfig,
    pub analytics: PoolConfig,
    pub default: PoolConfig,
}

impl DispatcherConfig {
    pub fn get(&self, pool: Pool) -> &PoolConfig {
        match pool {
            Pool::OrderProcessing => &self.order_processing,
            Pool::Notification => &self.notification,
            Pool::Analytics => &self.analytics,
            Pool::Default => &self.default,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            order_processing: PoolConfig::for_pool(Pool::OrderProcessing),
            notification: PoolConfig::for_pool(Pool::Notification),
            analytics: PoolConfig::for_pool(Pool::Analytics),
            default: PoolConfig::for_pool(Pool::Default),
        }
    }
}
