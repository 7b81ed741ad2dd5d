use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinSet;

use crate::{DispatchError, OverloadPolicy, Pool, PoolConfig, Result};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Task {
    name: &'static str,
    job: Job,
}

/// Queue and worker bookkeeping, always locked together.
struct State {
    queue: VecDeque<Task>,
    workers: usize,
}

struct Shared {
    pool: Pool,
    config: PoolConfig,
    state: Mutex<State>,
    workers: Mutex<JoinSet<()>>,
    notify: Notify,
    closed: AtomicBool,
}

/// Snapshot of a pool's load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub queued: usize,
}

/// A bounded set of tokio workers draining one shared queue.
///
/// Workers are started on demand: up to `core_workers` as tasks arrive, and
/// beyond that only when the queue is full. A worker started for a
/// submission runs that task first.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<Shared>,
}

impl WorkerPool {
    pub fn new(pool: Pool, config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                pool,
                state: Mutex::new(State {
                    queue: VecDeque::with_capacity(config.queue_capacity.min(1024)),
                    workers: 0,
                }),
                config,
                workers: Mutex::new(JoinSet::new()),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn pool(&self) -> Pool {
        self.shared.pool
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state();
        PoolStats {
            workers: state.workers,
            queued: state.queue.len(),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Hands a task to the pool.
    ///
    /// Returns once the task is queued or started; under the caller-runs
    /// policy, once the task has run. Errors and panics raised by the task
    /// are logged and never reach the submitter.
    pub async fn submit<F, E>(&self, name: &'static str, task: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let shared = &self.shared;
        let pool = shared.pool;

        if self.is_shut_down() {
            return Err(DispatchError::ShutDown { pool });
        }

        let task = Task {
            name,
            job: Box::pin(report_errors(pool, name, task)),
        };
        metrics::counter!("dispatch_submitted_total", "pool" => pool.name()).increment(1);

        let overflow = {
            let mut state = shared.state();

            if state.workers < shared.config.core_workers {
                self.spawn_worker(&mut state, task, true);
                return Ok(());
            }
            if state.queue.len() < shared.config.queue_capacity {
                state.queue.push_back(task);
                drop(state);
                shared.notify.notify_one();
                return Ok(());
            }
            if state.workers < shared.config.max_workers {
                self.spawn_worker(&mut state, task, false);
                return Ok(());
            }

            match shared.config.overload {
                OverloadPolicy::Reject => None,
                OverloadPolicy::DiscardOldest => {
                    if let Some(dropped) = state.queue.pop_front() {
                        tracing::warn!(pool = %pool, task = dropped.name, "queue full, dropping oldest task");
                        metrics::counter!("dispatch_dropped_total", "pool" => pool.name())
                            .increment(1);
                    }
                    state.queue.push_back(task);
                    drop(state);
                    shared.notify.notify_one();
                    return Ok(());
                }
                OverloadPolicy::CallerRuns => Some(task),
            }
        };

        match overflow {
            Some(task) => {
                tracing::debug!(pool = %pool, task = task.name, "pool saturated, running on caller");
                metrics::counter!("dispatch_caller_runs_total", "pool" => pool.name()).increment(1);
                run(pool, task).await;
                Ok(())
            }
            None => {
                tracing::warn!(pool = %pool, task = name, "pool saturated, rejecting task");
                metrics::counter!("dispatch_rejected_total", "pool" => pool.name()).increment(1);
                Err(DispatchError::Rejected { pool })
            }
        }
    }

    /// Stops accepting work and winds the workers down.
    ///
    /// With `wait_on_shutdown` the queue is drained and running tasks finish,
    /// bounded by `await_termination`; whatever is still running then is
    /// aborted. Without it, queued tasks are discarded and running ones
    /// aborted straight away.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if !shared.config.wait_on_shutdown {
            let discarded = {
                let mut state = shared.state();
                let discarded = state.queue.len();
                state.queue.clear();
                discarded
            };
            if discarded > 0 {
                tracing::info!(pool = %shared.pool, discarded, "discarding queued tasks on shutdown");
            }
        }
        shared.notify.notify_waiters();

        let mut workers = std::mem::take(&mut *shared.join_set());
        if !shared.config.wait_on_shutdown {
            workers.abort_all();
        }

        let drained = tokio::time::timeout(shared.config.await_termination, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                pool = %shared.pool,
                timeout_secs = shared.config.await_termination.as_secs(),
                "workers still busy at shutdown deadline, aborting"
            );
            workers.abort_all();
        }
        tracing::info!(pool = %shared.pool, "pool shut down");
    }

    fn spawn_worker(&self, state: &mut State, first: Task, core: bool) {
        state.workers += 1;
        let shared = Arc::clone(&self.shared);
        let mut set = self.shared.join_set();
        // Reap retired workers.
        while set.try_join_next().is_some() {}
        set.spawn(worker(shared, first, core));
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_set(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_task(&self) -> Option<Task> {
        self.state().queue.pop_front()
    }
}

/// Decrements the live worker count however the worker ends, abort included.
struct WorkerSlot(Arc<Shared>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        let mut state = self.0.state();
        state.workers = state.workers.saturating_sub(1);
    }
}

async fn worker(shared: Arc<Shared>, first: Task, core: bool) {
    let _slot = WorkerSlot(Arc::clone(&shared));
    let pool = shared.pool;
    run(pool, first).await;

    loop {
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some(task) = shared.next_task() {
            run(pool, task).await;
            continue;
        }
        if shared.closed.load(Ordering::SeqCst) {
            break;
        }

        if core {
            notified.await;
        } else if tokio::time::timeout(shared.config.keep_alive, notified)
            .await
            .is_err()
        {
            // Idle past keep-alive; take one last look before retiring.
            match shared.next_task() {
                Some(task) => run(pool, task).await,
                None => {
                    tracing::debug!(pool = %pool, "idle worker retiring");
                    break;
                }
            }
        }
    }
}

async fn report_errors<F, E>(pool: Pool, name: &'static str, task: F)
where
    F: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    if let Err(err) = task.await {
        tracing::error!(pool = %pool, task = name, error = %err, "background task failed");
        metrics::counter!("dispatch_task_failures_total", "pool" => pool.name()).increment(1);
    }
}

async fn run(pool: Pool, task: Task) {
    if AssertUnwindSafe(task.job).catch_unwind().await.is_err() {
        tracing::error!(pool = %pool, task = task.name, "background task panicked");
        metrics::counter!("dispatch_task_failures_total", "pool" => pool.name()).increment(1);
    }
}
