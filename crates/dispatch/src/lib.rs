//! Background task dispatch.
//!
//! Work that must not hold up a request is submitted to one of four named
//! pools. Each pool has its own worker limits, queue capacity, overload
//! policy and shutdown behaviour; see [`PoolConfig::for_pool`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pool;

pub use config::{DispatcherConfig, OverloadPolicy, Pool, PoolConfig};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, Result};
pub use pool::{PoolStats, WorkerPool};
