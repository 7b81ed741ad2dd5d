//! Durable storage for orders.
//!
//! Every write goes through a unit of work started with an explicit
//! [`Isolation`] level; per-order exclusive locks are taken with
//! [`OrderTransaction::find_for_update`].

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryOrderStore, InMemoryTransaction};
pub use postgres::{PostgresOrderStore, PostgresTransaction};
pub use query::OrderQuery;
pub use store::{Isolation, OrderStore, OrderTransaction};
