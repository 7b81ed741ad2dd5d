//! Order lifecycle orchestration.
//!
//! This crate provides:
//! - Traits for the inventory, customer and payment collaborators, with
//!   in-memory implementations
//! - Resilient wrappers applying circuit breaking, retry and fallbacks
//! - The `OrderOrchestrator` create/update/process/cancel workflows and
//!   bulk maintenance operations
//! - A read-only query facade over stored orders

pub mod bulk;
pub mod clients;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod queries;
pub mod request;
pub mod resilient;
pub mod side_effects;

pub use bulk::{BulkOperation, BulkOutcome};
pub use clients::{
    ClientError, CustomerClient, InMemoryCustomers, InMemoryInventory, InMemoryPaymentGateway,
    InventoryClient, PaymentDetails, PaymentError, PaymentGateway, StockUpdate, StockUpdateMode,
};
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use orchestrator::{CollaboratorStatus, OrderOrchestrator};
pub use queries::{
    CustomerStats, OrderAnalytics, OrderQueries, OrderSummary, StatusStats, TransactionStatistics,
};
pub use request::{CreateOrderRequest, LineRequest};
pub use resilient::{ResilientCustomers, ResilientInventory};
pub use side_effects::{
    OrderNotice, RecordingSideEffects, SideEffect, SideEffectError, SideEffects,
    TracingSideEffects,
};
