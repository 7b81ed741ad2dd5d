//! Domain layer for the order service.
//!
//! This crate provides:
//! - The `Order` aggregate with its status state machine
//! - Money and line value objects
//! - Pricing rules applied at order creation
//! - Snapshots of the products and customers owned by remote services

pub mod order;
pub mod pricing;
pub mod snapshots;

pub use order::{
    Address, Money, Order, OrderError, OrderLine, OrderStatus, PaymentMethod, PersistedOrder,
    UnknownStatus,
};
pub use pricing::{Charges, PricingPolicy};
pub use snapshots::{CustomerSnapshot, CustomerTier, ProductSnapshot, ProductStatus};
