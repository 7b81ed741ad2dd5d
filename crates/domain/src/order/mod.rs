//! Order aggregate and related types.

mod aggregate;
mod status;
mod value_objects;

pub use aggregate::{Order, PersistedOrder};
pub use status::{OrderStatus, UnknownStatus};
pub use value_objects::{Address, Money, OrderLine, PaymentMethod};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order is not in a status that allows the action.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },

    /// Line not found in order.
    #[error("Line not found: {product_id}")]
    LineNotFound { product_id: ProductId },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Invalid price.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    /// Discount larger than what it is taken from.
    #[error("Invalid discount: {discount} exceeds subtotal {subtotal}")]
    InvalidDiscount { discount: i64, subtotal: i64 },

    /// Negative order-level charge.
    #[error("Invalid {field}: {amount} (must not be negative)")]
    NegativeCharge { field: &'static str, amount: i64 },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,
}
