//! Read-only views of catalog products and customers.
//!
//! Both are owned by remote collaborators; the order service only ever sees
//! the snapshot returned by the last call.

use common::{CustomerId, ProductId};
use serde::{Deserialize, Serialize};

use crate::order::Money;

/// Catalog status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    Discontinued,
}

/// Product as reported by the inventory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub price: Money,
    pub stock_quantity: u32,
    pub status: ProductStatus,
    pub available: bool,
}

impl ProductSnapshot {
    pub const UNAVAILABLE_NAME: &'static str = "Product Unavailable";

    /// Placeholder returned when the inventory service cannot be reached.
    pub fn unavailable(id: ProductId) -> Self {
        Self {
            id,
            name: Self::UNAVAILABLE_NAME.to_string(),
            sku: String::new(),
            price: Money::zero(),
            stock_quantity: 0,
            status: ProductStatus::Inactive,
            available: false,
        }
    }

    /// Whether new orders may include this product.
    pub fn is_orderable(&self) -> bool {
        self.available && self.status == ProductStatus::Active
    }

    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock_quantity >= quantity
    }
}

/// Loyalty tier of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl CustomerTier {
    /// Parses a tier name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BRONZE" => Some(Self::Bronze),
            "SILVER" => Some(Self::Silver),
            "GOLD" => Some(Self::Gold),
            "PLATINUM" => Some(Self::Platinum),
            _ => None,
        }
    }
}

/// Customer as reported by the customer/loyalty service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub id: CustomerId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub tier: CustomerTier,
    pub loyalty_points: i64,
}

impl CustomerSnapshot {
    pub const UNKNOWN_NAME: &'static str = "Unknown User";
    pub const UNKNOWN_EMAIL: &'static str = "unknown@example.com";

    /// Placeholder returned when the customer service cannot be reached.
    pub fn unknown(id: CustomerId) -> Self {
        Self {
            id,
            username: "unknown".to_string(),
            email: Self::UNKNOWN_EMAIL.to_string(),
            full_name: Self::UNKNOWN_NAME.to_string(),
            tier: CustomerTier::Bronze,
            loyalty_points: 0,
        }
    }

    /// True for the placeholder built by [`CustomerSnapshot::unknown`].
    pub fn is_placeholder(&self) -> bool {
        self.full_name == Self::UNKNOWN_NAME && self.email == Self::UNKNOWN_EMAIL
    }
}
