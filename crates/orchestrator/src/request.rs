//! Inputs of the create workflow.

use std::collections::HashSet;

use common::{CustomerId, ProductId};
use domain::{Address, PaymentMethod};
use serde::Deserialize;

use crate::clients::PaymentDetails;
use crate::error::{OrchestratorError, Result};

/// One requested line: a product and how many units of it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl LineRequest {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: CustomerId,
    pub lines: Vec<LineRequest>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_details: Option<PaymentDetails>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    pub fn new(customer_id: CustomerId, lines: Vec<LineRequest>) -> Self {
        Self {
            customer_id,
            lines,
            shipping_address: None,
            billing_address: None,
            payment_method: PaymentMethod::default(),
            payment_details: None,
            notes: None,
        }
    }

    /// Checks the request shape before any collaborator is called.
    pub fn validate(&self) -> Result<()> {
        if self.lines.is_empty() {
            return Err(OrchestratorError::Validation(
                "order must contain at least one line".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for line in &self.lines {
            if line.quantity == 0 {
                return Err(OrchestratorError::Validation(format!(
                    "quantity for product {} must be at least 1",
                    line.product_id
                )));
            }
            if !seen.insert(line.product_id) {
                return Err(OrchestratorError::Validation(format!(
                    "product {} appears on more than one line",
                    line.product_id
                )));
            }
        }
        Ok(())
    }

    /// `(product, quantity)` pairs in request order.
    pub fn quantities(&self) -> Vec<(ProductId, u32)> {
        self.lines
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect()
    }
}
