//! Payment gateway.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::OrderId;
use domain::{Money, PaymentMethod};
use serde::Deserialize;
use thiserror::Error;

use super::lock;

/// Card data supplied with a create request. Never persisted.
#[derive(Clone, Default, Deserialize)]
pub struct PaymentDetails {
    pub card_number: String,
    pub card_holder_name: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
    pub cvv: String,
    #[serde(default)]
    pub billing_zip: Option<String>,
}

impl PaymentDetails {
    /// Last four digits of the card number.
    pub fn last_four(&self) -> &str {
        let n = self.card_number.len();
        self.card_number.get(n.saturating_sub(4)..).unwrap_or("")
    }
}

impl std::fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("card_number", &format_args!("****{}", self.last_four()))
            .field("card_holder_name", &self.card_holder_name)
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// Trait for charging and refunding orders.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Charges an order and returns the gateway's transaction id.
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
        details: Option<&PaymentDetails>,
    ) -> Result<String, PaymentError>;

    /// Refunds a charge.
    ///
    /// Idempotent per transaction id: refunding a transaction that was
    /// already refunded succeeds without moving money again.
    async fn refund(&self, transaction_id: &str, amount: Money) -> Result<(), PaymentError>;
}

/// Builds a transaction id of the form `TXN_<millis>_<4 hex digits>`.
pub fn new_transaction_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("TXN_{millis}_{}", suffix[..4].to_ascii_uppercase())
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    charges: HashMap<String, (OrderId, Money)>,
    refunds: Vec<(String, Money)>,
    fail_on_charge: bool,
    fail_on_refund: bool,
    latency: Option<Duration>,
}

/// In-memory payment gateway.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines every charge.
    pub fn set_fail_on_charge(&self, fail: bool) {
        lock(&self.state).fail_on_charge = fail;
    }

    /// Fails every refund as unavailable.
    pub fn set_fail_on_refund(&self, fail: bool) {
        lock(&self.state).fail_on_refund = fail;
    }

    /// Delays charges, for timeout tests.
    pub fn set_latency(&self, latency: Option<Duration>) {
        lock(&self.state).latency = latency;
    }

    /// Number of charges not refunded.
    pub fn active_charges(&self) -> usize {
        lock(&self.state).charges.len()
    }

    pub fn charge_for(&self, order_id: OrderId) -> Option<Money> {
        lock(&self.state)
            .charges
            .values()
            .find(|(id, _)| *id == order_id)
            .map(|(_, amount)| *amount)
    }

    pub fn refunds(&self) -> Vec<(String, Money)> {
        lock(&self.state).refunds.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
        _details: Option<&PaymentDetails>,
    ) -> Result<String, PaymentError> {
        let latency = lock(&self.state).latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = lock(&self.state);
        if state.fail_on_charge {
            return Err(PaymentError::Declined(format!("{method} charge refused")));
        }

        let transaction_id = new_transaction_id();
        state
            .charges
            .insert(transaction_id.clone(), (order_id, amount));
        Ok(transaction_id)
    }

    async fn refund(&self, transaction_id: &str, amount: Money) -> Result<(), PaymentError> {
        let mut state = lock(&self.state);
        if state.fail_on_refund {
            return Err(PaymentError::Unavailable("refund endpoint down".to_string()));
        }
        if state.refunds.iter().any(|(txn, _)| txn == transaction_id) {
            tracing::debug!(transaction_id, "refund already issued");
            return Ok(());
        }
        state.charges.remove(transaction_id);
        state.refunds.push((transaction_id.to_string(), amount));
        Ok(())
    }
}
