//! Background side effects run after a workflow commits.
//!
//! Every task owns an [`OrderNotice`] copied from the committed order, never
//! the aggregate itself. Failures are logged by the worker pool.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{CustomerId, OrderId};
use domain::{Money, Order, OrderStatus};
use serde::Serialize;
use thiserror::Error;

use crate::clients::lock;

/// Minimal context handed to side-effect tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderNotice {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub customer_email: String,
    pub status: OrderStatus,
    pub final_amount: Money,
}

impl OrderNotice {
    /// Copies the notice fields out of a persisted order.
    pub fn from_order(order_id: OrderId, order: &Order) -> Self {
        Self {
            order_id,
            customer_id: order.customer_id(),
            customer_email: order.customer_email().to_string(),
            status: order.status(),
            final_amount: order.final_amount(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("side effect failed: {0}")]
pub struct SideEffectError(pub String);

/// Sinks for notifications, analytics and post-processing.
#[async_trait]
pub trait SideEffects: Send + Sync + 'static {
    async fn order_confirmation(&self, notice: OrderNotice) -> Result<(), SideEffectError>;

    async fn status_changed(
        &self,
        notice: OrderNotice,
        previous: OrderStatus,
    ) -> Result<(), SideEffectError>;

    async fn order_cancelled(
        &self,
        notice: OrderNotice,
        reason: String,
    ) -> Result<(), SideEffectError>;

    async fn record_analytics(&self, notice: OrderNotice) -> Result<(), SideEffectError>;

    async fn post_process(&self, order_id: OrderId) -> Result<(), SideEffectError>;
}

/// Side effects that only emit log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSideEffects;

#[async_trait]
impl SideEffects for TracingSideEffects {
    async fn order_confirmation(&self, notice: OrderNotice) -> Result<(), SideEffectError> {
        tracing::info!(
            order_id = %notice.order_id,
            email = %notice.customer_email,
            amount = %notice.final_amount,
            "order confirmation sent"
        );
        Ok(())
    }

    async fn status_changed(
        &self,
        notice: OrderNotice,
        previous: OrderStatus,
    ) -> Result<(), SideEffectError> {
        tracing::info!(
            order_id = %notice.order_id,
            from = %previous,
            to = %notice.status,
            "status change notification sent"
        );
        Ok(())
    }

    async fn order_cancelled(
        &self,
        notice: OrderNotice,
        reason: String,
    ) -> Result<(), SideEffectError> {
        tracing::info!(order_id = %notice.order_id, %reason, "cancellation notification sent");
        Ok(())
    }

    async fn record_analytics(&self, notice: OrderNotice) -> Result<(), SideEffectError> {
        tracing::debug!(
            order_id = %notice.order_id,
            customer_id = %notice.customer_id,
            amount_cents = notice.final_amount.cents(),
            "analytics recorded"
        );
        Ok(())
    }

    async fn post_process(&self, order_id: OrderId) -> Result<(), SideEffectError> {
        tracing::debug!(%order_id, "post-processing complete");
        Ok(())
    }
}

/// One side effect as seen by [`RecordingSideEffects`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Confirmation(OrderId),
    StatusChanged {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
    Cancelled {
        order_id: OrderId,
        reason: String,
    },
    Analytics(OrderId),
    PostProcess(OrderId),
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<SideEffect>,
    fail: bool,
}

/// Side effects that remember what they were asked to do.
#[derive(Debug, Clone, Default)]
pub struct RecordingSideEffects {
    state: Arc<Mutex<Recording>>,
}

impl RecordingSideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SideEffect> {
        lock(&self.state).events.clone()
    }

    /// Makes every side effect fail after being recorded.
    pub fn set_fail(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    fn record(&self, event: SideEffect) -> Result<(), SideEffectError> {
        let mut state = lock(&self.state);
        state.events.push(event);
        if state.fail {
            return Err(SideEffectError("sink unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SideEffects for RecordingSideEffects {
    async fn order_confirmation(&self, notice: OrderNotice) -> Result<(), SideEffectError> {
        self.record(SideEffect::Confirmation(notice.order_id))
    }

    async fn status_changed(
        &self,
        notice: OrderNotice,
        previous: OrderStatus,
    ) -> Result<(), SideEffectError> {
        self.record(SideEffect::StatusChanged {
            order_id: notice.order_id,
            from: previous,
            to: notice.status,
        })
    }

    async fn order_cancelled(
        &self,
        notice: OrderNotice,
        reason: String,
    ) -> Result<(), SideEffectError> {
        self.record(SideEffect::Cancelled {
            order_id: notice.order_id,
            reason,
        })
    }

    async fn record_analytics(&self, notice: OrderNotice) -> Result<(), SideEffectError> {
        self.record(SideEffect::Analytics(notice.order_id))
    }

    async fn post_process(&self, order_id: OrderId) -> Result<(), SideEffectError> {
        self.record(SideEffect::PostProcess(order_id))
    }
}
