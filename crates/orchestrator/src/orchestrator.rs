//! The order lifecycle workflows.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId};
use dispatch::{Dispatcher, Pool};
use domain::{Money, Order, OrderLine, OrderStatus, ProductSnapshot};
use resilience::{CircuitState, Guard};
use serde::Serialize;
use store::{Isolation, OrderStore, OrderTransaction};

use crate::bulk::{BulkOperation, BulkOutcome};
use crate::clients::{ClientError, CustomerClient, InventoryClient, PaymentGateway, StockUpdateMode};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::request::CreateOrderRequest;
use crate::resilient::{ResilientCustomers, ResilientInventory};
use crate::side_effects::{OrderNotice, SideEffectError, SideEffects};

/// Breaker state of one collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollaboratorStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_rate: f64,
}

impl CollaboratorStatus {
    fn of(guard: &Guard) -> Self {
        Self {
            name: guard.name().to_string(),
            state: guard.state(),
            failure_rate: guard.breaker().failure_rate(),
        }
    }
}

/// Runs the create, update-status, process and cancel workflows.
///
/// Each workflow is one unit of work against the store. Calls to the
/// inventory and customer services go through their guards; side effects
/// are handed to the dispatcher after commit and never affect the result.
pub struct OrderOrchestrator<S, I, C, P, N> {
    store: Arc<S>,
    inventory: ResilientInventory<I>,
    customers: ResilientCustomers<C>,
    payments: Arc<P>,
    effects: Arc<N>,
    dispatcher: Dispatcher,
    config: OrchestratorConfig,
}

impl<S, I, C, P, N> OrderOrchestrator<S, I, C, P, N>
where
    S: OrderStore,
    I: InventoryClient,
    C: CustomerClient,
    P: PaymentGateway,
    N: SideEffects,
{
    pub fn new(
        store: Arc<S>,
        inventory: Arc<I>,
        customers: Arc<C>,
        payments: Arc<P>,
        effects: Arc<N>,
        dispatcher: Dispatcher,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            inventory: ResilientInventory::new(inventory, config.inventory.clone()),
            customers: ResilientCustomers::new(customers, config.customer.clone()),
            payments,
            effects,
            dispatcher,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn inventory_guard(&self) -> &Guard {
        self.inventory.guard()
    }

    pub fn customer_guard(&self) -> &Guard {
        self.customers.guard()
    }

    /// Breaker state of every collaborator.
    pub fn collaborator_status(&self) -> Vec<CollaboratorStatus> {
        vec![
            CollaboratorStatus::of(self.inventory.guard()),
            CollaboratorStatus::of(self.customers.guard()),
        ]
    }

    /// Creates, prices, charges and confirms an order.
    ///
    /// Nothing is visible to readers unless the whole workflow commits. A
    /// charge taken before a later failure (or the overall timeout) is
    /// refunded.
    #[tracing::instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, lines = request.lines.len())
    )]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.create_order_bounded(&request).await;
        observe("create", started, &result);

        let order = result?;
        metrics::counter!("orders_created_total").increment(1);

        if let Some(order_id) = order.id() {
            tracing::info!(
                %order_id,
                final_amount = %order.final_amount(),
                "order created"
            );
            self.after_create(OrderNotice::from_order(order_id, &order))
                .await;
        }
        Ok(order)
    }

    async fn create_order_bounded(&self, request: &CreateOrderRequest) -> Result<Order> {
        request.validate()?;

        let mut charged = None;
        let outcome =
            tokio::time::timeout(self.config.create_timeout, self.create_unit_of_work(request, &mut charged))
                .await;
        let result = outcome.unwrap_or(Err(OrchestratorError::Timeout {
            operation: "create order",
        }));

        if result.is_err()
            && let Some((transaction_id, amount)) = charged
        {
            self.refund_charge(&transaction_id, amount).await;
        }
        result
    }

    async fn create_unit_of_work(
        &self,
        request: &CreateOrderRequest,
        charged: &mut Option<(String, Money)>,
    ) -> Result<Order> {
        // 1. Resolve the customer
        let customer = self
            .customers
            .get_customer(request.customer_id)
            .await
            .map_err(|err| OrchestratorError::CustomerValidation(err.to_string()))?;
        if customer.is_placeholder() {
            tracing::warn!(customer_id = %request.customer_id, "customer service degraded, pricing as bronze");
        }

        // 2. Resolve every product before touching anything
        let requested = request.quantities();
        let ids: Vec<ProductId> = requested.iter().map(|(id, _)| *id).collect();
        let catalog: HashMap<ProductId, ProductSnapshot> = self
            .inventory
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        let mut lines = Vec::with_capacity(requested.len());
        for (product_id, quantity) in requested {
            let product = catalog
                .get(&product_id)
                .ok_or(OrchestratorError::ProductNotFound(product_id))?;
            if !product.is_orderable() {
                return Err(OrchestratorError::ProductNotAvailable(product_id));
            }
            if !product.has_stock(quantity) {
                return Err(OrchestratorError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available: Some(product.stock_quantity),
                });
            }
            lines.push(OrderLine::new(
                product.id,
                product.name.clone(),
                product.sku.clone(),
                product.price,
                quantity,
            ));
        }

        // 3. Build and price the aggregate
        let mut order = Order::new(customer.id, customer.full_name, customer.email);
        for line in lines {
            order.add_line(line)?;
        }
        order.set_payment_method(request.payment_method);
        order.set_shipping_address(request.shipping_address.clone());
        order.set_billing_address(request.billing_address.clone());
        if let Some(notes) = request.notes.as_deref().filter(|n| !n.is_empty()) {
            order.append_note(notes);
        }
        let charges = self.config.pricing.apply(&mut order, customer.tier)?;
        tracing::debug!(
            subtotal = %order.subtotal(),
            discount = %charges.discount,
            tax = %charges.tax,
            shipping = %charges.shipping,
            "order priced"
        );

        // 4. Persist once to obtain the id
        let mut tx = self.store.begin(Isolation::ReadCommitted).await?;
        let order_id = tx.insert(&mut order).await?;

        // 5. Charge
        let amount = order.final_amount();
        let transaction_id = self
            .payments
            .charge(
                order_id,
                amount,
                order.payment_method(),
                request.payment_details.as_ref(),
            )
            .await
            .map_err(|err| OrchestratorError::PaymentFailed(err.to_string()))?;
        *charged = Some((transaction_id.clone(), amount));

        // 6. Confirm and commit
        order.record_payment(transaction_id)?;
        order.confirm()?;
        tx.update(&order).await?;
        tx.commit().await?;

        Ok(order)
    }

    async fn refund_charge(&self, transaction_id: &str, amount: Money) {
        match self.payments.refund(transaction_id, amount).await {
            Ok(()) => tracing::info!(transaction_id, %amount, "charge refunded after failed create"),
            Err(err) => tracing::error!(
                transaction_id,
                %amount,
                error = %err,
                "failed to refund charge after failed create"
            ),
        }
    }

    async fn after_create(&self, notice: OrderNotice) {
        let order_id = notice.order_id;

        let effects = Arc::clone(&self.effects);
        let confirmation = notice.clone();
        self.dispatch(Pool::Notification, "order-confirmation", async move {
            effects.order_confirmation(confirmation).await
        })
        .await;

        let effects = Arc::clone(&self.effects);
        self.dispatch(Pool::Analytics, "order-analytics", async move {
            effects.record_analytics(notice).await
        })
        .await;

        let effects = Arc::clone(&self.effects);
        self.dispatch(Pool::Default, "order-post-processing", async move {
            effects.post_process(order_id).await
        })
        .await;
    }

    /// Moves an order one step along its lifecycle.
    ///
    /// Holds the order's row lock, so concurrent updates of one order are
    /// validated one after the other. This is a bare status change: use
    /// [`cancel_order`](Self::cancel_order) to refund and release stock.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let started = Instant::now();
        let result = self.update_status_inner(order_id, new_status).await;
        observe("update_status", started, &result);

        let (order, previous) = result?;
        tracing::info!(%order_id, from = %previous, to = %new_status, "order status updated");

        let effects = Arc::clone(&self.effects);
        let notice = OrderNotice::from_order(order_id, &order);
        self.dispatch(Pool::Notification, "status-notification", async move {
            effects.status_changed(notice, previous).await
        })
        .await;
        Ok(order)
    }

    async fn update_status_inner(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<(Order, OrderStatus)> {
        let mut tx = self.store.begin(Isolation::ReadCommitted).await?;
        let mut order = tx
            .find_for_update(order_id)
            .await?
            .ok_or(OrchestratorError::OrderNotFound(order_id))?;

        let previous = order.status();
        let invalid = || OrchestratorError::InvalidOrderState {
            status: previous,
            action: format!("change status to {new_status}"),
        };
        if !previous.can_transition_to(new_status) {
            return Err(invalid());
        }

        match new_status {
            OrderStatus::Confirmed => order.confirm()?,
            OrderStatus::Processing => order.process()?,
            OrderStatus::Shipped => order.ship(tracking_number())?,
            OrderStatus::Delivered => order.deliver()?,
            OrderStatus::Cancelled => order.cancel("status updated to CANCELLED")?,
            OrderStatus::Pending => return Err(invalid()),
        }

        tx.update(&order).await?;
        tx.commit().await?;
        Ok((order, previous))
    }

    /// Deducts stock for a confirmed order and moves it to processing.
    ///
    /// Runs serializable under the order's row lock. Stock already deducted
    /// is put back when a later step fails, the commit fails or the overall
    /// timeout fires.
    #[tracing::instrument(skip(self))]
    pub async fn process_order(&self, order_id: OrderId) -> Result<Order> {
        let started = Instant::now();

        let mut deducted = Vec::new();
        let outcome = tokio::time::timeout(
            self.config.process_timeout,
            self.process_unit_of_work(order_id, &mut deducted),
        )
        .await;
        let result = outcome.unwrap_or(Err(OrchestratorError::Timeout {
            operation: "process order",
        }));

        if result.is_err() && !deducted.is_empty() {
            self.restore_stock(order_id, &deducted).await;
        }
        observe("process", started, &result);

        let order = result?;
        tracing::info!(%order_id, "order processing started");

        let effects = Arc::clone(&self.effects);
        let notice = OrderNotice::from_order(order_id, &order);
        self.dispatch(Pool::Notification, "status-notification", async move {
            effects
                .status_changed(notice, OrderStatus::Confirmed)
                .await
        })
        .await;
        Ok(order)
    }

    async fn process_unit_of_work(
        &self,
        order_id: OrderId,
        deducted: &mut Vec<(ProductId, u32)>,
    ) -> Result<Order> {
        // 1. Lock the order and check its status
        let mut tx = self.store.begin(Isolation::Serializable).await?;
        let mut order = tx
            .find_for_update(order_id)
            .await?
            .ok_or(OrchestratorError::OrderNotFound(order_id))?;

        if !order.status().can_process() {
            return Err(OrchestratorError::InvalidOrderState {
                status: order.status(),
                action: "process".to_string(),
            });
        }

        // 2. Re-check availability for every line
        let wanted: Vec<(ProductId, u32)> = order
            .lines()
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect();
        let availability = self.inventory.check_availability(&wanted).await?;
        if let Some((product_id, requested)) = wanted
            .iter()
            .find(|(id, _)| !availability.get(id).copied().unwrap_or(false))
        {
            return Err(OrchestratorError::InsufficientStock {
                product_id: *product_id,
                requested: *requested,
                available: None,
            });
        }

        // 3. Deduct stock line by line
        for (product_id, quantity) in &wanted {
            self.inventory
                .update_stock(*product_id, *quantity, StockUpdateMode::Reduce)
                .await
                .map_err(|err| match err {
                    ClientError::Rejected(_) => OrchestratorError::InsufficientStock {
                        product_id: *product_id,
                        requested: *quantity,
                        available: None,
                    },
                    other => other.into(),
                })?;
            deducted.push((*product_id, *quantity));
        }

        // 4. Loyalty points, one per whole currency unit
        let points = order.final_amount().dollars();
        if points > 0
            && let Err(err) = self
                .customers
                .credit_loyalty_points(order.customer_id(), points)
                .await
        {
            tracing::warn!(%order_id, points, error = %err, "failed to credit loyalty points");
        }

        // 5. Transition and commit
        order.process()?;
        tx.update(&order).await?;
        tx.commit().await?;

        Ok(order)
    }

    async fn restore_stock(&self, order_id: OrderId, deducted: &[(ProductId, u32)]) {
        for (product_id, quantity) in deducted {
            if let Err(err) = self
                .inventory
                .update_stock(*product_id, *quantity, StockUpdateMode::Add)
                .await
            {
                tracing::error!(
                    %order_id,
                    %product_id,
                    quantity,
                    error = %err,
                    "failed to restore deducted stock"
                );
            }
        }
    }

    /// Refunds, cancels and releases held stock.
    ///
    /// A refund failure aborts the cancellation with the order untouched.
    /// Held stock is released only once the cancellation has committed, so
    /// a failed commit followed by a retry never releases it twice; the
    /// refund is keyed by transaction id and safe to repeat. A failure to
    /// release one line's stock is logged and the remaining lines are still
    /// released.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId, reason: &str) -> Result<Order> {
        let started = Instant::now();
        let result = self.cancel_unit_of_work(order_id, reason).await;
        observe("cancel", started, &result);

        let (order, previous) = result?;
        tracing::info!(%order_id, reason, "order cancelled");

        if previous.holds_stock() {
            self.release_stock(order_id, &order).await;
        }

        let effects = Arc::clone(&self.effects);
        let notice = OrderNotice::from_order(order_id, &order);
        let reason = reason.to_string();
        self.dispatch(Pool::Notification, "cancellation-notification", async move {
            effects.order_cancelled(notice, reason).await
        })
        .await;
        Ok(order)
    }

    async fn cancel_unit_of_work(
        &self,
        order_id: OrderId,
        reason: &str,
    ) -> Result<(Order, OrderStatus)> {
        let mut tx = self.store.begin(Isolation::ReadCommitted).await?;
        let mut order = tx
            .find_for_update(order_id)
            .await?
            .ok_or(OrchestratorError::OrderNotFound(order_id))?;

        let previous = order.status();
        if !previous.can_cancel() {
            return Err(OrchestratorError::InvalidOrderState {
                status: previous,
                action: "cancel".to_string(),
            });
        }

        if let Some(transaction_id) = order.payment_transaction_id().map(str::to_owned) {
            self.payments
                .refund(&transaction_id, order.final_amount())
                .await
                .map_err(|err| OrchestratorError::RefundFailed(err.to_string()))?;
            tracing::info!(%order_id, transaction_id, "payment refunded");
        }

        order.cancel(reason)?;
        tx.update(&order).await?;
        tx.commit().await?;

        Ok((order, previous))
    }

    /// Puts back the stock a cancelled order was holding, line by line.
    async fn release_stock(&self, order_id: OrderId, order: &Order) {
        for line in order.lines() {
            if let Err(err) = self
                .inventory
                .update_stock(line.product_id, line.quantity, StockUpdateMode::Add)
                .await
            {
                tracing::warn!(
                    %order_id,
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    error = %err,
                    "failed to release stock, skipping line"
                );
            }
        }
    }

    /// Runs a bulk maintenance operation and reports how many orders it changed.
    #[tracing::instrument(skip(self))]
    pub async fn perform_bulk(&self, operation: BulkOperation) -> Result<BulkOutcome> {
        let started = Instant::now();
        let result = match &operation {
            BulkOperation::CancelStale => self.cancel_stale().await,
            BulkOperation::UpdateTracking(order_ids) => self.update_tracking(order_ids).await,
        };
        observe("bulk", started, &result);

        let affected = result?;
        tracing::info!(operation = operation.name(), affected, "bulk operation completed");
        Ok(BulkOutcome {
            operation: operation.name(),
            affected,
            completed_at: Utc::now(),
        })
    }

    async fn cancel_stale(&self) -> Result<usize> {
        let age = chrono::Duration::from_std(self.config.stale_order_age).map_err(|_| {
            OrchestratorError::Validation("stale order age out of range".to_string())
        })?;
        self.cancel_stale_orders(Utc::now() - age).await
    }

    /// Cancels every pending order placed before `cutoff` in one transaction.
    ///
    /// Row locks are taken in id order. A pending order that already holds a
    /// payment is skipped so that [`cancel_order`](Self::cancel_order) can
    /// refund it.
    pub async fn cancel_stale_orders(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut candidates: Vec<OrderId> = self
            .store
            .find_by_status(OrderStatus::Pending)
            .await?
            .iter()
            .filter(|order| order.order_date() < cutoff)
            .filter_map(Order::id)
            .collect();
        candidates.sort_unstable();

        let mut tx = self.store.begin(Isolation::ReadCommitted).await?;
        let mut cancelled = 0;
        for order_id in candidates {
            let Some(mut order) = tx.find_for_update(order_id).await? else {
                continue;
            };
            // Re-checked under the lock.
            if order.status() != OrderStatus::Pending {
                continue;
            }
            if order.payment_transaction_id().is_some() {
                tracing::warn!(%order_id, "stale order holds a payment, skipping");
                continue;
            }

            order.cancel("stale pending order")?;
            tx.update(&order).await?;
            cancelled += 1;
        }
        tx.commit().await?;

        if cancelled > 0 {
            tracing::info!(cancelled, %cutoff, "stale pending orders cancelled");
        }
        Ok(cancelled)
    }

    /// Assigns a fresh tracking number to each listed order in one transaction.
    ///
    /// Unknown ids and orders that are neither processing nor shipped are
    /// skipped and not counted.
    pub async fn update_tracking(&self, order_ids: &[OrderId]) -> Result<usize> {
        let mut ids = order_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut tx = self.store.begin(Isolation::ReadCommitted).await?;
        let mut updated = 0;
        for order_id in ids {
            let Some(mut order) = tx.find_for_update(order_id).await? else {
                tracing::debug!(%order_id, "order not found, skipping");
                continue;
            };
            if let Err(err) = order.assign_tracking_number(tracking_number()) {
                tracing::debug!(%order_id, error = %err, "tracking number not assigned");
                continue;
            }
            tx.update(&order).await?;
            updated += 1;
        }
        tx.commit().await?;
        Ok(updated)
    }

    /// Re-runs post-processing for an order on the order-processing pool.
    #[tracing::instrument(skip(self))]
    pub async fn trigger_processing(&self, order_id: OrderId) -> Result<()> {
        if self.store.find(order_id).await?.is_none() {
            return Err(OrchestratorError::OrderNotFound(order_id));
        }

        let effects = Arc::clone(&self.effects);
        self.dispatcher
            .submit(Pool::OrderProcessing, "order-post-processing", async move {
                effects.post_process(order_id).await
            })
            .await?;
        Ok(())
    }

    /// Hands a side effect to a pool. A refused submission is only logged.
    async fn dispatch<F>(&self, pool: Pool, name: &'static str, task: F)
    where
        F: Future<Output = std::result::Result<(), SideEffectError>> + Send + 'static,
    {
        if let Err(err) = self.dispatcher.submit(pool, name, task).await {
            tracing::warn!(%pool, task = name, error = %err, "side effect not dispatched");
        }
    }
}

/// Tracking numbers look like `TRK<millis><4 digits>`.
fn tracking_number() -> String {
    let millis = Utc::now().timestamp_millis();
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let digits = u16::from_le_bytes([bytes[0], bytes[1]]) % 10_000;
    format!("TRK{millis}{digits:04}")
}

fn observe<T>(workflow: &'static str, started: Instant, result: &Result<T>) {
    metrics::histogram!("order_workflow_duration_seconds", "workflow" => workflow)
        .record(started.elapsed().as_secs_f64());

    if let Err(err) = result {
        tracing::warn!(workflow, code = err.code(), error = %err, "workflow failed");
        metrics::counter!(
            "order_workflow_failures_total",
            "workflow" => workflow,
            "code" => err.code()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_number_shape() {
        let tracking = tracking_number();
        assert!(tracking.starts_with("TRK"));
        assert!(tracking[3..].chars().all(|c| c.is_ascii_digit()));
        assert!(tracking.len() >= 3 + 13 + 4);
    }
}
