//! Read-only views over stored orders.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use domain::{Money, Order, OrderStatus};
use serde::Serialize;
use store::{OrderQuery, OrderStore};

use crate::error::{OrchestratorError, Result};

/// Short form of an order used in customer listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub final_amount: Money,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusStats {
    pub status: OrderStatus,
    pub count: usize,
    pub average_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerStats {
    pub customer_id: CustomerId,
    pub total_orders: usize,
    /// Sum of final amounts over orders that were not cancelled.
    pub total_spent: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAnalytics {
    /// One entry per status that has orders, in lifecycle order.
    pub status_breakdown: Vec<StatusStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerStats>,
    pub generated_at: DateTime<Utc>,
}

/// Order counts across the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionStatistics {
    pub total_orders: usize,
    pub pending_orders: usize,
    /// Orders that reached DELIVERED.
    pub completed_orders: usize,
    pub generated_at: DateTime<Utc>,
}

/// Query facade over an [`OrderStore`].
pub struct OrderQueries<S> {
    store: Arc<S>,
}

impl<S> Clone for OrderQueries<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: OrderStore> OrderQueries<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .find(order_id)
            .await?
            .ok_or(OrchestratorError::OrderNotFound(order_id))
    }

    /// Orders of a customer, newest first.
    pub async fn list_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        Ok(self.store.find_by_customer(customer_id).await?)
    }

    pub async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self.store.find_by_status(status).await?)
    }

    /// Orders matching every given criterion, newest first.
    pub async fn search(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        if let (Some(from), Some(to)) = (query.from_date, query.to_date)
            && from > to
        {
            return Err(OrchestratorError::Validation(
                "from date is after to date".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (query.min_amount, query.max_amount)
            && min > max
        {
            return Err(OrchestratorError::Validation(
                "minimum amount exceeds maximum amount".to_string(),
            ));
        }
        Ok(self.store.search(query).await?)
    }

    /// Orders whose final amount is at least `min_amount`, largest first.
    pub async fn high_value_orders(&self, min_amount: Money) -> Result<Vec<Order>> {
        let query = OrderQuery::new().amount_between(Some(min_amount), None);
        let mut orders = self.store.search(&query).await?;
        orders.sort_by(|a, b| b.final_amount().cmp(&a.final_amount()));
        Ok(orders)
    }

    pub async fn summaries_by_customer(&self, customer_id: CustomerId) -> Result<Vec<OrderSummary>> {
        let orders = self.store.find_by_customer(customer_id).await?;
        Ok(orders
            .iter()
            .filter_map(|order| {
                Some(OrderSummary {
                    order_id: order.id()?,
                    order_date: order.order_date(),
                    status: order.status(),
                    final_amount: order.final_amount(),
                    item_count: order.item_count(),
                })
            })
            .collect())
    }

    /// Per-status counts and averages over all orders, plus totals for one
    /// customer when given.
    pub async fn analytics(&self, customer_id: Option<CustomerId>) -> Result<OrderAnalytics> {
        let orders = self.store.search(&OrderQuery::new()).await?;
        let status_breakdown = status_breakdown(&orders);

        let customer = customer_id.map(|customer_id| {
            let own = orders.iter().filter(|o| o.customer_id() == customer_id);
            CustomerStats {
                customer_id,
                total_orders: own.clone().count(),
                total_spent: own
                    .filter(|o| o.status() != OrderStatus::Cancelled)
                    .map(Order::final_amount)
                    .sum(),
            }
        });

        Ok(OrderAnalytics {
            status_breakdown,
            customer,
            generated_at: Utc::now(),
        })
    }

    pub async fn statistics(&self) -> Result<TransactionStatistics> {
        let orders = self.store.search(&OrderQuery::new()).await?;
        let count = |status: OrderStatus| orders.iter().filter(|o| o.status() == status).count();

        Ok(TransactionStatistics {
            total_orders: orders.len(),
            pending_orders: count(OrderStatus::Pending),
            completed_orders: count(OrderStatus::Delivered),
            generated_at: Utc::now(),
        })
    }
}

fn status_breakdown(orders: &[Order]) -> Vec<StatusStats> {
    OrderStatus::ALL
        .into_iter()
        .filter_map(|status| {
            let amounts: Vec<Money> = orders
                .iter()
                .filter(|o| o.status() == status)
                .map(Order::final_amount)
                .collect();
            if amounts.is_empty() {
                return None;
            }
            let count = amounts.len();
            let total: Money = amounts.into_iter().sum();
            Some(StatusStats {
                status,
                count,
                average_amount: average(total, count),
            })
        })
        .collect()
}

/// Mean of `count` amounts summing to `total`, rounded half up to the cent.
fn average(total: Money, count: usize) -> Money {
    let count = count as i64;
    Money::from_cents((total.cents() * 2 + count) / (count * 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_rounds_half_up() {
        assert_eq!(average(Money::from_cents(300), 2), Money::from_cents(150));
        assert_eq!(average(Money::from_cents(5), 2), Money::from_cents(3));
        assert_eq!(average(Money::from_cents(10), 3), Money::from_cents(3));
    }
}
