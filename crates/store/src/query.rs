use chrono::{DateTime, Utc};
use common::CustomerId;
use domain::{Money, Order, OrderStatus};

/// Criteria for searching stored orders.
///
/// Every criterion is optional; the ones that are set must all match.
/// Results are returned newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub customer_id: Option<CustomerId>,
    pub status: Option<OrderStatus>,

    /// Orders placed at or after this time.
    pub from_date: Option<DateTime<Utc>>,

    /// Orders placed at or before this time.
    pub to_date: Option<DateTime<Utc>>,

    /// Minimum final amount (inclusive).
    pub min_amount: Option<Money>,

    /// Maximum final amount (inclusive).
    pub max_amount: Option<Money>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,
}

impl OrderQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn placed_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from_date = from;
        self.to_date = to;
        self
    }

    pub fn amount_between(mut self, min: Option<Money>, max: Option<Money>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the order satisfies every set criterion.
    pub fn matches(&self, order: &Order) -> bool {
        self.customer_id.is_none_or(|c| order.customer_id() == c)
            && self.status.is_none_or(|s| order.status() == s)
            && self.from_date.is_none_or(|from| order.order_date() >= from)
            && self.to_date.is_none_or(|to| order.order_date() <= to)
            && self.min_amount.is_none_or(|min| order.final_amount() >= min)
            && self.max_amount.is_none_or(|max| order.final_amount() <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;
    use domain::OrderLine;

    fn order(customer: i64, cents: i64) -> Order {
        let mut order = Order::new(CustomerId::new(customer), "Ada", "ada@example.com");
        order
            .add_line(OrderLine::new(
                ProductId::new(1),
                "Widget",
                "WID-1",
                Money::from_cents(cents),
                1,
            ))
            .unwrap();
        order
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(OrderQuery::new().matches(&order(1, 100)));
    }

    #[test]
    fn test_criteria_are_and_ed() {
        let query = OrderQuery::for_customer(CustomerId::new(1))
            .with_status(OrderStatus::Pending)
            .amount_between(Some(Money::from_cents(500)), None);

        assert!(query.matches(&order(1, 500)));
        assert!(!query.matches(&order(1, 499)));
        assert!(!query.matches(&order(2, 500)));
        assert!(!query.clone().with_status(OrderStatus::Shipped).matches(&order(1, 500)));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let o = order(1, 100);
        let at = o.order_date();
        assert!(OrderQuery::new().placed_between(Some(at), Some(at)).matches(&o));
        assert!(
            !OrderQuery::new()
                .placed_between(Some(at + chrono::Duration::seconds(1)), None)
                .matches(&o)
        );
    }
}
