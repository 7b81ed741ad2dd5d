//! Order pricing rules.

use serde::{Deserialize, Serialize};

use crate::order::{Money, Order, OrderError};
use crate::snapshots::CustomerTier;

/// Rates and thresholds used to price an order at creation.
///
/// Rates are basis points of the amount they apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Tax on the discounted subtotal.
    pub tax_rate_bps: u32,
    /// Flat shipping charged below the free-shipping threshold.
    pub shipping_fee: Money,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Money,
    pub gold_discount_bps: u32,
    pub platinum_discount_bps: u32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_bps: 850,
            shipping_fee: Money::from_cents(999),
            free_shipping_threshold: Money::from_dollars(100),
            gold_discount_bps: 1_000,
            platinum_discount_bps: 1_500,
        }
    }
}

/// Charges computed for a subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charges {
    pub shipping: Money,
    pub tax: Money,
    pub discount: Money,
}

impl PricingPolicy {
    /// Discount rate for a customer tier.
    pub fn discount_rate(&self, tier: CustomerTier) -> u32 {
        match tier {
            CustomerTier::Gold => self.gold_discount_bps,
            CustomerTier::Platinum => self.platinum_discount_bps,
            CustomerTier::Bronze | CustomerTier::Silver => 0,
        }
    }

    /// Computes charges for a subtotal.
    pub fn charges(&self, subtotal: Money, tier: CustomerTier) -> Charges {
        let shipping = if subtotal >= self.free_shipping_threshold {
            Money::zero()
        } else {
            self.shipping_fee
        };
        let discount = subtotal.percent(self.discount_rate(tier));
        let tax = (subtotal - discount).percent(self.tax_rate_bps);

        Charges {
            shipping,
            tax,
            discount,
        }
    }

    /// Prices a pending order in place.
    pub fn apply(&self, order: &mut Order, tier: CustomerTier) -> Result<Charges, OrderError> {
        let charges = self.charges(order.subtotal(), tier);
        order.set_charges(charges.shipping, charges.tax, charges.discount)?;
        Ok(charges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderLine;
    use common::{CustomerId, ProductId};

    fn order_with(cents: i64, quantity: u32) -> Order {
        let mut order = Order::new(CustomerId::new(1), "Ada", "ada@example.com");
        order
            .add_line(OrderLine::new(
                ProductId::new(1),
                "Widget",
                "WID-1",
                Money::from_cents(cents),
                quantity,
            ))
            .unwrap();
        order
    }

    #[test]
    fn test_platinum_small_order() {
        let mut order = order_with(1000, 2);
        let charges = PricingPolicy::default()
            .apply(&mut order, CustomerTier::Platinum)
            .unwrap();

        assert_eq!(charges.discount.cents(), 300);
        assert_eq!(charges.tax.cents(), 145);
        assert_eq!(charges.shipping.cents(), 999);
        assert_eq!(order.final_amount().cents(), 2844);
    }

    #[test]
    fn test_shipping_free_at_threshold() {
        let policy = PricingPolicy::default();
        let at = policy.charges(Money::from_cents(10_000), CustomerTier::Bronze);
        let below = policy.charges(Money::from_cents(9_999), CustomerTier::Bronze);
        assert_eq!(at.shipping, Money::zero());
        assert_eq!(below.shipping.cents(), 999);
    }

    #[test]
    fn test_bronze_and_silver_get_no_discount() {
        let policy = PricingPolicy::default();
        for tier in [CustomerTier::Bronze, CustomerTier::Silver] {
            let charges = policy.charges(Money::from_cents(5_000), tier);
            assert_eq!(charges.discount, Money::zero());
            assert_eq!(charges.tax.cents(), 425);
        }
    }

    #[test]
    fn test_gold_discount_is_ten_percent() {
        let charges = PricingPolicy::default().charges(Money::from_cents(12_345), CustomerTier::Gold);
        assert_eq!(charges.discount.cents(), 1_235);
        assert_eq!(charges.shipping, Money::zero());
    }
}
