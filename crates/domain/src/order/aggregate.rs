//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, ProductId};
use serde::{Deserialize, Serialize};

use super::{Address, Money, OrderError, OrderLine, OrderStatus, PaymentMethod};

/// Order aggregate root.
///
/// Represents an order with its full lifecycle from creation to delivery or
/// cancellation. Every mutator validates first and only then changes state,
/// so a rejected call leaves the aggregate untouched. Totals are recomputed
/// by every mutator before it returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned identifier, `None` until first insert.
    id: Option<OrderId>,

    /// Customer who placed the order.
    customer_id: CustomerId,

    /// Customer name as known when the order was placed.
    customer_name: String,

    /// Customer email as known when the order was placed.
    customer_email: String,

    order_date: DateTime<Utc>,

    status: OrderStatus,

    /// Lines in insertion order.
    lines: Vec<OrderLine>,

    subtotal: Money,
    tax_amount: Money,
    shipping_amount: Money,
    discount_amount: Money,
    final_amount: Money,

    payment_method: PaymentMethod,
    payment_transaction_id: Option<String>,

    tracking_number: Option<String>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,

    /// Append-only audit trail.
    notes: Option<String>,

    shipping_address: Option<Address>,
    billing_address: Option<Address>,
}

/// Every persisted field of an order, used by stores to rebuild the aggregate.
#[derive(Debug, Clone)]
pub struct PersistedOrder {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub customer_email: String,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub tax_amount: Money,
    pub shipping_amount: Money,
    pub discount_amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_transaction_id: Option<String>,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
}

impl Order {
    /// Starts a new pending order for a customer.
    pub fn new(
        customer_id: CustomerId,
        customer_name: impl Into<String>,
        customer_email: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            customer_id,
            customer_name: customer_name.into(),
            customer_email: customer_email.into(),
            order_date: Utc::now(),
            status: OrderStatus::Pending,
            lines: Vec::new(),
            subtotal: Money::zero(),
            tax_amount: Money::zero(),
            shipping_amount: Money::zero(),
            discount_amount: Money::zero(),
            final_amount: Money::zero(),
            payment_method: PaymentMethod::default(),
            payment_transaction_id: None,
            tracking_number: None,
            shipped_at: None,
            delivered_at: None,
            notes: None,
            shipping_address: None,
            billing_address: None,
        }
    }

    /// Rebuilds an order from its persisted fields.
    ///
    /// Subtotal and final amount are derived, never read back.
    pub fn restore(p: PersistedOrder) -> Self {
        let mut order = Self {
            id: Some(p.id),
            customer_id: p.customer_id,
            customer_name: p.customer_name,
            customer_email: p.customer_email,
            order_date: p.order_date,
            status: p.status,
            lines: p.lines,
            subtotal: Money::zero(),
            tax_amount: p.tax_amount,
            shipping_amount: p.shipping_amount,
            discount_amount: p.discount_amount,
            final_amount: Money::zero(),
            payment_method: p.payment_method,
            payment_transaction_id: p.payment_transaction_id,
            tracking_number: p.tracking_number,
            shipped_at: p.shipped_at,
            delivered_at: p.delivered_at,
            notes: p.notes,
            shipping_address: p.shipping_address,
            billing_address: p.billing_address,
        };
        order.recalculate_totals();
        order
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the lines in the order they were added.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns the line for a product, if present.
    pub fn line(&self, product_id: ProductId) -> Option<&OrderLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the total quantity across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Sum of line subtotals.
    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn shipping_amount(&self) -> Money {
        self.shipping_amount
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    /// `subtotal - discount + tax + shipping`.
    pub fn final_amount(&self) -> Money {
        self.final_amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_transaction_id(&self) -> Option<&str> {
        self.payment_transaction_id.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn shipping_address(&self) -> Option<&Address> {
        self.shipping_address.as_ref()
    }

    pub fn billing_address(&self) -> Option<&Address> {
        self.billing_address.as_ref()
    }

    pub fn has_items(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Construction-time mutators, only legal while the order is pending.
impl Order {
    /// Adds a line to the order.
    pub fn add_line(&mut self, line: OrderLine) -> Result<(), OrderError> {
        self.require_pending("add line")?;

        if line.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                quantity: line.quantity,
            });
        }
        if line.unit_price.is_negative() {
            return Err(OrderError::InvalidPrice {
                price: line.unit_price.cents(),
            });
        }
        if line.discount.is_negative() || line.subtotal().is_negative() {
            return Err(OrderError::InvalidDiscount {
                discount: line.discount.cents(),
                subtotal: line.unit_price.multiply(line.quantity).cents(),
            });
        }

        self.lines.push(line);
        self.recalculate_totals();
        Ok(())
    }

    /// Removes the line for a product.
    ///
    /// Fails with [`OrderError::InvalidDiscount`] when the order-level
    /// discount would exceed the remaining subtotal.
    pub fn remove_line(&mut self, product_id: ProductId) -> Result<OrderLine, OrderError> {
        self.require_pending("remove line")?;

        let index = self
            .lines
            .iter()
            .position(|line| line.product_id == product_id)
            .ok_or(OrderError::LineNotFound { product_id })?;

        let remaining = self.subtotal - self.lines[index].subtotal();
        if self.discount_amount > remaining {
            return Err(OrderError::InvalidDiscount {
                discount: self.discount_amount.cents(),
                subtotal: remaining.cents(),
            });
        }

        let removed = self.lines.remove(index);
        self.recalculate_totals();
        Ok(removed)
    }

    /// Sets the order-level shipping, tax and discount amounts.
    pub fn set_charges(
        &mut self,
        shipping: Money,
        tax: Money,
        discount: Money,
    ) -> Result<(), OrderError> {
        self.require_pending("set charges")?;

        for (field, amount) in [("shipping", shipping), ("tax", tax), ("discount", discount)] {
            if amount.is_negative() {
                return Err(OrderError::NegativeCharge {
                    field,
                    amount: amount.cents(),
                });
            }
        }
        if discount > self.subtotal {
            return Err(OrderError::InvalidDiscount {
                discount: discount.cents(),
                subtotal: self.subtotal.cents(),
            });
        }

        self.shipping_amount = shipping;
        self.tax_amount = tax;
        self.discount_amount = discount;
        self.recalculate_totals();
        Ok(())
    }

    pub fn set_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = method;
    }

    pub fn set_shipping_address(&mut self, address: Option<Address>) {
        self.shipping_address = address;
    }

    pub fn set_billing_address(&mut self, address: Option<Address>) {
        self.billing_address = address;
    }

    /// Records the payment gateway transaction id.
    pub fn record_payment(&mut self, transaction_id: impl Into<String>) -> Result<(), OrderError> {
        self.require_pending("record payment")?;
        self.payment_transaction_id = Some(transaction_id.into());
        Ok(())
    }

    /// Called by stores when the order is first inserted.
    pub fn assign_id(&mut self, id: OrderId) {
        self.id = Some(id);
    }

    fn require_pending(&self, action: &'static str) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action,
            });
        }
        Ok(())
    }
}

// Lifecycle transitions.
impl Order {
    /// PENDING → CONFIRMED. Requires at least one line.
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if !self.status.can_confirm() {
            return Err(self.invalid("confirm"));
        }
        if !self.has_items() {
            return Err(OrderError::NoItems);
        }

        self.status = OrderStatus::Confirmed;
        self.recalculate_totals();
        Ok(())
    }

    /// CONFIRMED → PROCESSING.
    pub fn process(&mut self) -> Result<(), OrderError> {
        if !self.status.can_process() {
            return Err(self.invalid("process"));
        }

        self.status = OrderStatus::Processing;
        self.recalculate_totals();
        Ok(())
    }

    /// PROCESSING → SHIPPED, stamping the shipped time and tracking number.
    pub fn ship(&mut self, tracking_number: impl Into<String>) -> Result<(), OrderError> {
        if !self.status.can_ship() {
            return Err(self.invalid("ship"));
        }

        self.status = OrderStatus::Shipped;
        self.tracking_number = Some(tracking_number.into());
        self.shipped_at = Some(Utc::now());
        self.recalculate_totals();
        Ok(())
    }

    /// Replaces the tracking number of an order in fulfilment.
    ///
    /// Allowed while PROCESSING or SHIPPED; the status is left as is.
    pub fn assign_tracking_number(
        &mut self,
        tracking_number: impl Into<String>,
    ) -> Result<(), OrderError> {
        if !matches!(self.status, OrderStatus::Processing | OrderStatus::Shipped) {
            return Err(self.invalid("assign tracking number"));
        }

        self.tracking_number = Some(tracking_number.into());
        Ok(())
    }

    /// SHIPPED → DELIVERED, stamping the delivered time.
    pub fn deliver(&mut self) -> Result<(), OrderError> {
        if !self.status.can_deliver() {
            return Err(self.invalid("deliver"));
        }

        self.status = OrderStatus::Delivered;
        self.delivered_at = Some(Utc::now());
        self.recalculate_totals();
        Ok(())
    }

    /// Any non-terminal status → CANCELLED. The reason is appended to the notes.
    pub fn cancel(&mut self, reason: &str) -> Result<(), OrderError> {
        if !self.status.can_cancel() {
            return Err(self.invalid("cancel"));
        }

        self.status = OrderStatus::Cancelled;
        self.append_note(&format!("Cancelled: {reason}"));
        self.recalculate_totals();
        Ok(())
    }

    /// Appends an entry to the audit notes.
    pub fn append_note(&mut self, note: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{existing} | {note}"),
            None => note.to_string(),
        });
    }

    /// Recomputes subtotal and final amount from the lines and charges.
    pub fn recalculate_totals(&mut self) {
        self.subtotal = self.lines.iter().map(OrderLine::subtotal).sum();
        self.final_amount =
            self.subtotal - self.discount_amount + self.tax_amount + self.shipping_amount;
    }

    fn invalid(&self, action: &'static str) -> OrderError {
        OrderError::InvalidStateTransition {
            current_state: self.status,
            action,
        }
    }
}
