//! The order aggregate.

use chrono::{DateTime, Utc};
use common::{Currency, CustomerId, Money, OrderId, OrderItemId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

use super::{FinancialStatus, FulfillmentProgress, OrderItem, OrderStatus};

/// Who placed the order: a known customer or a guest contact.
///
/// At least one of `customer_id` and `guest_email` must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchaser {
    pub customer_id: Option<CustomerId>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
}

impl Purchaser {
    /// A purchaser identified by customer id.
    pub fn customer(id: CustomerId) -> Self {
        Self {
            customer_id: Some(id),
            ..Self::default()
        }
    }

    /// A guest purchaser identified by email.
    pub fn guest(email: impl Into<String>) -> Self {
        Self {
            guest_email: Some(email.into()),
            ..Self::default()
        }
    }
}

/// Non-item charge components of an order total.
///
/// Tax, shipping, and discount calculation is pluggable; these are the
/// already-computed amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCharges {
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
}

/// Order aggregate root.
///
/// Owns line items, computed totals, and the three status dimensions.
/// Orders are never physically deleted; cancellation is a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Date-prefixed sequential number, e.g. `ORD-20260825-0001`.
    pub order_number: String,
    pub purchaser: Purchaser,
    pub status: OrderStatus,
    pub financial_status: FinancialStatus,
    pub fulfillment_progress: FulfillmentProgress,
    pub currency: Currency,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Creates an order from already-built line items and charges.
    ///
    /// Validates purchaser presence and that the order has at least one
    /// item; the total is computed as `subtotal + tax + shipping - discount`.
    pub fn create(
        id: OrderId,
        order_number: String,
        purchaser: Purchaser,
        currency: Currency,
        items: Vec<OrderItem>,
        charges: OrderCharges,
    ) -> Result<Self> {
        if purchaser.customer_id.is_none() && purchaser.guest_email.is_none() {
            return Err(DomainError::validation(
                "order requires a customer id or a guest email",
            ));
        }
        if items.is_empty() {
            return Err(DomainError::validation("order requires at least one item"));
        }

        let subtotal: Money = items.iter().map(|i| i.total_price).sum();
        let total = subtotal + charges.tax + charges.shipping - charges.discount;
        let now = Utc::now();

        Ok(Self {
            id,
            order_number,
            purchaser,
            status: OrderStatus::Pending,
            financial_status: FinancialStatus::Pending,
            fulfillment_progress: FulfillmentProgress::Unfulfilled,
            currency,
            subtotal,
            tax: charges.tax,
            shipping: charges.shipping,
            discount: charges.discount,
            total,
            shipping_address: None,
            billing_address: None,
            tags: Vec::new(),
            notes: None,
            items,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        })
    }

    /// Returns a line item by id.
    pub fn item(&self, item_id: OrderItemId) -> Result<&OrderItem> {
        self.items
            .iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| DomainError::not_found("OrderItem", item_id))
    }

    /// Returns a mutable line item by id.
    pub fn item_mut(&mut self, item_id: OrderItemId) -> Result<&mut OrderItem> {
        self.items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| DomainError::not_found("OrderItem", item_id))
    }

    /// Total ordered quantity across all line items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Moves the order to `next`, rejecting illegal transitions.
    ///
    /// Transitions follow the state machine table rather than trusting the
    /// caller; an illegal pair fails with `InvalidState`.
    pub fn transition_status(&mut self, next: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_state(
                "Order",
                self.id,
                self.status,
                next.as_str_action(),
            ));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Cancels the order, appending the reason to its notes.
    ///
    /// Fails with `InvalidState` once the order has shipped or delivered.
    pub fn cancel(&mut self, reason: &str) -> Result<()> {
        if !self.status.can_cancel() {
            return Err(DomainError::invalid_state(
                "Order",
                self.id,
                self.status,
                "cancel",
            ));
        }
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
        self.append_note(&format!("Cancelled: {reason}"));
        self.touch();
        Ok(())
    }

    /// Replaces the financial status with a freshly derived one.
    pub fn set_financial_status(&mut self, status: FinancialStatus) {
        self.financial_status = status;
        self.touch();
    }

    /// Recomputes fulfillment progress from line item quantities.
    pub fn refresh_fulfillment_progress(&mut self) {
        let ordered = self.total_quantity();
        let fulfilled: u32 = self.items.iter().map(|i| i.quantity_fulfilled).sum();
        self.fulfillment_progress = FulfillmentProgress::derive(ordered, fulfilled);
        self.touch();
    }

    /// Appends a line to the order's free-form notes.
    pub fn append_note(&mut self, note: &str) {
        match &mut self.notes {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(note);
            }
            None => self.notes = Some(note.to_string()),
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl OrderStatus {
    /// The action name used in `InvalidState` messages for a transition
    /// into this status.
    fn as_str_action(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "move to pending",
            OrderStatus::Confirmed => "confirm",
            OrderStatus::Processing => "start processing",
            OrderStatus::Shipped => "mark shipped",
            OrderStatus::Delivered => "mark delivered",
            OrderStatus::Cancelled => "cancel",
            OrderStatus::Refunded => "mark refunded",
        }
    }
}
