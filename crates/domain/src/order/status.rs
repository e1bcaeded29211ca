//! Order status machines.

use common::Money;
use serde::{Deserialize, Serialize};

/// Top-level order lifecycle status.
///
/// Transitions:
/// ```text
/// Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered ──► Refunded
///    │            │              │                          │
///    └────────────┴──────────────┴──► Cancelled ────────────┴──► Refunded
/// ```
/// `Cancelled` is reachable from any non-shipped, non-terminal state;
/// `Refunded` only after `Cancelled` or `Delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order placed, awaiting confirmation.
    #[default]
    Pending,

    /// Order accepted.
    Confirmed,

    /// Order is being prepared.
    Processing,

    /// At least one fulfillment has shipped.
    Shipped,

    /// All goods delivered.
    Delivered,

    /// Order was cancelled before shipping (terminal for fulfillment).
    Cancelled,

    /// A completed payment was reversed after cancellation or delivery.
    Refunded,
}

impl OrderStatus {
    /// Returns true if `self -> next` is a legal transition.
    ///
    /// Writing the same status again is always allowed (idempotent update).
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        if *self == next {
            return true;
        }

        matches!(
            (*self, next),
            (Pending, Confirmed)
                | (Confirmed, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Processing, Cancelled)
                | (Cancelled, Refunded)
                | (Delivered, Refunded)
        )
    }

    /// Returns true if the order may still be cancelled.
    ///
    /// Shipped and delivered orders are cancellation-terminal: goods have
    /// left the building and only the return path applies.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Refunded)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REFUNDED" => Ok(OrderStatus::Refunded),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment-completeness state, derived from summed completed payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FinancialStatus {
    /// Nothing paid yet.
    #[default]
    Pending,

    /// Completed payments cover part of the total.
    PartiallyPaid,

    /// Completed payments cover the total (or more).
    Paid,

    /// Completed payments were reversed.
    Refunded,
}

impl FinancialStatus {
    /// Derives the status from the sum of completed payments and the
    /// order total.
    pub fn derive(paid: Money, total: Money) -> Self {
        if paid.is_zero() || paid.is_negative() {
            FinancialStatus::Pending
        } else if paid.cents() < total.cents() {
            FinancialStatus::PartiallyPaid
        } else {
            FinancialStatus::Paid
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FinancialStatus::Pending => "PENDING",
            FinancialStatus::PartiallyPaid => "PARTIALLY_PAID",
            FinancialStatus::Paid => "PAID",
            FinancialStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::str::FromStr for FinancialStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(FinancialStatus::Pending),
            "PARTIALLY_PAID" => Ok(FinancialStatus::PartiallyPaid),
            "PAID" => Ok(FinancialStatus::Paid),
            "REFUNDED" => Ok(FinancialStatus::Refunded),
            other => Err(format!("unknown financial status: {other}")),
        }
    }
}

impl std::fmt::Display for FinancialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shipment-completeness state, derived from line item quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FulfillmentProgress {
    /// No items shipped.
    #[default]
    Unfulfilled,

    /// Some but not all items shipped.
    PartiallyFulfilled,

    /// Every ordered unit shipped.
    Fulfilled,
}

impl FulfillmentProgress {
    /// Derives progress from total ordered and total fulfilled quantities.
    pub fn derive(ordered: u32, fulfilled: u32) -> Self {
        if fulfilled == 0 {
            FulfillmentProgress::Unfulfilled
        } else if fulfilled < ordered {
            FulfillmentProgress::PartiallyFulfilled
        } else {
            FulfillmentProgress::Fulfilled
        }
    }

    /// Returns the progress name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentProgress::Unfulfilled => "UNFULFILLED",
            FulfillmentProgress::PartiallyFulfilled => "PARTIALLY_FULFILLED",
            FulfillmentProgress::Fulfilled => "FULFILLED",
        }
    }
}

impl std::str::FromStr for FulfillmentProgress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNFULFILLED" => Ok(FulfillmentProgress::Unfulfilled),
            "PARTIALLY_FULFILLED" => Ok(FulfillmentProgress::PartiallyFulfilled),
            "FULFILLED" => Ok(FulfillmentProgress::Fulfilled),
            other => Err(format!("unknown fulfillment progress: {other}")),
        }
    }
}

impl std::fmt::Display for FulfillmentProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_same_status_is_allowed() {
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Processing));
    }

    #[test]
    fn test_cancellation_reachability() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Confirmed.can_cancel());
        assert!(OrderStatus::Processing.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_refunded_only_after_cancel_or_delivery() {
        assert!(OrderStatus::Cancelled.can_transition_to(OrderStatus::Refunded));
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn test_financial_status_derivation() {
        let total = Money::from_cents(10_000);
        assert_eq!(
            FinancialStatus::derive(Money::zero(), total),
            FinancialStatus::Pending
        );
        assert_eq!(
            FinancialStatus::derive(Money::from_cents(5_000), total),
            FinancialStatus::PartiallyPaid
        );
        assert_eq!(
            FinancialStatus::derive(Money::from_cents(10_000), total),
            FinancialStatus::Paid
        );
        assert_eq!(
            FinancialStatus::derive(Money::from_cents(12_000), total),
            FinancialStatus::Paid
        );
    }

    #[test]
    fn test_fulfillment_progress_derivation() {
        assert_eq!(
            FulfillmentProgress::derive(5, 0),
            FulfillmentProgress::Unfulfilled
        );
        assert_eq!(
            FulfillmentProgress::derive(5, 2),
            FulfillmentProgress::PartiallyFulfilled
        );
        assert_eq!(
            FulfillmentProgress::derive(5, 5),
            FulfillmentProgress::Fulfilled
        );
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }
}
