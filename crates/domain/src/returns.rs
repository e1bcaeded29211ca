//! Return requests against fulfilled order items.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, ReturnId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Return request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReturnStatus {
    /// Submitted, awaiting a decision.
    #[default]
    Requested,

    /// Accepted; refund amount recorded.
    Approved,

    /// Declined.
    Rejected,
}

impl ReturnStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Requested => "REQUESTED",
            ReturnStatus::Approved => "APPROVED",
            ReturnStatus::Rejected => "REJECTED",
        }
    }
}

impl std::str::FromStr for ReturnStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "REQUESTED" => Ok(ReturnStatus::Requested),
            "APPROVED" => Ok(ReturnStatus::Approved),
            "REJECTED" => Ok(ReturnStatus::Rejected),
            other => Err(format!("unknown return status: {other}")),
        }
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One returned quantity of one order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub order_item_id: OrderItemId,
    pub quantity: u32,
    /// Condition reported on receipt (e.g. "unopened", "damaged").
    pub condition: Option<String>,
}

/// A return request belonging to one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Return {
    pub id: ReturnId,
    pub order_id: OrderId,
    /// Date-prefixed sequential number, same scheme as orders.
    pub return_number: String,
    pub status: ReturnStatus,
    pub reason: String,
    pub refund_amount: Option<Money>,
    pub items: Vec<ReturnItem>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Return {
    /// Creates a requested return.
    pub fn new(
        order_id: OrderId,
        return_number: String,
        reason: impl Into<String>,
        items: Vec<ReturnItem>,
    ) -> Result<Self> {
        if items.is_empty() || items.iter().any(|i| i.quantity == 0) {
            return Err(DomainError::validation(
                "return requires at least one item with positive quantity",
            ));
        }
        Ok(Self {
            id: ReturnId::new(),
            order_id,
            return_number,
            status: ReturnStatus::Requested,
            reason: reason.into(),
            refund_amount: None,
            items,
            processed_at: None,
            created_at: Utc::now(),
        })
    }

    /// Approves the return, recording the refund amount.
    ///
    /// Approval records intent only; moving money or stock is the
    /// coordinator's approval hook, not this entity.
    pub fn approve(&mut self, refund_amount: Option<Money>) -> Result<()> {
        self.decide(ReturnStatus::Approved, "approve")?;
        self.refund_amount = refund_amount;
        Ok(())
    }

    /// Rejects the return.
    pub fn reject(&mut self) -> Result<()> {
        self.decide(ReturnStatus::Rejected, "reject")
    }

    fn decide(&mut self, next: ReturnStatus, action: &'static str) -> Result<()> {
        if self.status != ReturnStatus::Requested {
            return Err(DomainError::invalid_state(
                "Return",
                self.id,
                self.status,
                action,
            ));
        }
        self.status = next;
        self.processed_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Return {
        Return::new(
            OrderId::new(),
            "RET-20260825-0001".to_string(),
            "damaged in transit",
            vec![ReturnItem {
                order_item_id: OrderItemId::new(),
                quantity: 1,
                condition: Some("damaged".to_string()),
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_new_return_is_requested() {
        let r = request();
        assert_eq!(r.status, ReturnStatus::Requested);
        assert!(r.processed_at.is_none());
    }

    #[test]
    fn test_empty_return_rejected() {
        assert!(Return::new(OrderId::new(), "RET-1".to_string(), "x", vec![]).is_err());
    }

    #[test]
    fn test_approve_records_refund_amount() {
        let mut r = request();
        r.approve(Some(Money::from_cents(1500))).unwrap();

        assert_eq!(r.status, ReturnStatus::Approved);
        assert_eq!(r.refund_amount, Some(Money::from_cents(1500)));
        assert!(r.processed_at.is_some());
    }

    #[test]
    fn test_double_decision_fails() {
        let mut r = request();
        r.reject().unwrap();

        assert!(r.approve(None).is_err());
        assert!(r.reject().is_err());
        assert_eq!(r.status, ReturnStatus::Rejected);
    }
}
