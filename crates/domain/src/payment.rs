//! Payment subledger entities.

use chrono::{DateTime, Utc};
use common::{Currency, Money, OrderId, PaymentId};
use serde::{Deserialize, Serialize};

/// Payment attempt lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// Created but not yet sent to the gateway.
    #[default]
    Pending,

    /// Gateway call in flight.
    Processing,

    /// Gateway confirmed; the row is immutable from here on.
    Completed,

    /// Gateway declined or timed out; never persisted as completed.
    Failed,
}

impl PaymentStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PROCESSING" => Ok(PaymentStatus::Processing),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment attempt or refund tied to one order.
///
/// Refunds are negative-amount completed payments mirroring the payment
/// they reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    /// Signed amount: negative for refunds.
    pub amount: Money,
    pub currency: Currency,
    pub method: String,
    pub gateway: String,
    pub gateway_transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Records a gateway-confirmed payment.
    pub fn completed(
        order_id: OrderId,
        amount: Money,
        currency: Currency,
        method: impl Into<String>,
        gateway: impl Into<String>,
        gateway_transaction_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            order_id,
            amount,
            currency,
            method: method.into(),
            gateway: gateway.into(),
            gateway_transaction_id,
            status: PaymentStatus::Completed,
            processed_at: Some(now),
            created_at: now,
        }
    }

    /// Creates the negative-amount completed mirror of this payment.
    pub fn refund_of(&self) -> Payment {
        let now = Utc::now();
        Payment {
            id: PaymentId::new(),
            order_id: self.order_id,
            amount: self.amount.negate(),
            currency: self.currency.clone(),
            method: self.method.clone(),
            gateway: self.gateway.clone(),
            gateway_transaction_id: self.gateway_transaction_id.clone(),
            status: PaymentStatus::Completed,
            processed_at: Some(now),
            created_at: now,
        }
    }

    /// True if this row counts toward the order's paid sum.
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Sums the completed payments in a slice.
pub fn completed_sum(payments: &[Payment]) -> Money {
    payments
        .iter()
        .filter(|p| p.is_completed())
        .map(|p| p.amount)
        .sum()
}
