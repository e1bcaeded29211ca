//! Payment gateway trait and in-memory implementation.

use std::sync::{
    Arc, RwLock,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use common::{Currency, Money, OrderId};

use crate::error::ServiceError;

/// Result of a successful gateway charge.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    /// The transaction id assigned by the gateway.
    pub transaction_id: String,
}

/// Trait for the external payment gateway.
///
/// The engine wraps every call in its own timeout; implementations do not
/// need to bound their own latency.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges `amount` against the order's payment method.
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
        currency: &Currency,
        method: &str,
    ) -> Result<GatewayCharge, ServiceError>;
}

#[derive(Debug, Default)]
struct GatewayState {
    fail_on_charge: bool,
    delay: Option<Duration>,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<GatewayState>>,
    charges: Arc<AtomicUsize>,
}

impl InMemoryGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline the next charge calls.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().unwrap().fail_on_charge = fail;
    }

    /// Configures an artificial delay before each charge responds.
    pub fn set_delay(&self, delay: Duration) {
        self.state.write().unwrap().delay = Some(delay);
    }

    /// Returns the number of successful charges.
    pub fn charge_count(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn charge(
        &self,
        _order_id: OrderId,
        amount: Money,
        _currency: &Currency,
        _method: &str,
    ) -> Result<GatewayCharge, ServiceError> {
        let (fail, delay) = {
            let state = self.state.read().unwrap();
            (state.fail_on_charge, state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            return Err(ServiceError::new("card declined"));
        }
        if !amount.is_positive() {
            return Err(ServiceError::new("charge amount must be positive"));
        }

        let n = self.charges.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayCharge {
            transaction_id: format!("TXN-{n:06}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_charge_succeeds_with_transaction_id() {
        let gateway = InMemoryGateway::new();
        let charge = gateway
            .charge(OrderId::new(), Money::from_cents(1000), &Currency::usd(), "card")
            .await
            .unwrap();
        assert!(charge.transaction_id.starts_with("TXN-"));
        assert_eq!(gateway.charge_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_toggle_declines() {
        let gateway = InMemoryGateway::new();
        gateway.set_fail_on_charge(true);

        let result = gateway
            .charge(OrderId::new(), Money::from_cents(1000), &Currency::usd(), "card")
            .await;
        assert!(result.is_err());
        assert_eq!(gateway.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let gateway = InMemoryGateway::new();
        let result = gateway
            .charge(OrderId::new(), Money::zero(), &Currency::usd(), "card")
            .await;
        assert!(result.is_err());
    }
}
