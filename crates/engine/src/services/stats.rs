//! Customer statistics updater trait and in-memory implementation.
//!
//! Invoked fire-and-forget after order creation; failure never affects the
//! committed order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CustomerId, Money};

use crate::error::ServiceError;

/// Trait for the customer statistics updater.
#[async_trait]
pub trait CustomerStats: Send + Sync {
    /// Records that a customer placed an order with the given total.
    async fn order_placed(&self, customer_id: CustomerId, total: Money)
    -> Result<(), ServiceError>;
}

/// In-memory statistics sink for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerStats {
    totals: Arc<RwLock<HashMap<CustomerId, (u32, Money)>>>,
}

impl InMemoryCustomerStats {
    /// Creates a new empty statistics sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(order_count, total_spent)` for a customer.
    pub fn stats_for(&self, customer_id: CustomerId) -> Option<(u32, Money)> {
        self.totals.read().unwrap().get(&customer_id).copied()
    }
}

#[async_trait]
impl CustomerStats for InMemoryCustomerStats {
    async fn order_placed(
        &self,
        customer_id: CustomerId,
        total: Money,
    ) -> Result<(), ServiceError> {
        let mut totals = self.totals.write().unwrap();
        let entry = totals.entry(customer_id).or_insert((0, Money::zero()));
        entry.0 += 1;
        entry.1 += total;
        Ok(())
    }
}
