//! In-memory store implementation.
//!
//! The reference implementation used by tests. Transactions take a global
//! writer gate for their whole lifetime, then mutate a working copy of the
//! state that replaces the shared state on commit: serializable isolation
//! by construction, and dropping the unit of work discards the copy.
//! Readers go straight to the shared state and never wait on an open
//! transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    FulfillmentId, InventoryItemId, OrderId, ProductId, ReservationId, ReturnId, VariantId,
};
use domain::{
    Adjustment, Fulfillment, InventoryItem, Order, Payment, Reservation, ReservationStatus,
    Return, StockTotals,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::Result;
use crate::uow::{TransactionalStore, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: HashMap<OrderId, Order>,
    inventory: HashMap<InventoryItemId, InventoryItem>,
    reservations: HashMap<ReservationId, Reservation>,
    adjustments: Vec<Adjustment>,
    payments: Vec<Payment>,
    fulfillments: HashMap<FulfillmentId, Fulfillment>,
    returns: HashMap<ReturnId, Return>,
    sequences: HashMap<String, u32>,
}

/// In-memory transactional store for tests and examples.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    write_gate: Arc<Mutex<()>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the number of persisted reservations of any status.
    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }

    /// Returns the number of persisted adjustment records.
    pub async fn adjustment_count(&self) -> usize {
        self.state.read().await.adjustments.len()
    }
}

/// An open transaction over the in-memory store.
pub struct InMemoryUow {
    _gate: OwnedMutexGuard<()>,
    shared: Arc<RwLock<MemoryState>>,
    working: MemoryState,
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    type Uow = InMemoryUow;

    async fn begin(&self) -> Result<Self::Uow> {
        let gate = self.write_gate.clone().lock_owned().await;
        let working = self.state.read().await.clone();
        Ok(InMemoryUow {
            _gate: gate,
            shared: self.state.clone(),
            working,
        })
    }

    async fn load_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn load_inventory_item(&self, id: InventoryItemId) -> Result<Option<InventoryItem>> {
        Ok(self.state.read().await.inventory.get(&id).cloned())
    }

    async fn stock_totals(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<StockTotals> {
        let state = self.state.read().await;
        let mut totals = StockTotals::default();
        for item in state.inventory.values() {
            if &item.product_id == product_id && item.variant_id.as_ref() == variant_id {
                totals.accumulate(item);
            }
        }
        Ok(totals)
    }

    async fn low_stock_items(&self) -> Result<Vec<InventoryItem>> {
        let state = self.state.read().await;
        let mut items: Vec<_> = state
            .inventory
            .values()
            .filter(|i| i.is_low_stock())
            .cloned()
            .collect();
        items.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        Ok(items)
    }

    async fn out_of_stock_items(&self) -> Result<Vec<InventoryItem>> {
        let state = self.state.read().await;
        let mut items: Vec<_> = state
            .inventory
            .values()
            .filter(|i| i.is_out_of_stock())
            .cloned()
            .collect();
        items.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        Ok(items)
    }

    async fn adjustments_for_item(&self, id: InventoryItemId) -> Result<Vec<Adjustment>> {
        let state = self.state.read().await;
        Ok(state
            .adjustments
            .iter()
            .filter(|a| a.inventory_item_id == id)
            .cloned()
            .collect())
    }

    async fn payments_for_order(&self, id: OrderId) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| p.order_id == id)
            .cloned()
            .collect())
    }

    async fn fulfillments_for_order(&self, id: OrderId) -> Result<Vec<Fulfillment>> {
        let state = self.state.read().await;
        let mut fulfillments: Vec<_> = state
            .fulfillments
            .values()
            .filter(|f| f.order_id == id)
            .cloned()
            .collect();
        fulfillments.sort_by_key(|f| f.created_at);
        Ok(fulfillments)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUow {
    async fn commit(self) -> Result<()>
    where
        Self: Sized,
    {
        *self.shared.write().await = self.working;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn next_sequence(&mut self, day_key: &str) -> Result<u32> {
        let value = self
            .working
            .sequences
            .entry(day_key.to_string())
            .and_modify(|v| *v += 1)
            .or_insert(1);
        Ok(*value)
    }

    async fn insert_inventory_item(&mut self, item: &InventoryItem) -> Result<()> {
        self.working.inventory.insert(item.id, item.clone());
        Ok(())
    }

    async fn inventory_item(&mut self, id: InventoryItemId) -> Result<Option<InventoryItem>> {
        Ok(self.working.inventory.get(&id).cloned())
    }

    async fn inventory_items_for_product(
        &mut self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<Vec<InventoryItem>> {
        let mut items: Vec<_> = self
            .working
            .inventory
            .values()
            .filter(|i| &i.product_id == product_id && i.variant_id.as_ref() == variant_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.location_id.cmp(&b.location_id));
        Ok(items)
    }

    async fn update_inventory_item(&mut self, item: &InventoryItem) -> Result<()> {
        self.working.inventory.insert(item.id, item.clone());
        Ok(())
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn reservation(&mut self, id: ReservationId) -> Result<Option<Reservation>> {
        Ok(self.working.reservations.get(&id).cloned())
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn active_reservations_for_reference(
        &mut self,
        reference: &str,
    ) -> Result<Vec<Reservation>> {
        let mut reservations: Vec<_> = self
            .working
            .reservations
            .values()
            .filter(|r| r.reference == reference && r.status == ReservationStatus::Active)
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.created_at);
        Ok(reservations)
    }

    async fn expired_reservations(&mut self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let mut reservations: Vec<_> = self
            .working
            .reservations
            .values()
            .filter(|r| r.is_expired(now))
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.created_at);
        Ok(reservations)
    }

    async fn insert_adjustment(&mut self, adjustment: &Adjustment) -> Result<()> {
        self.working.adjustments.push(adjustment.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>> {
        Ok(self
            .working
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_fulfillment(&mut self, fulfillment: &Fulfillment) -> Result<()> {
        self.working
            .fulfillments
            .insert(fulfillment.id, fulfillment.clone());
        Ok(())
    }

    async fn fulfillment(&mut self, id: FulfillmentId) -> Result<Option<Fulfillment>> {
        Ok(self.working.fulfillments.get(&id).cloned())
    }

    async fn update_fulfillment(&mut self, fulfillment: &Fulfillment) -> Result<()> {
        self.working
            .fulfillments
            .insert(fulfillment.id, fulfillment.clone());
        Ok(())
    }

    async fn insert_return(&mut self, ret: &Return) -> Result<()> {
        self.working.returns.insert(ret.id, ret.clone());
        Ok(())
    }

    async fn return_request(&mut self, id: ReturnId) -> Result<Option<Return>> {
        Ok(self.working.returns.get(&id).cloned())
    }

    async fn update_return(&mut self, ret: &Return) -> Result<()> {
        self.working.returns.insert(ret.id, ret.clone());
        Ok(())
    }
}
