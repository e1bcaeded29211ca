//! The transactional store boundary.
//!
//! Every multi-entity mutation in the engine runs inside exactly one
//! [`UnitOfWork`]: either everything commits or nothing does, and partial
//! writes are never observable. Implementations must serialize access to
//! contended rows (inventory records, per-day number sequences) so that
//! concurrent transactions cannot both pass the same availability check or
//! draw the same sequence value.
//!
//! Read-only reporting queries live on [`TransactionalStore`] directly,
//! outside any unit of work, and must never block writers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{FulfillmentId, InventoryItemId, OrderId, ProductId, ReservationId, ReturnId, VariantId};
use domain::{
    Adjustment, Fulfillment, InventoryItem, Order, Payment, Reservation, Return, StockTotals,
};

use crate::error::Result;

/// A store capable of atomic multi-statement transactions.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    /// The unit-of-work type produced by [`begin`](Self::begin).
    type Uow: UnitOfWork;

    /// Opens a new atomic unit of work.
    async fn begin(&self) -> Result<Self::Uow>;

    /// Loads an order with its items, outside any transaction.
    async fn load_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads a stock record, outside any transaction.
    async fn load_inventory_item(&self, id: InventoryItemId) -> Result<Option<InventoryItem>>;

    /// Aggregates stock totals for a product/variant across locations.
    async fn stock_totals(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<StockTotals>;

    /// Stock records at or below their low-stock threshold.
    async fn low_stock_items(&self) -> Result<Vec<InventoryItem>>;

    /// Stock records with nothing available to sell.
    async fn out_of_stock_items(&self) -> Result<Vec<InventoryItem>>;

    /// Adjustment history for a stock record, oldest first.
    async fn adjustments_for_item(&self, id: InventoryItemId) -> Result<Vec<Adjustment>>;

    /// All payments recorded against an order, oldest first.
    async fn payments_for_order(&self, id: OrderId) -> Result<Vec<Payment>>;

    /// All fulfillments for an order, oldest first.
    async fn fulfillments_for_order(&self, id: OrderId) -> Result<Vec<Fulfillment>>;
}

/// One atomic transaction against the store.
///
/// Dropping a unit of work without calling [`commit`](Self::commit) rolls
/// back every mutation made through it.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Commits all mutations made through this unit of work.
    async fn commit(self) -> Result<()>
    where
        Self: Sized;

    // Orders

    /// Persists a new order and its line items.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Rewrites an order and its line item counters.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Loads an order with its items for update.
    async fn order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Draws the next value of the per-day document number sequence for
    /// `day_key` (e.g. `ORD-20260825`).
    ///
    /// The first call for a key returns 1. Implementations serialize this
    /// per key so concurrent transactions never draw the same value.
    async fn next_sequence(&mut self, day_key: &str) -> Result<u32>;

    // Inventory

    /// Persists a new stock record.
    async fn insert_inventory_item(&mut self, item: &InventoryItem) -> Result<()>;

    /// Loads a stock record for update, locking it against concurrent
    /// transactions.
    async fn inventory_item(&mut self, id: InventoryItemId) -> Result<Option<InventoryItem>>;

    /// Loads and locks all stock records for a product/variant, ordered
    /// by location.
    async fn inventory_items_for_product(
        &mut self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<Vec<InventoryItem>>;

    /// Rewrites a stock record's quantities.
    async fn update_inventory_item(&mut self, item: &InventoryItem) -> Result<()>;

    /// Persists a new reservation.
    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()>;

    /// Loads a reservation for update.
    async fn reservation(&mut self, id: ReservationId) -> Result<Option<Reservation>>;

    /// Rewrites a reservation's lifecycle fields.
    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<()>;

    /// Active reservations tied to a reference (typically an order number).
    async fn active_reservations_for_reference(
        &mut self,
        reference: &str,
    ) -> Result<Vec<Reservation>>;

    /// Active reservations whose expiry has passed as of `now`.
    async fn expired_reservations(&mut self, now: DateTime<Utc>) -> Result<Vec<Reservation>>;

    /// Appends an immutable adjustment record.
    async fn insert_adjustment(&mut self, adjustment: &Adjustment) -> Result<()>;

    // Payments

    /// Appends a payment row.
    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    /// All payments for an order, oldest first.
    async fn payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>>;

    // Fulfillments

    /// Persists a new fulfillment and its items.
    async fn insert_fulfillment(&mut self, fulfillment: &Fulfillment) -> Result<()>;

    /// Loads a fulfillment with its items for update.
    async fn fulfillment(&mut self, id: FulfillmentId) -> Result<Option<Fulfillment>>;

    /// Rewrites a fulfillment's status and tracking fields.
    async fn update_fulfillment(&mut self, fulfillment: &Fulfillment) -> Result<()>;

    // Returns

    /// Persists a new return request and its items.
    async fn insert_return(&mut self, ret: &Return) -> Result<()>;

    /// Loads a return request with its items for update.
    async fn return_request(&mut self, id: ReturnId) -> Result<Option<Return>>;

    /// Rewrites a return's decision fields.
    async fn update_return(&mut self, ret: &Return) -> Result<()>;
}
