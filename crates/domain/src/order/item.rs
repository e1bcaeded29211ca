//! Order line items and catalog snapshots.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, ProductId, VariantId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// A frozen copy of catalog data captured at order time.
///
/// Later catalog edits never alter historical orders; the snapshot is what
/// the customer actually bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub name: String,
    pub sku: String,
    pub price: Money,
    /// True if the catalog tracks stock for this product; untracked
    /// products never create reservations.
    pub tracks_inventory: bool,
}

/// A line item belonging to exactly one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    pub snapshot: ProductSnapshot,
    pub quantity_fulfilled: u32,
    pub quantity_returned: u32,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Creates a line item from a snapshot, quantity, and resolved price.
    pub fn new(order_id: OrderId, snapshot: ProductSnapshot, quantity: u32, unit_price: Money) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            product_id: snapshot.product_id.clone(),
            variant_id: snapshot.variant_id.clone(),
            quantity,
            unit_price,
            total_price: unit_price.multiply(quantity),
            snapshot,
            quantity_fulfilled: 0,
            quantity_returned: 0,
            created_at: Utc::now(),
        }
    }

    /// Quantity not yet covered by a fulfillment.
    pub fn remaining_fulfillable(&self) -> u32 {
        self.quantity - self.quantity_fulfilled
    }

    /// Quantity eligible for return: fulfilled minus already returned.
    pub fn returnable(&self) -> u32 {
        self.quantity_fulfilled - self.quantity_returned
    }

    /// Records `qty` units as fulfilled.
    ///
    /// Fails with `InvalidQuantity` if the fulfillment would exceed the
    /// ordered quantity; state is unchanged on failure.
    pub fn record_fulfilled(&mut self, qty: u32) -> Result<()> {
        if qty == 0 || qty > self.remaining_fulfillable() {
            return Err(DomainError::InvalidQuantity {
                item: self.product_id.to_string(),
                requested: qty,
                allowed: self.remaining_fulfillable(),
            });
        }
        self.quantity_fulfilled += qty;
        Ok(())
    }

    /// Records `qty` units as returned.
    ///
    /// Fails with `InvalidQuantity` if the return would exceed the
    /// fulfilled-minus-returned allowance; state is unchanged on failure.
    pub fn record_returned(&mut self, qty: u32) -> Result<()> {
        if qty == 0 || qty > self.returnable() {
            return Err(DomainError::InvalidQuantity {
                item: self.product_id.to_string(),
                requested: qty,
                allowed: self.returnable(),
            });
        }
        self.quantity_returned += qty;
        Ok(())
    }
}
