//! Per-location stock records.

use chrono::{DateTime, Utc};
use common::{InventoryItemId, LocationId, ProductId, VariantId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// A per product/variant/location stock record.
///
/// Invariant: `available() >= 0` at all times. Operations that would
/// violate it fail with `InsufficientStock` and leave the record unchanged,
/// never clamp silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub location_id: LocationId,
    /// Raw on-hand quantity.
    pub quantity: i64,
    /// Quantity held by active reservations.
    pub reserved_quantity: i64,
    pub low_stock_threshold: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Creates a stock record with an initial on-hand quantity.
    pub fn new(
        product_id: ProductId,
        variant_id: Option<VariantId>,
        location_id: LocationId,
        quantity: i64,
        low_stock_threshold: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InventoryItemId::new(),
            product_id,
            variant_id,
            location_id,
            quantity,
            reserved_quantity: 0,
            low_stock_threshold,
            created_at: now,
            updated_at: now,
        }
    }

    /// Available-to-sell quantity: on hand minus reserved.
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }

    /// True if available quantity is at or below the low-stock threshold.
    pub fn is_low_stock(&self) -> bool {
        self.available() <= self.low_stock_threshold
    }

    /// True if nothing is available to sell.
    pub fn is_out_of_stock(&self) -> bool {
        self.available() <= 0
    }

    /// Places a hold of `qty` units.
    ///
    /// Fails with `InsufficientStock` when fewer than `qty` units are
    /// available; the record is unchanged on failure.
    pub fn reserve(&mut self, qty: i64) -> Result<()> {
        if qty <= 0 {
            return Err(DomainError::validation("reservation quantity must be positive"));
        }
        if self.available() < qty {
            return Err(DomainError::InsufficientStock {
                item: self.describe(),
                requested: qty,
                available: self.available(),
            });
        }
        self.reserved_quantity += qty;
        self.touch();
        Ok(())
    }

    /// Releases `qty` previously reserved units back to available.
    pub fn release(&mut self, qty: i64) {
        self.reserved_quantity = (self.reserved_quantity - qty).max(0);
        self.touch();
    }

    /// Converts `qty` reserved units into a permanent stock decrease.
    ///
    /// This is the ship-time path: on-hand and reserved drop together.
    pub fn fulfill(&mut self, qty: i64) -> Result<()> {
        if qty <= 0 || qty > self.reserved_quantity {
            return Err(DomainError::InvalidQuantity {
                item: self.describe(),
                requested: qty.max(0) as u32,
                allowed: self.reserved_quantity.max(0) as u32,
            });
        }
        self.quantity -= qty;
        self.reserved_quantity -= qty;
        self.touch();
        Ok(())
    }

    /// Increases raw quantity by `qty`.
    pub fn increase(&mut self, qty: i64) {
        self.quantity += qty;
        self.touch();
    }

    /// Decreases raw quantity by `qty`.
    ///
    /// Fails with `InsufficientStock` if the decrease would drop on-hand
    /// below the already-reserved portion.
    pub fn decrease(&mut self, qty: i64) -> Result<()> {
        if self.quantity - qty < self.reserved_quantity {
            return Err(DomainError::InsufficientStock {
                item: self.describe(),
                requested: qty,
                available: self.available(),
            });
        }
        self.quantity -= qty;
        self.touch();
        Ok(())
    }

    /// Pins raw quantity to an absolute value.
    ///
    /// Fails with `InsufficientStock` if the new value is below the
    /// reserved portion.
    pub fn set_quantity(&mut self, qty: i64) -> Result<()> {
        if qty < self.reserved_quantity {
            return Err(DomainError::InsufficientStock {
                item: self.describe(),
                requested: self.quantity - qty,
                available: self.available(),
            });
        }
        self.quantity = qty;
        self.touch();
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.variant_id {
            Some(variant) => format!("{}/{}", self.product_id, variant),
            None => self.product_id.to_string(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
