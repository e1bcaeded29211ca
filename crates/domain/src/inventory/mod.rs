//! Inventory ledger types: stock records, reservations, adjustments.

mod adjustment;
mod item;
mod reservation;

pub use adjustment::{Adjustment, AdjustmentType};
pub use item::InventoryItem;
pub use reservation::{Reservation, ReservationStatus};

use serde::{Deserialize, Serialize};

/// Stock totals for a product/variant aggregated across locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTotals {
    pub available: i64,
    pub reserved: i64,
    pub on_hand: i64,
}

impl StockTotals {
    /// Accumulates one stock record into the totals.
    pub fn accumulate(&mut self, item: &InventoryItem) {
        self.available += item.available();
        self.reserved += item.reserved_quantity;
        self.on_hand += item.quantity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{LocationId, ProductId};

    #[test]
    fn test_totals_aggregate_across_locations() {
        let mut east = InventoryItem::new(
            ProductId::new("SKU-001"),
            None,
            LocationId::new("WH-EAST"),
            10,
            2,
        );
        east.reserve(3).unwrap();
        let west = InventoryItem::new(
            ProductId::new("SKU-001"),
            None,
            LocationId::new("WH-WEST"),
            5,
            2,
        );

        let mut totals = StockTotals::default();
        totals.accumulate(&east);
        totals.accumulate(&west);

        assert_eq!(totals.on_hand, 15);
        assert_eq!(totals.reserved, 3);
        assert_eq!(totals.available, 12);
    }
}
