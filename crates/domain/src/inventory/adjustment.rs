//! Immutable stock adjustment records.

use chrono::{DateTime, Utc};
use common::{AdjustmentId, InventoryItemId};
use serde::{Deserialize, Serialize};

/// The kind of raw stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentType {
    /// Raw quantity increased by the delta.
    Increase,

    /// Raw quantity decreased by the delta.
    Decrease,

    /// Raw quantity pinned to an absolute value.
    Set,
}

impl AdjustmentType {
    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentType::Increase => "INCREASE",
            AdjustmentType::Decrease => "DECREASE",
            AdjustmentType::Set => "SET",
        }
    }
}

impl std::str::FromStr for AdjustmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCREASE" => Ok(AdjustmentType::Increase),
            "DECREASE" => Ok(AdjustmentType::Decrease),
            "SET" => Ok(AdjustmentType::Set),
            other => Err(format!("unknown adjustment type: {other}")),
        }
    }
}

impl std::fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An audit record of a stock change. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub id: AdjustmentId,
    pub inventory_item_id: InventoryItemId,
    pub adjustment_type: AdjustmentType,
    /// The requested change: a delta for increase/decrease, the absolute
    /// target for set.
    pub quantity: i64,
    pub reason: String,
    /// Optional reference to the triggering entity (order number,
    /// fulfillment id, manual correction ticket).
    pub reference: Option<String>,
    pub actor: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Adjustment {
    /// Records a stock change.
    pub fn new(
        inventory_item_id: InventoryItemId,
        adjustment_type: AdjustmentType,
        quantity: i64,
        reason: impl Into<String>,
        reference: Option<String>,
        actor: Option<String>,
    ) -> Self {
        Self {
            id: AdjustmentId::new(),
            inventory_item_id,
            adjustment_type,
            quantity,
            reason: reason.into(),
            reference,
            actor,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustment_type_roundtrip() {
        for t in [
            AdjustmentType::Increase,
            AdjustmentType::Decrease,
            AdjustmentType::Set,
        ] {
            assert_eq!(t.as_str().parse::<AdjustmentType>().unwrap(), t);
        }
    }

    #[test]
    fn test_adjustment_captures_context() {
        let item_id = InventoryItemId::new();
        let adj = Adjustment::new(
            item_id,
            AdjustmentType::Decrease,
            3,
            "shipment",
            Some("FUL-123".to_string()),
            Some("ops@example.com".to_string()),
        );

        assert_eq!(adj.inventory_item_id, item_id);
        assert_eq!(adj.quantity, 3);
        assert_eq!(adj.reference.as_deref(), Some("FUL-123"));
        assert_eq!(adj.actor.as_deref(), Some("ops@example.com"));
    }
}
