//! Fulfillments: partial or complete shipment of an order's items.

use chrono::{DateTime, Utc};
use common::{FulfillmentId, OrderId, OrderItemId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Fulfillment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FulfillmentStatus {
    /// Created, not yet handed to a carrier.
    #[default]
    Pending,

    /// Handed to a carrier with tracking info.
    Shipped,

    /// Confirmed delivered.
    Delivered,

    /// Abandoned before shipping.
    Cancelled,
}

impl FulfillmentStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "PENDING",
            FulfillmentStatus::Shipped => "SHIPPED",
            FulfillmentStatus::Delivered => "DELIVERED",
            FulfillmentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::str::FromStr for FulfillmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(FulfillmentStatus::Pending),
            "SHIPPED" => Ok(FulfillmentStatus::Shipped),
            "DELIVERED" => Ok(FulfillmentStatus::Delivered),
            "CANCELLED" => Ok(FulfillmentStatus::Cancelled),
            other => Err(format!("unknown fulfillment status: {other}")),
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Carrier tracking metadata attached at ship time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

/// One shipped quantity of one order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentItem {
    pub order_item_id: OrderItemId,
    pub quantity: u32,
}

/// A partial or complete shipment of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub id: FulfillmentId,
    pub order_id: OrderId,
    pub status: FulfillmentStatus,
    pub tracking: TrackingInfo,
    pub items: Vec<FulfillmentItem>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Fulfillment {
    /// Creates a pending fulfillment over the given item quantities.
    pub fn new(order_id: OrderId, items: Vec<FulfillmentItem>) -> Result<Self> {
        if items.is_empty() || items.iter().any(|i| i.quantity == 0) {
            return Err(DomainError::validation(
                "fulfillment requires at least one item with positive quantity",
            ));
        }
        Ok(Self {
            id: FulfillmentId::new(),
            order_id,
            status: FulfillmentStatus::Pending,
            tracking: TrackingInfo::default(),
            items,
            shipped_at: None,
            delivered_at: None,
            created_at: Utc::now(),
        })
    }

    /// Marks the fulfillment shipped with tracking metadata.
    pub fn ship(&mut self, tracking: TrackingInfo) -> Result<()> {
        if self.status != FulfillmentStatus::Pending {
            return Err(DomainError::invalid_state(
                "Fulfillment",
                self.id,
                self.status,
                "ship",
            ));
        }
        self.status = FulfillmentStatus::Shipped;
        self.tracking = tracking;
        self.shipped_at = Some(Utc::now());
        Ok(())
    }

    /// Confirms delivery of a shipped fulfillment.
    pub fn mark_delivered(&mut self) -> Result<()> {
        if self.status != FulfillmentStatus::Shipped {
            return Err(DomainError::invalid_state(
                "Fulfillment",
                self.id,
                self.status,
                "mark delivered",
            ));
        }
        self.status = FulfillmentStatus::Delivered;
        self.delivered_at = Some(Utc::now());
        Ok(())
    }
}
