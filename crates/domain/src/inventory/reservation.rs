//! Inventory reservations: temporary holds against a stock record.

use chrono::{DateTime, Utc};
use common::{InventoryItemId, ReservationId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Reservation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReservationStatus {
    /// Hold is in effect, reducing available-to-sell quantity.
    #[default]
    Active,

    /// Hold was released; units are available again.
    Released,

    /// Hold was converted into a permanent stock decrease at ship time.
    Fulfilled,
}

impl ReservationStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "ACTIVE",
            ReservationStatus::Released => "RELEASED",
            ReservationStatus::Fulfilled => "FULFILLED",
        }
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ReservationStatus::Active),
            "RELEASED" => Ok(ReservationStatus::Released),
            "FULFILLED" => Ok(ReservationStatus::Fulfilled),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hold against an inventory item tied to a reference (typically an
/// order number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub inventory_item_id: InventoryItemId,
    pub quantity: i64,
    pub reason: String,
    /// The triggering entity, usually an order number.
    pub reference: String,
    pub status: ReservationStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Creates an active reservation.
    pub fn new(
        inventory_item_id: InventoryItemId,
        quantity: i64,
        reason: impl Into<String>,
        reference: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            inventory_item_id,
            quantity,
            reason: reason.into(),
            reference: reference.into(),
            status: ReservationStatus::Active,
            expires_at,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    /// True while the hold is in effect.
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// True if the reservation carries an expiry that has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at.is_some_and(|at| at <= now)
    }

    /// Marks the reservation released.
    ///
    /// Releasing twice fails with `InvalidState` and changes nothing the
    /// second time.
    pub fn release(&mut self) -> Result<()> {
        if !self.is_active() {
            return Err(DomainError::invalid_state(
                "Reservation",
                self.id,
                self.status,
                "release",
            ));
        }
        self.status = ReservationStatus::Released;
        self.closed_at = Some(Utc::now());
        Ok(())
    }

    /// Marks the reservation fulfilled.
    ///
    /// Only active holds can be fulfilled; a released or already-fulfilled
    /// reservation fails with `InvalidState`.
    pub fn fulfill(&mut self) -> Result<()> {
        if !self.is_active() {
            return Err(DomainError::invalid_state(
                "Reservation",
                self.id,
                self.status,
                "fulfill",
            ));
        }
        self.status = ReservationStatus::Fulfilled;
        self.closed_at = Some(Utc::now());
        Ok(())
    }
}
