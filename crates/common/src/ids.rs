//! Typed identifiers.
//!
//! UUID-backed newtypes prevent mixing up entity identifiers across the
//! engine (an order id is not a payment id). Catalog references (product,
//! variant, location) are string-typed because they come from an external
//! catalog and are usually SKU-like codes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

macro_rules! ref_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new reference from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the reference as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an order.
    OrderId
}

uuid_id! {
    /// Unique identifier for a line item within an order.
    OrderItemId
}

uuid_id! {
    /// Unique identifier for a per-location stock record.
    InventoryItemId
}

uuid_id! {
    /// Unique identifier for an inventory reservation.
    ReservationId
}

uuid_id! {
    /// Unique identifier for an immutable stock adjustment record.
    AdjustmentId
}

uuid_id! {
    /// Unique identifier for a payment attempt or refund.
    PaymentId
}

uuid_id! {
    /// Unique identifier for a fulfillment (shipment).
    FulfillmentId
}

uuid_id! {
    /// Unique identifier for a return request.
    ReturnId
}

uuid_id! {
    /// Unique identifier for a customer.
    CustomerId
}

ref_id! {
    /// Catalog product reference (SKU-like code).
    ProductId
}

ref_id! {
    /// Catalog variant reference.
    VariantId
}

ref_id! {
    /// Stock location reference (warehouse code).
    LocationId
}
