//! Shared value types for the order-and-inventory engine.
//!
//! Provides strongly typed UUID identifiers for every persisted entity,
//! string-typed catalog references (SKU-style), and an integer-cents
//! `Money` type with its `Currency` code.

pub mod ids;
pub mod money;

pub use ids::{
    AdjustmentId, CustomerId, FulfillmentId, InventoryItemId, LocationId, OrderId, OrderItemId,
    PaymentId, ProductId, ReservationId, ReturnId, VariantId,
};
pub use money::{Currency, Money};
