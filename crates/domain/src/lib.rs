//! Entity and invariant layer for the order-and-inventory engine.
//!
//! Pure domain logic with no I/O: the order aggregate and its status
//! machines, the inventory ledger records (stock, reservations,
//! adjustments), payments, fulfillments, and returns. Every consistency
//! rule the engine guarantees is enforced here with typed errors; the
//! coordinator in the `engine` crate only sequences these operations
//! inside one unit of work.

pub mod error;
pub mod fulfillment;
pub mod inventory;
pub mod number;
pub mod order;
pub mod payment;
pub mod returns;

pub use error::DomainError;
pub use fulfillment::{Fulfillment, FulfillmentItem, FulfillmentStatus, TrackingInfo};
pub use inventory::{
    Adjustment, AdjustmentType, InventoryItem, Reservation, ReservationStatus, StockTotals,
};
pub use order::{
    FinancialStatus, FulfillmentProgress, Order, OrderCharges, OrderItem, OrderStatus,
    ProductSnapshot, Purchaser,
};
pub use payment::{Payment, PaymentStatus, completed_sum};
pub use returns::{Return, ReturnItem, ReturnStatus};
