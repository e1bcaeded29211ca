//! Order aggregate and related types.

mod aggregate;
mod item;
mod status;

pub use aggregate::{Order, OrderCharges, Purchaser};
pub use item::{OrderItem, ProductSnapshot};
pub use status::{FinancialStatus, FulfillmentProgress, OrderStatus};
