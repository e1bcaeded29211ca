//! External collaborator seams.
//!
//! Each collaborator the engine consumes is a trait with an in-memory
//! implementation used in tests. Production deployments supply their own
//! implementations over real services.

pub mod audit;
pub mod broadcast;
pub mod catalog;
pub mod gateway;
pub mod pricing;
pub mod return_hook;
pub mod stats;

pub use audit::{AuditSink, InMemoryAuditLog};
pub use broadcast::{EventBroadcaster, InMemoryBroadcaster};
pub use catalog::{CatalogEntry, CatalogLookup, InMemoryCatalog};
pub use gateway::{GatewayCharge, InMemoryGateway, PaymentGateway};
pub use pricing::{PricingCalculator, ZeroCharges};
pub use return_hook::{NoopReturnHook, ReturnApprovedHook};
pub use stats::{CustomerStats, InMemoryCustomerStats};
