//! Persistence layer for the order-and-inventory engine.
//!
//! Exposes the [`TransactionalStore`]/[`UnitOfWork`] boundary plus two
//! implementations: [`InMemoryStore`] for tests and examples, and
//! [`PostgresStore`] for production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod uow;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use uow::{TransactionalStore, UnitOfWork};
