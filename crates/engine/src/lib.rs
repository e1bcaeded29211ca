//! Transaction coordinator for the order-and-inventory engine.
//!
//! The [`Engine`] sequences domain operations inside single units of work
//! against a [`store::TransactionalStore`], talks to external collaborators
//! (catalog, payment gateway, broadcast, audit, statistics) through the
//! trait seams in [`services`], and emits events only after commit.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod services;

pub use config::EngineConfig;
pub use engine::{CreateOrderRequest, Engine, NewOrderItem, OrderPatch, PaymentRequest};
pub use error::{EngineError, Result, ServiceError};
