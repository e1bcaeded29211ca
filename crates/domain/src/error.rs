//! The closed, deterministic error taxonomy surfaced by the engine.

use thiserror::Error;

/// Deterministic, caller-facing failures.
///
/// Every variant carries enough context to render a specific message
/// (entity kind and id, requested vs available quantity). These are never
/// retried internally; transient infrastructure failures travel separately
/// as the store's own error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation is illegal for the entity's current status.
    #[error("cannot {action} {entity} {id} in {state} state")]
    InvalidState {
        entity: &'static str,
        id: String,
        state: String,
        action: &'static str,
    },

    /// A reservation or decrease would make available quantity negative.
    #[error("insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: i64,
        available: i64,
    },

    /// A fulfillment or return quantity exceeds the remaining allowance.
    #[error("invalid quantity for {item}: requested {requested}, allowed {allowed}")]
    InvalidQuantity {
        item: String,
        requested: u32,
        allowed: u32,
    },

    /// The payment gateway step did not succeed.
    #[error("payment failed for order {order_id}: {reason}")]
    PaymentFailed { order_id: String, reason: String },

    /// Malformed request shape.
    #[error("validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    /// A `NotFound` for the given entity kind and id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// An `InvalidState` for an operation illegal in the current status.
    pub fn invalid_state(
        entity: &'static str,
        id: impl ToString,
        state: impl ToString,
        action: &'static str,
    ) -> Self {
        DomainError::InvalidState {
            entity,
            id: id.to_string(),
            state: state.to_string(),
            action,
        }
    }

    /// A `Validation` error with a free-form message.
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation {
            message: message.into(),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = DomainError::InsufficientStock {
            item: "SKU-001".to_string(),
            requested: 10,
            available: 5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for SKU-001: requested 10, available 5"
        );

        let err = DomainError::not_found("Order", "abc");
        assert_eq!(err.to_string(), "Order not found: abc");
    }
}
