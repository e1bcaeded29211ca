//! Engine error types.

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// A failure reported by an external collaborator (catalog, broadcaster,
/// audit sink).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

impl ServiceError {
    /// Creates a service error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors surfaced by engine operations.
///
/// `Domain` failures are deterministic and caller-facing; the engine never
/// retries them. `Unavailable` wraps transient infrastructure failures and
/// leaves retry policy to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A deterministic domain rule was violated.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The persistence layer failed transiently.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] StoreError),

    /// An external collaborator failed on the request path.
    #[error("collaborator failure: {0}")]
    Collaborator(#[from] ServiceError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
