//! Return approval hook.
//!
//! Approving a return records intent; whether approval also refunds the
//! payment or restocks inventory is a policy decision. The hook runs after
//! the approval commits, so policy changes never touch the return tracker's
//! own invariants.

use async_trait::async_trait;
use domain::Return;

use crate::error::ServiceError;

/// Trait invoked after a return is approved and committed.
#[async_trait]
pub trait ReturnApprovedHook: Send + Sync {
    /// Reacts to an approved return.
    async fn on_return_approved(&self, ret: &Return) -> Result<(), ServiceError>;
}

/// Default hook: approval records intent only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReturnHook;

#[async_trait]
impl ReturnApprovedHook for NoopReturnHook {
    async fn on_return_approved(&self, _ret: &Return) -> Result<(), ServiceError> {
        Ok(())
    }
}
