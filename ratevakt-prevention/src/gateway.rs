use async_trait::async_trait;
use ratevakt_core::SourceId;
use thiserror::Error;

use crate::firewall::FirewallError;

#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("Firewall error: {0}")]
    Firewall(#[from] FirewallError),

    /// The rule is live but the blocked list could not be written; the
    /// entry is retried on the next block call or flush.
    #[error("Blocked {id} but failed to persist it: {reason}")]
    Persist { id: SourceId, reason: String },
}

/// Accepts block requests from the window scheduler. Must be idempotent.
#[async_trait]
pub trait EnforcementGateway: Send + Sync {
    async fn block(&self, id: &SourceId) -> Result<(), EnforcementError>;
}
