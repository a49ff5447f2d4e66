use crate::domain::payment::{PaymentId, TxId};
use crate::domain::ports::ApprovalBackend;
use crate::error::BackendError;
use async_trait::async_trait;
use tracing::warn;

/// Used when the deployment has no approval server.
///
/// Every forward fails, so payments stall in `AwaitingServerApproval`
/// (or `AwaitingServerCompletion`). That is the expected outcome for a
/// client running without its backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredBackend;

#[async_trait]
impl ApprovalBackend for UnconfiguredBackend {
    async fn approve(&self, payment_id: &PaymentId) -> Result<(), BackendError> {
        warn!(%payment_id, "no backend configured to approve payment");
        Err(BackendError::Unconfigured)
    }

    async fn complete(&self, payment_id: &PaymentId, txid: &TxId) -> Result<(), BackendError> {
        warn!(%payment_id, %txid, "no backend configured to complete payment");
        Err(BackendError::Unconfigured)
    }
}
