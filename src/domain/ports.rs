use super::identity::{Scope, UserIdentity};
use super::payment::{IncompletePayment, PaymentData, PaymentId, TxId};
use crate::config::ProviderConfig;
use crate::error::{AuthError, BackendError, ProviderError};
use async_trait::async_trait;
use std::sync::Arc;

/// Handlers the provider invokes while a payment progresses.
#[async_trait]
pub trait PaymentCallbacks: Send + Sync {
    async fn on_ready_for_server_approval(&self, payment_id: PaymentId);
    async fn on_ready_for_server_completion(&self, payment_id: PaymentId, txid: TxId);
    async fn on_cancel(&self, payment_id: PaymentId);
    async fn on_error(&self, error: ProviderError, payment: Option<IncompletePayment>);
}

/// Receives payments left open by an earlier session. Must not fail.
#[async_trait]
pub trait IncompletePaymentHandler: Send + Sync {
    async fn on_incomplete_payment_found(&self, payment: IncompletePayment);
}

/// The external payment provider SDK.
///
/// `init` is called exactly once, before any other operation.
#[async_trait]
pub trait ProviderSdk: Send + Sync {
    async fn init(&self, config: &ProviderConfig) -> Result<(), ProviderError>;

    async fn authenticate(
        &self,
        scopes: &[Scope],
        on_incomplete: IncompletePaymentHandlerRef,
    ) -> Result<UserIdentity, AuthError>;

    /// Submits the payment. Progress arrives later through `callbacks`.
    async fn create_payment(
        &self,
        data: PaymentData,
        callbacks: PaymentCallbacksRef,
    ) -> Result<(), ProviderError>;
}

/// The deployer's server, which approves and completes payments with the provider.
#[async_trait]
pub trait ApprovalBackend: Send + Sync {
    async fn approve(&self, payment_id: &PaymentId) -> Result<(), BackendError>;
    async fn complete(&self, payment_id: &PaymentId, txid: &TxId) -> Result<(), BackendError>;
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Alert,
}

/// Surfaces messages to the user (an alert box in a browser).
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

pub type ProviderSdkRef = Arc<dyn ProviderSdk>;
pub type PaymentCallbacksRef = Arc<dyn PaymentCallbacks>;
pub type IncompletePaymentHandlerRef = Arc<dyn IncompletePaymentHandler>;
pub type ApprovalBackendRef = Arc<dyn ApprovalBackend>;
pub type NotifierRef = Arc<dyn Notifier>;
