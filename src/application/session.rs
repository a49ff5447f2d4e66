use crate::domain::identity::UserIdentity;
use crate::domain::machine::PaymentStatus;
use crate::domain::payment::{IncompletePayment, PaymentRequest, PaymentTicket};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Everything the client knows about the current user and purchase.
///
/// Writers are confined to the `application` module: the identity is only
/// written by `AuthFlow`, the payment fields only by `PaymentFlow`.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    identity: Option<UserIdentity>,
    payment: Option<PaymentRequest>,
    last_outcome: Option<PaymentRequest>,
    incomplete_payments: Vec<IncompletePayment>,
    tickets_issued: u64,
}

impl SessionState {
    pub fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// The in-flight payment, present only while it is non-terminal.
    pub fn payment(&self) -> Option<&PaymentRequest> {
        self.payment.as_ref()
    }

    /// The most recent payment that reached a terminal state, until acknowledged.
    pub fn last_outcome(&self) -> Option<&PaymentRequest> {
        self.last_outcome.as_ref()
    }

    /// Payments from earlier sessions awaiting reconciliation.
    pub fn incomplete_payments(&self) -> &[IncompletePayment] {
        &self.incomplete_payments
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment
            .as_ref()
            .or(self.last_outcome.as_ref())
            .map_or(PaymentStatus::Idle, |request| request.status)
    }

    pub(super) fn set_identity(&mut self, identity: UserIdentity) {
        self.identity = Some(identity);
    }

    pub(super) fn clear_identity(&mut self) -> Option<UserIdentity> {
        self.identity.take()
    }

    pub(super) fn record_incomplete(&mut self, payment: IncompletePayment) {
        if !self
            .incomplete_payments
            .iter()
            .any(|known| known.identifier == payment.identifier)
        {
            self.incomplete_payments.push(payment);
        }
    }

    pub(super) fn issue_ticket(&mut self) -> PaymentTicket {
        self.tickets_issued += 1;
        PaymentTicket(self.tickets_issued)
    }

    pub(super) fn attach_payment(&mut self, request: PaymentRequest) {
        self.last_outcome = None;
        self.payment = Some(request);
    }

    /// The attached payment, if it belongs to `ticket`.
    pub(super) fn payment_mut(&mut self, ticket: PaymentTicket) -> Option<&mut PaymentRequest> {
        self.payment
            .as_mut()
            .filter(|request| request.ticket == ticket)
    }

    /// Detaches the payment once it has reached a terminal status.
    pub(super) fn settle_payment(&mut self) {
        if let Some(request) = self.payment.take_if(|request| request.status.is_terminal()) {
            self.last_outcome = Some(request);
        }
    }

    pub(super) fn clear_outcome(&mut self) -> Option<PaymentRequest> {
        self.last_outcome.take()
    }

    pub(super) fn reset(&mut self) {
        let tickets_issued = self.tickets_issued;
        *self = Self {
            tickets_issued,
            ..Self::default()
        };
    }
}

/// Shared handle to the one session of a running client.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<SessionState>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.read().await
    }

    pub(super) async fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner.write().await
    }

    /// Owned copy of the current state.
    pub async fn snapshot(&self) -> SessionState {
        self.inner.read().await.clone()
    }
}
