use super::session::SessionHandle;
use crate::domain::identity::Scope;
use crate::domain::machine::{Applied, PaymentEvent, PaymentStatus, transition};
use crate::domain::payment::{
    IncompletePayment, PaymentData, PaymentId, PaymentRequest, PaymentTicket, TxId,
};
use crate::domain::ports::{
    ApprovalBackendRef, NoticeKind, NotifierRef, PaymentCallbacks, ProviderSdkRef,
};
use crate::error::{PaymentError, PreconditionError, ProviderError, Result, TransitionError};
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const NOT_LOGGED_IN: &str = "Please log in first to make a purchase.";
pub const ALREADY_IN_PROGRESS: &str = "A payment is already in progress.";
pub const PAYMENTS_NOT_GRANTED: &str =
    "Payments permission was not granted. Please log in again.";
pub const PAYMENT_CANCELLED: &str = "Payment was cancelled.";
pub const PAYMENT_FAILED: &str = "An error occurred during payment.";
pub const WINDOW_OPENED: &str =
    "Payment window opened. In a real app, you need a server to approve this payment.";

/// Drives one payment at a time from `purchase` to a terminal state.
///
/// Every provider callback is applied atomically under the session write
/// lock; slow work (backend forwarding, notices) happens after the lock is
/// released.
#[derive(Clone)]
pub struct PaymentFlow {
    inner: Arc<FlowInner>,
}

struct FlowInner {
    sdk: ProviderSdkRef,
    session: SessionHandle,
    backend: ApprovalBackendRef,
    notifier: NotifierRef,
    status: watch::Sender<PaymentStatus>,
}

impl PaymentFlow {
    pub fn new(
        sdk: ProviderSdkRef,
        session: SessionHandle,
        backend: ApprovalBackendRef,
        notifier: NotifierRef,
    ) -> Self {
        let (status, _) = watch::channel(PaymentStatus::Idle);
        Self {
            inner: Arc::new(FlowInner {
                sdk,
                session,
                backend,
                notifier,
                status,
            }),
        }
    }

    /// Starts a purchase for the authenticated user.
    ///
    /// Rejected without touching the provider when nobody is logged in or a
    /// previous payment has not reached a terminal state yet.
    pub async fn purchase(&self, data: PaymentData) -> Result<PaymentTicket> {
        let ticket = {
            let mut session = self.inner.session.write().await;
            let rejection = match session.identity() {
                None => Some((PreconditionError::NotAuthenticated, NOT_LOGGED_IN)),
                Some(user) if !user.has_scope(Scope::Payments) => {
                    Some((PreconditionError::PaymentsNotGranted, PAYMENTS_NOT_GRANTED))
                }
                Some(_) => None,
            };
            if let Some((error, alert)) = rejection {
                drop(session);
                warn!(%error, "purchase rejected");
                self.notify(NoticeKind::Alert, alert);
                return Err(error.into());
            }

            // An attached payment is never terminal, so only a free slot accepts a submit.
            let current = session
                .payment()
                .map_or(PaymentStatus::Idle, |request| request.status);
            if let Err(e) = transition(current, &PaymentEvent::Submit) {
                drop(session);
                warn!(error = %e, "purchase rejected: a payment is already in flight");
                self.notify(NoticeKind::Alert, ALREADY_IN_PROGRESS);
                return Err(PreconditionError::PaymentInFlight.into());
            }

            let request = PaymentRequest::submit(session.issue_ticket(), data.clone())?;
            let ticket = request.ticket;
            self.inner.status.send_replace(request.status);
            session.attach_payment(request);
            ticket
        };
        info!(%ticket, amount = %data.amount, memo = %data.memo, "payment created");

        let callbacks = Arc::new(TicketCallbacks {
            ticket,
            flow: Arc::downgrade(&self.inner),
        });
        if let Err(e) = self.inner.sdk.create_payment(data, callbacks).await {
            error!(%ticket, error = %e, "create-payment failed");
            self.handle(ticket, PaymentEvent::Error(e.to_string())).await;
            return Err(PaymentError::Creation(e.to_string()).into());
        }

        if self.is_in_flight(ticket).await {
            self.notify(NoticeKind::Info, WINDOW_OPENED);
        }
        Ok(ticket)
    }

    /// Current lifecycle state, `Idle` when nothing is attached or pending acknowledgement.
    pub async fn state(&self) -> PaymentStatus {
        self.inner.session.read().await.payment_status()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaymentStatus> {
        self.inner.status.subscribe()
    }

    /// Marks a terminal outcome as shown to the user, returning the flow to `Idle`.
    pub async fn acknowledge(&self) -> Option<PaymentRequest> {
        let outcome = self.inner.session.write().await.clear_outcome();
        if outcome.is_some() {
            self.inner.status.send_replace(PaymentStatus::Idle);
        }
        outcome
    }

    /// External signal that the backend completed `payment_id` with the provider.
    pub async fn confirm_completion(&self, payment_id: &PaymentId) -> Result<PaymentStatus> {
        let event = PaymentEvent::CompletionConfirmed(payment_id.clone());
        let ticket = {
            let session = self.inner.session.read().await;
            match session.payment() {
                Some(request) if request.payment_id.as_ref() == Some(payment_id) => request.ticket,
                _ => {
                    return Err(TransitionError::Invalid {
                        state: session.payment_status(),
                        event,
                    }
                    .into());
                }
            }
        };
        match self.apply(ticket, event).await? {
            Applied::Moved(next) => Ok(next),
            Applied::Duplicate => Ok(self.state().await),
        }
    }

    pub(super) async fn reset(&self) {
        self.inner.session.write().await.reset();
        self.inner.status.send_replace(PaymentStatus::Idle);
    }

    async fn is_in_flight(&self, ticket: PaymentTicket) -> bool {
        self.inner
            .session
            .read()
            .await
            .payment()
            .is_some_and(|request| request.ticket == ticket)
    }

    /// Applies one event to the payment identified by `ticket`.
    ///
    /// The transition, the detach on terminal states and the status broadcast
    /// happen under a single write lock.
    async fn apply(
        &self,
        ticket: PaymentTicket,
        event: PaymentEvent,
    ) -> std::result::Result<Applied, TransitionError> {
        let mut session = self.inner.session.write().await;
        let Some(request) = session.payment_mut(ticket) else {
            let state = session.payment_status();
            drop(session);
            debug!(%ticket, %event, "ignoring event for a payment that is no longer attached");
            return Err(TransitionError::Invalid { state, event });
        };

        let from = request.status;
        let next = match request.apply(&event) {
            Ok(Applied::Moved(next)) => next,
            Ok(Applied::Duplicate) => {
                debug!(%ticket, %event, "duplicate provider callback ignored");
                return Ok(Applied::Duplicate);
            }
            Err(e) => {
                drop(session);
                warn!(%ticket, error = %e, "provider callback ignored");
                return Err(e);
            }
        };
        session.settle_payment();
        self.inner.status.send_replace(next);
        drop(session);

        info!(%ticket, %from, to = %next, "payment transition");
        Ok(Applied::Moved(next))
    }

    /// Applies a provider event and runs its side effects.
    async fn handle(&self, ticket: PaymentTicket, event: PaymentEvent) {
        let Ok(Applied::Moved(next)) = self.apply(ticket, event.clone()).await else {
            return;
        };

        match (next, event) {
            (PaymentStatus::AwaitingServerApproval, PaymentEvent::ReadyForApproval(id)) => {
                if let Err(e) = self.inner.backend.approve(&id).await {
                    warn!(payment_id = %id, error = %e, "approval not forwarded; payment stays pending");
                }
            }
            (
                PaymentStatus::AwaitingServerCompletion,
                PaymentEvent::ReadyForCompletion(id, txid),
            ) => {
                if let Err(e) = self.inner.backend.complete(&id, &txid).await {
                    warn!(payment_id = %id, %txid, error = %e, "completion not forwarded; payment stays pending");
                }
            }
            (PaymentStatus::Cancelled, _) => self.notify(NoticeKind::Alert, PAYMENT_CANCELLED),
            (PaymentStatus::Failed, _) => self.notify(NoticeKind::Alert, PAYMENT_FAILED),
            _ => {}
        }
    }

    fn notify(&self, kind: NoticeKind, message: &str) {
        self.inner.notifier.notify(kind, message);
    }
}

/// Callbacks handed to the provider for a single purchase.
///
/// Holds the flow weakly: the provider may keep callbacks alive after the
/// client is gone.
struct TicketCallbacks {
    ticket: PaymentTicket,
    flow: Weak<FlowInner>,
}

impl TicketCallbacks {
    async fn dispatch(&self, event: PaymentEvent) {
        match self.flow.upgrade() {
            Some(inner) => PaymentFlow { inner }.handle(self.ticket, event).await,
            None => debug!(ticket = %self.ticket, %event, "callback after client shutdown ignored"),
        }
    }
}

#[async_trait]
impl PaymentCallbacks for TicketCallbacks {
    async fn on_ready_for_server_approval(&self, payment_id: PaymentId) {
        info!(ticket = %self.ticket, %payment_id, "payment ready for server approval");
        self.dispatch(PaymentEvent::ReadyForApproval(payment_id)).await;
    }

    async fn on_ready_for_server_completion(&self, payment_id: PaymentId, txid: TxId) {
        info!(ticket = %self.ticket, %payment_id, %txid, "payment ready for server completion");
        self.dispatch(PaymentEvent::ReadyForCompletion(payment_id, txid))
            .await;
    }

    async fn on_cancel(&self, payment_id: PaymentId) {
        info!(ticket = %self.ticket, %payment_id, "payment cancelled by provider");
        self.dispatch(PaymentEvent::Cancel(payment_id)).await;
    }

    async fn on_error(&self, error: ProviderError, payment: Option<IncompletePayment>) {
        let payment_id = payment.as_ref().map(|p| p.identifier.to_string());
        error!(ticket = %self.ticket, ?payment_id, %error, "payment error reported by provider");
        self.dispatch(PaymentEvent::Error(error.to_string())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::domain::identity::UserIdentity;
    use crate::domain::ports::ProviderSdk;
    use crate::error::SessionError;
    use crate::infrastructure::in_memory::{InMemorySdk, RecordingBackend};
    use crate::infrastructure::notifier::RecordingNotifier;
    use rust_decimal_macros::dec;

    struct Harness {
        sdk: Arc<InMemorySdk>,
        notifier: Arc<RecordingNotifier>,
        backend: Arc<RecordingBackend>,
        session: SessionHandle,
        flow: PaymentFlow,
    }

    async fn harness(logged_in: bool) -> Harness {
        let sdk = Arc::new(InMemorySdk::new());
        sdk.init(&ProviderConfig::default()).await.unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let backend = Arc::new(RecordingBackend::new());
        let session = SessionHandle::new();
        if logged_in {
            session
                .write()
                .await
                .set_identity(UserIdentity::new("u1", "alice", Scope::LOGIN));
        }
        let flow = PaymentFlow::new(
            sdk.clone(),
            session.clone(),
            backend.clone(),
            notifier.clone(),
        );
        Harness {
            sdk,
            notifier,
            backend,
            session,
            flow,
        }
    }

    fn gig() -> PaymentData {
        PaymentData::new(dec!(5.00).try_into().unwrap(), "Logo design gig")
    }

    #[tokio::test]
    async fn test_purchase_requires_login() {
        let h = harness(false).await;

        let result = h.flow.purchase(gig()).await;
        assert!(matches!(
            result,
            Err(SessionError::Precondition(PreconditionError::NotAuthenticated))
        ));
        assert!(h.sdk.created_payments().is_empty());
        assert_eq!(h.flow.state().await, PaymentStatus::Idle);
        assert_eq!(h.notifier.alerts(), vec![NOT_LOGGED_IN.to_string()]);
    }

    #[tokio::test]
    async fn test_purchase_requires_payments_scope() {
        let h = harness(false).await;
        h.session
            .write()
            .await
            .set_identity(UserIdentity::new("u1", "alice", [Scope::Username]));

        let result = h.flow.purchase(gig()).await;
        assert!(matches!(
            result,
            Err(SessionError::Precondition(PreconditionError::PaymentsNotGranted))
        ));
        assert!(h.sdk.created_payments().is_empty());
        assert_eq!(h.notifier.alerts(), vec![PAYMENTS_NOT_GRANTED.to_string()]);
    }

    #[tokio::test]
    async fn test_purchase_submits_request_from_idle() {
        let h = harness(true).await;
        let mut status = h.flow.subscribe();
        let ticket = h.flow.purchase(gig()).await.unwrap();

        assert_eq!(*status.borrow_and_update(), PaymentStatus::Created);
        let state = h.session.read().await;
        let attached = state.payment().unwrap();
        assert_eq!(attached.ticket, ticket);
        assert_eq!(attached.status, PaymentStatus::Created);

        // The same request, replayed through the state machine, lands on the same state.
        let mut replay = PaymentRequest::new(ticket, attached.data.clone());
        assert_eq!(
            replay.apply(&PaymentEvent::Submit),
            Ok(Applied::Moved(attached.status))
        );
    }

    #[tokio::test]
    async fn test_second_purchase_rejected_while_in_flight() {
        let h = harness(true).await;
        h.flow.purchase(gig()).await.unwrap();

        let result = h.flow.purchase(gig()).await;
        assert!(matches!(
            result,
            Err(SessionError::Precondition(PreconditionError::PaymentInFlight))
        ));
        assert_eq!(h.sdk.created_payments().len(), 1);
        assert_eq!(h.flow.state().await, PaymentStatus::Created);
    }

    #[tokio::test]
    async fn test_approval_is_forwarded_to_backend() {
        let h = harness(true).await;
        h.flow.purchase(gig()).await.unwrap();

        let callbacks = h.sdk.last_callbacks().unwrap();
        callbacks.on_ready_for_server_approval("pay_1".into()).await;
        callbacks
            .on_ready_for_server_completion("pay_1".into(), "tx_1".into())
            .await;

        assert_eq!(h.backend.approved(), vec![PaymentId::from("pay_1")]);
        assert_eq!(
            h.backend.completed(),
            vec![(PaymentId::from("pay_1"), TxId::from("tx_1"))]
        );
        assert_eq!(h.flow.state().await, PaymentStatus::AwaitingServerCompletion);
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_payment_pending() {
        let h = harness(true).await;
        h.backend.fail_requests();
        h.flow.purchase(gig()).await.unwrap();

        let callbacks = h.sdk.last_callbacks().unwrap();
        callbacks.on_ready_for_server_approval("pay_1".into()).await;

        assert_eq!(h.flow.state().await, PaymentStatus::AwaitingServerApproval);
        assert!(h.session.read().await.payment().is_some());
    }

    #[tokio::test]
    async fn test_confirm_completion_reaches_completed() {
        let h = harness(true).await;
        h.flow.purchase(gig()).await.unwrap();
        let callbacks = h.sdk.last_callbacks().unwrap();
        callbacks.on_ready_for_server_approval("pay_1".into()).await;

        // Too early: still waiting for the completion callback.
        assert!(h.flow.confirm_completion(&"pay_1".into()).await.is_err());

        callbacks
            .on_ready_for_server_completion("pay_1".into(), "tx_1".into())
            .await;
        let status = h.flow.confirm_completion(&"pay_1".into()).await.unwrap();

        assert_eq!(status, PaymentStatus::Completed);
        let state = h.session.read().await;
        assert!(state.payment().is_none());
        assert_eq!(state.last_outcome().unwrap().txid, Some(TxId::from("tx_1")));
    }

    #[tokio::test]
    async fn test_error_callback_fails_payment() {
        let h = harness(true).await;
        h.flow.purchase(gig()).await.unwrap();

        h.sdk
            .last_callbacks()
            .unwrap()
            .on_error(ProviderError::Rejected("insufficient balance".into()), None)
            .await;

        assert_eq!(h.flow.state().await, PaymentStatus::Failed);
        assert!(h.session.read().await.payment().is_none());
        assert!(h.notifier.alerts().contains(&PAYMENT_FAILED.to_string()));
    }

    #[tokio::test]
    async fn test_stale_callbacks_do_not_touch_next_purchase() {
        let h = harness(true).await;
        h.flow.purchase(gig()).await.unwrap();
        let first = h.sdk.last_callbacks().unwrap();
        first.on_cancel("pay_1".into()).await;
        h.flow.acknowledge().await;

        h.flow.purchase(gig()).await.unwrap();
        first.on_ready_for_server_approval("pay_1".into()).await;
        first.on_error(ProviderError::Network("late".into()), None).await;

        assert_eq!(h.flow.state().await, PaymentStatus::Created);
    }

    #[tokio::test]
    async fn test_acknowledge_returns_to_idle() {
        let h = harness(true).await;
        let mut status = h.flow.subscribe();
        h.flow.purchase(gig()).await.unwrap();
        h.sdk.last_callbacks().unwrap().on_cancel("pay_1".into()).await;
        assert_eq!(*status.borrow_and_update(), PaymentStatus::Cancelled);

        let outcome = h.flow.acknowledge().await.unwrap();
        assert_eq!(outcome.status, PaymentStatus::Cancelled);
        assert_eq!(h.flow.state().await, PaymentStatus::Idle);
        assert_eq!(*status.borrow(), PaymentStatus::Idle);
    }

    #[tokio::test]
    async fn test_new_purchase_allowed_after_terminal_without_acknowledge() {
        let h = harness(true).await;
        h.flow.purchase(gig()).await.unwrap();
        h.sdk.last_callbacks().unwrap().on_cancel("pay_1".into()).await;

        let ticket = h.flow.purchase(gig()).await.unwrap();
        assert_eq!(ticket, PaymentTicket(2));
        assert_eq!(h.flow.state().await, PaymentStatus::Created);
    }
}
