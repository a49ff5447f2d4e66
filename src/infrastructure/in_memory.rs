use crate::config::ProviderConfig;
use crate::domain::identity::{Scope, UserIdentity};
use crate::domain::payment::{IncompletePayment, PaymentData, PaymentId, TxId};
use crate::domain::ports::{
    ApprovalBackend, IncompletePaymentHandlerRef, PaymentCallbacksRef, ProviderSdk,
};
use crate::error::{AuthError, BackendError, ProviderError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// An in-process stand-in for the provider SDK.
///
/// Logins succeed with the configured user unless a failure is queued.
/// `create_payment` records the request and keeps the callbacks so the
/// caller can play the provider's side of the protocol.
pub struct InMemorySdk {
    state: Mutex<SdkState>,
}

struct SdkState {
    config: Option<ProviderConfig>,
    init_failure: Option<ProviderError>,
    user: UserIdentity,
    login_failures: VecDeque<AuthError>,
    login_gates: VecDeque<oneshot::Receiver<()>>,
    incomplete: Vec<IncompletePayment>,
    requested_scopes: Vec<Scope>,
    authentications: usize,
    create_failures: VecDeque<ProviderError>,
    created: Vec<PaymentData>,
    callbacks: Vec<PaymentCallbacksRef>,
}

impl Default for InMemorySdk {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySdk {
    /// Creates an SDK whose logins return `u1` / `alice`.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SdkState {
                config: None,
                init_failure: None,
                user: UserIdentity::new("u1", "alice", Scope::LOGIN),
                login_failures: VecDeque::new(),
                login_gates: VecDeque::new(),
                incomplete: Vec::new(),
                requested_scopes: Vec::new(),
                authentications: 0,
                create_failures: VecDeque::new(),
                created: Vec::new(),
                callbacks: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SdkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_user(&self, user: UserIdentity) {
        self.lock().user = user;
    }

    pub fn fail_init(&self, error: ProviderError) {
        self.lock().init_failure = Some(error);
    }

    pub fn fail_next_login(&self, error: AuthError) {
        self.lock().login_failures.push_back(error);
    }

    /// Holds the next login open until the returned sender fires or is dropped.
    ///
    /// The login's result is decided when it starts, not when it is released.
    pub fn gate_next_login(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().login_gates.push_back(rx);
        tx
    }

    /// Reports `payment` as incomplete during every subsequent login.
    pub fn report_incomplete(&self, payment: IncompletePayment) {
        self.lock().incomplete.push(payment);
    }

    pub fn fail_next_payment(&self, error: ProviderError) {
        self.lock().create_failures.push_back(error);
    }

    pub fn config(&self) -> Option<ProviderConfig> {
        self.lock().config.clone()
    }

    pub fn requested_scopes(&self) -> Vec<Scope> {
        self.lock().requested_scopes.clone()
    }

    /// Number of `authenticate` calls that reached the provider.
    pub fn authentications(&self) -> usize {
        self.lock().authentications
    }

    pub fn created_payments(&self) -> Vec<PaymentData> {
        self.lock().created.clone()
    }

    /// Callbacks passed to the most recent `create_payment`.
    pub fn last_callbacks(&self) -> Option<PaymentCallbacksRef> {
        self.lock().callbacks.last().cloned()
    }
}

#[async_trait]
impl ProviderSdk for InMemorySdk {
    async fn init(&self, config: &ProviderConfig) -> Result<(), ProviderError> {
        let mut state = self.lock();
        if let Some(error) = state.init_failure.take() {
            return Err(error);
        }
        state.config = Some(config.clone());
        Ok(())
    }

    async fn authenticate(
        &self,
        scopes: &[Scope],
        on_incomplete: IncompletePaymentHandlerRef,
    ) -> Result<UserIdentity, AuthError> {
        let (result, gate, incomplete) = {
            let mut state = self.lock();
            if state.config.is_none() {
                return Err(AuthError::Transport(
                    ProviderError::NotInitialized.to_string(),
                ));
            }
            state.requested_scopes = scopes.to_vec();
            state.authentications += 1;
            let result = match state.login_failures.pop_front() {
                Some(error) => Err(error),
                None => Ok(state.user.clone()),
            };
            (result, state.login_gates.pop_front(), state.incomplete.clone())
        };

        for payment in incomplete {
            on_incomplete.on_incomplete_payment_found(payment).await;
        }
        if let Some(gate) = gate {
            // A dropped sender releases the login too.
            let _ = gate.await;
        }
        result
    }

    async fn create_payment(
        &self,
        data: PaymentData,
        callbacks: PaymentCallbacksRef,
    ) -> Result<(), ProviderError> {
        let mut state = self.lock();
        if state.config.is_none() {
            return Err(ProviderError::NotInitialized);
        }
        state.created.push(data);
        state.callbacks.push(callbacks);
        match state.create_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Backend double that records forwarded identifiers.
#[derive(Default)]
pub struct RecordingBackend {
    state: Mutex<BackendState>,
}

#[derive(Default)]
struct BackendState {
    failing: bool,
    approved: Vec<PaymentId>,
    completed: Vec<(PaymentId, TxId)>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every later request fail.
    pub fn fail_requests(&self) {
        self.lock().failing = true;
    }

    pub fn approved(&self) -> Vec<PaymentId> {
        self.lock().approved.clone()
    }

    pub fn completed(&self) -> Vec<(PaymentId, TxId)> {
        self.lock().completed.clone()
    }
}

#[async_trait]
impl ApprovalBackend for RecordingBackend {
    async fn approve(&self, payment_id: &PaymentId) -> Result<(), BackendError> {
        let mut state = self.lock();
        if state.failing {
            return Err(BackendError::Request("connection refused".to_string()));
        }
        state.approved.push(payment_id.clone());
        Ok(())
    }

    async fn complete(&self, payment_id: &PaymentId, txid: &TxId) -> Result<(), BackendError> {
        let mut state = self.lock();
        if state.failing {
            return Err(BackendError::Request("connection refused".to_string()));
        }
        state.completed.push((payment_id.clone(), txid.clone()));
        Ok(())
    }
}
