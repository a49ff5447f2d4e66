use super::session::{SessionHandle, SessionState};
use crate::config::LoginPolicy;
use crate::domain::identity::{Scope, UserIdentity};
use crate::domain::payment::IncompletePayment;
use crate::domain::ports::{IncompletePaymentHandler, ProviderSdkRef};
use crate::error::AuthError;
use crate::interfaces::view::{ViewHandle, ViewId};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{error, info, warn};

/// Drives authentication and owns writes to the session identity.
#[derive(Clone)]
pub struct AuthFlow {
    sdk: ProviderSdkRef,
    session: SessionHandle,
    views: ViewHandle,
    policy: LoginPolicy,
    logins: Arc<LoginTracker>,
}

#[derive(Default)]
struct LoginTracker {
    started: AtomicU64,
    applied: AtomicU64,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when a rejecting-policy login ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AuthFlow {
    pub fn new(
        sdk: ProviderSdkRef,
        session: SessionHandle,
        views: ViewHandle,
        policy: LoginPolicy,
    ) -> Self {
        Self {
            sdk,
            session,
            views,
            policy,
            logins: Arc::new(LoginTracker::default()),
        }
    }

    /// Authenticates with the `username` and `payments` scopes.
    ///
    /// On success the identity replaces any previous one and the profile view
    /// is shown. On failure the session is left untouched.
    pub async fn login(&self) -> Result<UserIdentity, AuthError> {
        let _guard = match self.policy {
            LoginPolicy::Reject => {
                if self.logins.in_flight.swap(true, Ordering::AcqRel) {
                    warn!("login rejected: another login is in flight");
                    return Err(AuthError::LoginInFlight);
                }
                Some(InFlightGuard(&self.logins.in_flight))
            }
            LoginPolicy::Replace => None,
        };
        let generation = self.logins.started.fetch_add(1, Ordering::AcqRel) + 1;

        let recorder = Arc::new(IncompletePaymentRecorder::new(self.session.clone()));
        let identity = match self.sdk.authenticate(&Scope::LOGIN, recorder.clone()).await {
            Ok(identity) => identity,
            Err(e) => {
                error!(error = %e, "authentication failed");
                recorder.discard();
                return Err(e);
            }
        };

        let mut session = self.session.write().await;
        if generation < self.logins.applied.load(Ordering::Acquire) {
            drop(session);
            warn!(
                generation,
                uid = %identity.uid,
                "discarding login result superseded by a later login"
            );
            recorder.discard();
            return Err(AuthError::Superseded);
        }
        self.logins.applied.store(generation, Ordering::Release);
        session.set_identity(identity.clone());
        recorder.commit(&mut session);
        // Identity and view change under the same session lock.
        self.views.write().await.show_view(ViewId::Profile);
        drop(session);

        info!(uid = %identity.uid, username = %identity.username, "user authenticated");
        Ok(identity)
    }

    /// Forgets the current user and returns to the home view.
    pub async fn logout(&self) -> Option<UserIdentity> {
        let mut session = self.session.write().await;
        let previous = session.clear_identity();
        self.views.write().await.show_view(ViewId::Home);
        drop(session);

        if let Some(user) = &previous {
            info!(uid = %user.uid, "user logged out");
        }
        previous
    }
}

/// Collects payments left open by earlier sessions while a login runs.
///
/// They reach the session's reconciliation queue only together with the
/// identity of a successful login, and are never completed automatically.
struct IncompletePaymentRecorder {
    session: SessionHandle,
    state: Mutex<Recording>,
}

enum Recording {
    Buffering(Vec<IncompletePayment>),
    Committed,
    Discarded,
}

impl IncompletePaymentRecorder {
    fn new(session: SessionHandle) -> Self {
        Self {
            session,
            state: Mutex::new(Recording::Buffering(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the buffered payments into `session`; later reports go straight there.
    fn commit(&self, session: &mut SessionState) {
        let mut state = self.lock();
        if let Recording::Buffering(pending) = std::mem::replace(&mut *state, Recording::Committed)
        {
            for payment in pending {
                session.record_incomplete(payment);
            }
        }
    }

    fn discard(&self) {
        let mut state = self.lock();
        if let Recording::Buffering(pending) = std::mem::replace(&mut *state, Recording::Discarded)
            && !pending.is_empty()
        {
            warn!(
                count = pending.len(),
                "login did not complete; incomplete payments not queued"
            );
        }
    }
}

#[async_trait]
impl IncompletePaymentHandler for IncompletePaymentRecorder {
    async fn on_incomplete_payment_found(&self, payment: IncompletePayment) {
        warn!(
            payment_id = %payment.identifier,
            amount = %payment.amount,
            "incomplete payment found; pending reconciliation"
        );
        {
            let mut state = self.lock();
            match &mut *state {
                Recording::Buffering(pending) => {
                    pending.push(payment);
                    return;
                }
                Recording::Discarded => return,
                Recording::Committed => {}
            }
        }
        self.session.write().await.record_incomplete(payment);
    }
}
