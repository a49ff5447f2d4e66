use super::auth::AuthFlow;
use super::payment::PaymentFlow;
use super::session::SessionHandle;
use crate::config::ClientConfig;
use crate::domain::identity::UserIdentity;
use crate::domain::payment::{PaymentData, PaymentTicket};
use crate::domain::ports::{ApprovalBackendRef, NotifierRef, ProviderSdkRef};
use crate::error::Result;
use crate::interfaces::view::{SessionView, ShowOutcome, ViewHandle, ViewId, ViewRouter};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// One running client: the session plus the flows that mutate it.
///
/// Construction initializes the provider SDK, so no flow can reach the
/// provider before `init` has succeeded.
pub struct Client {
    config: ClientConfig,
    session: SessionHandle,
    views: ViewHandle,
    auth: AuthFlow,
    payments: PaymentFlow,
}

impl Client {
    /// Initializes the provider and shows the home view.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Provider`](crate::error::SessionError::Provider)
    /// if the SDK refuses the configuration.
    pub async fn start(
        config: ClientConfig,
        sdk: ProviderSdkRef,
        backend: ApprovalBackendRef,
        notifier: NotifierRef,
    ) -> Result<Self> {
        sdk.init(&config.provider).await?;
        info!(
            version = %config.provider.version,
            sandbox = config.provider.sandbox,
            "payment provider initialized"
        );

        let session = SessionHandle::new();
        let mut router = ViewRouter::new();
        router.show_view(ViewId::Home);
        let views: ViewHandle = Arc::new(RwLock::new(router));

        let auth = AuthFlow::new(
            sdk.clone(),
            session.clone(),
            views.clone(),
            config.login_policy,
        );
        let payments = PaymentFlow::new(sdk, session.clone(), backend, notifier);

        Ok(Self {
            config,
            session,
            views,
            auth,
            payments,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn views(&self) -> &ViewHandle {
        &self.views
    }

    pub fn auth(&self) -> &AuthFlow {
        &self.auth
    }

    pub fn payments(&self) -> &PaymentFlow {
        &self.payments
    }

    pub async fn login(&self) -> Result<UserIdentity> {
        Ok(self.auth.login().await?)
    }

    pub async fn purchase(&self, data: PaymentData) -> Result<PaymentTicket> {
        self.payments.purchase(data).await
    }

    /// Handles a navigation button click.
    pub async fn navigate(&self, target: &str) -> ShowOutcome {
        self.views.write().await.navigate(target)
    }

    pub async fn active_view(&self) -> Option<ViewId> {
        self.views.read().await.active()
    }

    pub async fn session_view(&self) -> SessionView {
        SessionView::from_session(&*self.session.read().await)
    }

    /// Tears the session down: identity, payment, outcome and reconciliation queue.
    pub async fn reset(&self) {
        self.payments.reset().await;
        self.views.write().await.show_view(ViewId::Home);
        info!("session reset");
    }
}
