use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use payflow::application::client::Client;
use payflow::config::ClientConfig;
use payflow::domain::identity::{Scope, UserIdentity};
use payflow::domain::machine::PaymentStatus;
use payflow::domain::payment::{Amount, InvalidAmount, PaymentData, PaymentId, PaymentRequest};
use payflow::domain::ports::PaymentCallbacksRef;
use payflow::error::{AuthError, ProviderError};
use payflow::infrastructure::backend::UnconfiguredBackend;
use payflow::infrastructure::in_memory::InMemorySdk;
use payflow::infrastructure::notifier::{Notice, RecordingNotifier};
use payflow::interfaces::view::{SessionView, ViewId};
use rust_decimal_macros::dec;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Runs one login/purchase scenario against the in-process sandbox provider
/// and prints the resulting session as JSON.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario to play
    #[arg(value_enum)]
    scenario: Scenario,

    /// TOML configuration file (provider version, sandbox, login policy)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Username the sandbox authenticator returns
    #[arg(long, default_value = "alice")]
    username: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    /// Login, purchase, provider asks for approval; stalls without a backend
    Approve,
    /// As approve, then completion and an external confirmation
    Complete,
    /// Login, purchase, approval, then the user cancels
    Cancel,
    /// Login, purchase, then the provider reports an error
    Error,
    /// Login, then create-payment itself fails
    NetworkFailure,
    /// Purchase without logging in
    NoLogin,
    /// The user dismisses the login dialog
    LoginFailure,
}

#[derive(Serialize)]
struct Report {
    state: PaymentStatus,
    username: Option<String>,
    payment: Option<PaymentRequest>,
    outcome: Option<PaymentRequest>,
    active_view: Option<ViewId>,
    view: SessionView,
    notices: Vec<Notice>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path).into_diagnostic()?,
        None => ClientConfig::default(),
    };

    let sdk = Arc::new(InMemorySdk::new());
    sdk.set_user(UserIdentity::new("u1", cli.username.clone(), Scope::LOGIN));
    let notifier = Arc::new(RecordingNotifier::new());
    let client = Client::start(
        config,
        sdk.clone(),
        Arc::new(UnconfiguredBackend),
        notifier.clone(),
    )
    .await
    .into_diagnostic()?;

    run(cli.scenario, &client, &sdk, gig().into_diagnostic()?).await;

    let session = client.session().snapshot().await;
    let report = Report {
        state: client.payments().state().await,
        username: session.identity().map(|user| user.username.clone()),
        payment: session.payment().cloned(),
        outcome: session.last_outcome().cloned(),
        active_view: client.active_view().await,
        view: client.session_view().await,
        notices: notifier.notices(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &report).into_diagnostic()?;
    writeln!(out).into_diagnostic()?;
    Ok(())
}

fn gig() -> std::result::Result<PaymentData, InvalidAmount> {
    let amount = Amount::new(dec!(5.00))?;
    Ok(PaymentData::new(amount, "Logo design gig for PiHub Gigs").with_metadata("gigId", "logo123"))
}

/// Plays the provider's side of `scenario`. Expected failures are reported
/// on stderr; the session state is what the scenario demonstrates.
async fn run(scenario: Scenario, client: &Client, sdk: &InMemorySdk, data: PaymentData) {
    match scenario {
        Scenario::NoLogin => {
            if let Err(e) = client.purchase(data).await {
                eprintln!("Purchase rejected: {e}");
            }
            return;
        }
        Scenario::LoginFailure => sdk.fail_next_login(AuthError::Cancelled),
        Scenario::NetworkFailure => {
            sdk.fail_next_payment(ProviderError::Network("connection reset".to_string()))
        }
        _ => {}
    }

    if let Err(e) = client.login().await {
        eprintln!("Login failed: {e}");
        return;
    }
    if let Err(e) = client.purchase(data).await {
        eprintln!("Purchase failed: {e}");
        return;
    }
    let Some(callbacks) = sdk.last_callbacks() else {
        return;
    };
    let payment_id = PaymentId::from("pay_1");

    match scenario {
        Scenario::Approve => callbacks.on_ready_for_server_approval(payment_id).await,
        Scenario::Complete => complete(client, &callbacks, payment_id).await,
        Scenario::Cancel => {
            callbacks
                .on_ready_for_server_approval(payment_id.clone())
                .await;
            callbacks.on_cancel(payment_id).await;
        }
        Scenario::Error => {
            callbacks
                .on_error(ProviderError::Rejected("insufficient balance".to_string()), None)
                .await
        }
        Scenario::NetworkFailure | Scenario::NoLogin | Scenario::LoginFailure => {}
    }
}

async fn complete(client: &Client, callbacks: &PaymentCallbacksRef, payment_id: PaymentId) {
    callbacks
        .on_ready_for_server_approval(payment_id.clone())
        .await;
    callbacks
        .on_ready_for_server_completion(payment_id.clone(), "tx_1".into())
        .await;
    if let Err(e) = client.payments().confirm_completion(&payment_id).await {
        eprintln!("Completion not confirmed: {e}");
    }
}
