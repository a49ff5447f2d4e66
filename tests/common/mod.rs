#![allow(dead_code)]

use payflow::application::client::Client;
use payflow::config::{ClientConfig, LoginPolicy};
use payflow::domain::payment::{Amount, PaymentData};
use payflow::infrastructure::in_memory::{InMemorySdk, RecordingBackend};
use payflow::infrastructure::notifier::RecordingNotifier;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub struct TestClient {
    pub client: Client,
    pub sdk: Arc<InMemorySdk>,
    pub notifier: Arc<RecordingNotifier>,
    pub backend: Arc<RecordingBackend>,
}

pub async fn start(policy: LoginPolicy) -> TestClient {
    let sdk = Arc::new(InMemorySdk::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let backend = Arc::new(RecordingBackend::new());
    let config = ClientConfig {
        login_policy: policy,
        ..ClientConfig::default()
    };
    let client = Client::start(config, sdk.clone(), backend.clone(), notifier.clone())
        .await
        .unwrap();

    TestClient {
        client,
        sdk,
        notifier,
        backend,
    }
}

pub fn gig() -> PaymentData {
    PaymentData::new(
        Amount::new(dec!(5.00)).unwrap(),
        "Logo design gig for PiHub Gigs",
    )
    .with_metadata("gigId", "logo123")
}

/// Yields to the runtime until `done` holds.
pub async fn settle(done: impl Fn() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never held");
}
