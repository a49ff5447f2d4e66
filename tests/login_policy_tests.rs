mod common;

use common::{settle, start};
use payflow::config::LoginPolicy;
use payflow::domain::identity::{Scope, UserIdentity};
use payflow::domain::payment::{Amount, IncompletePayment, PaymentId};
use payflow::error::AuthError;
use payflow::interfaces::view::ViewId;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_later_login_wins_when_it_resolves_first() {
    let t = start(LoginPolicy::Replace).await;
    let gate = t.sdk.gate_next_login();
    let auth = t.client.auth().clone();
    let first = tokio::spawn(async move { auth.login().await });
    settle(|| t.sdk.authentications() == 1).await;

    t.sdk.set_user(UserIdentity::new("u2", "bob", Scope::LOGIN));
    t.client.login().await.unwrap();
    gate.send(()).unwrap();

    assert_eq!(first.await.unwrap(), Err(AuthError::Superseded));
    let session = t.client.session().read().await;
    assert_eq!(session.identity().unwrap().username, "bob");
}

#[tokio::test]
async fn test_later_login_wins_when_it_resolves_last() {
    let t = start(LoginPolicy::Replace).await;
    let first_gate = t.sdk.gate_next_login();
    let auth = t.client.auth().clone();
    let first = tokio::spawn(async move { auth.login().await });
    settle(|| t.sdk.authentications() == 1).await;

    t.sdk.set_user(UserIdentity::new("u2", "bob", Scope::LOGIN));
    let second_gate = t.sdk.gate_next_login();
    let auth = t.client.auth().clone();
    let second = tokio::spawn(async move { auth.login().await });
    settle(|| t.sdk.authentications() == 2).await;

    first_gate.send(()).unwrap();
    assert_eq!(first.await.unwrap().unwrap().username, "alice");
    second_gate.send(()).unwrap();
    assert_eq!(second.await.unwrap().unwrap().username, "bob");

    let session = t.client.session().read().await;
    assert_eq!(session.identity().unwrap().username, "bob");
}

#[tokio::test]
async fn test_reject_policy_refuses_second_login() {
    let t = start(LoginPolicy::Reject).await;
    let gate = t.sdk.gate_next_login();
    let auth = t.client.auth().clone();
    let first = tokio::spawn(async move { auth.login().await });
    settle(|| t.sdk.authentications() == 1).await;

    assert_eq!(t.client.auth().login().await, Err(AuthError::LoginInFlight));
    assert_eq!(t.sdk.authentications(), 1);

    gate.send(()).unwrap();
    assert!(first.await.unwrap().is_ok());

    // The in-flight marker is cleared once the first login resolves.
    assert!(t.client.auth().login().await.is_ok());
}

#[tokio::test]
async fn test_reject_policy_clears_marker_after_failure() {
    let t = start(LoginPolicy::Reject).await;
    t.sdk.fail_next_login(AuthError::Transport("offline".to_string()));

    assert!(t.client.login().await.is_err());
    assert!(t.client.login().await.is_ok());
}

#[tokio::test]
async fn test_incomplete_payment_is_queued_not_completed() {
    let t = start(LoginPolicy::Replace).await;
    let stale = IncompletePayment {
        identifier: PaymentId::from("pay_old"),
        amount: Amount::new(dec!(3.14)).unwrap(),
        memo: "earlier gig".to_string(),
        metadata: Default::default(),
        status: Default::default(),
        transaction: None,
    };
    t.sdk.report_incomplete(stale.clone());

    t.client.login().await.unwrap();
    t.client.login().await.unwrap();

    let session = t.client.session().read().await;
    assert_eq!(session.incomplete_payments(), &[stale]);
    assert!(session.payment().is_none());
    assert!(t.backend.completed().is_empty());
}

#[tokio::test]
async fn test_failed_login_leaves_session_unchanged() {
    let t = start(LoginPolicy::Replace).await;
    t.sdk.report_incomplete(IncompletePayment {
        identifier: PaymentId::from("pay_old"),
        amount: Amount::new(dec!(1)).unwrap(),
        memo: String::new(),
        metadata: Default::default(),
        status: Default::default(),
        transaction: None,
    });
    t.sdk.fail_next_login(AuthError::Cancelled);
    let before = t.client.session().snapshot().await;

    assert_eq!(t.client.auth().login().await, Err(AuthError::Cancelled));

    let after = t.client.session().snapshot().await;
    assert!(!after.is_authenticated());
    assert_eq!(after.incomplete_payments(), before.incomplete_payments());
    assert!(after.incomplete_payments().is_empty());

    // A later successful login still picks the payment up.
    t.client.login().await.unwrap();
    let session = t.client.session().read().await;
    assert_eq!(session.incomplete_payments().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_login_and_logout_keep_view_in_step() {
    for _ in 0..50 {
        let t = start(LoginPolicy::Replace).await;
        let auth = t.client.auth().clone();
        let login = tokio::spawn(async move { auth.login().await });
        let auth = t.client.auth().clone();
        let logout = tokio::spawn(async move { auth.logout().await });
        login.await.unwrap().unwrap();
        logout.await.unwrap();

        let authenticated = t.client.session().read().await.is_authenticated();
        let expected = if authenticated {
            ViewId::Profile
        } else {
            ViewId::Home
        };
        assert_eq!(t.client.active_view().await, Some(expected));
    }
}
