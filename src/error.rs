use crate::domain::machine::{PaymentEvent, PaymentStatus};
use crate::domain::payment::PaymentId;
use thiserror::Error;

/// Failures reported by the authenticator, or by the login policy itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication rejected: {0}")]
    Rejected(String),
    #[error("authentication cancelled by the user")]
    Cancelled,
    #[error("authentication transport failure: {0}")]
    Transport(String),
    #[error("a login is already in flight")]
    LoginInFlight,
    #[error("login result discarded: a later login already applied")]
    Superseded,
}

/// Terminal payment failures surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("create-payment failed: {0}")]
    Creation(String),
    #[error("payment {0} was cancelled")]
    Cancelled(PaymentId),
    #[error("payment provider error: {0}")]
    Provider(String),
}

/// A purchase rejected before any provider call was made.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("no authenticated user")]
    NotAuthenticated,
    #[error("the user has not granted the payments scope")]
    PaymentsNotGranted,
    #[error("another payment is still in progress")]
    PaymentInFlight,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("event {event} is not valid from state {state}")]
    Invalid {
        state: PaymentStatus,
        event: PaymentEvent,
    },
    #[error("payment id mismatch: expected {expected}, got {got}")]
    PaymentIdMismatch { expected: PaymentId, got: PaymentId },
}

/// Errors raised by a provider SDK adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider used before init")]
    NotInitialized,
    #[error("network error: {0}")]
    Network(String),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("no approval backend configured")]
    Unconfigured,
    #[error("backend request failed: {0}")]
    Request(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config validation failed: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
