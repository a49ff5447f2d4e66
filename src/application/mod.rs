//! Application layer: the session and the flows that drive it.
//!
//! `Client` owns a single `SessionHandle` and hands clones of it to
//! `AuthFlow` and `PaymentFlow`. Provider callbacks resume on the async
//! runtime and mutate the session one event at a time.

pub mod auth;
pub mod client;
pub mod payment;
pub mod session;
