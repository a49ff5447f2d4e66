//! Domain types and the ports through which the orchestrator talks to the
//! outside world. Nothing here performs I/O.

pub mod identity;
pub mod machine;
pub mod payment;
pub mod ports;
