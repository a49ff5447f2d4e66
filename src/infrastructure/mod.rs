//! Adapters for the ports in `domain::ports`.

pub mod backend;
pub mod in_memory;
pub mod notifier;
