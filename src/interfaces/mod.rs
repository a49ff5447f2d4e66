//! Presentation-facing adapters.

pub mod view;
