//! Core business logic for curio.
//!
//! Services here are persistence-aware but transport-agnostic: they own
//! the activity pipeline (event envelope, dedup, fan-out, feed reads) and
//! talk to the queue and external systems only through traits.

pub mod services;

pub use services::*;
