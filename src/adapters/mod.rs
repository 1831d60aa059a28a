//! Adapters: concrete implementations of the ports.
//!
//! Everything here is process-local and in-memory; distributed backends
//! plug in behind the same port traits without touching the core.

pub mod ai;
pub mod budget;
pub mod cache;
pub mod metrics;
pub mod rate_limiter;
pub mod trace;
