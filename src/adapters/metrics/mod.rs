//! Metrics collector adapters.

mod in_memory;

pub use in_memory::InMemoryMetricsCollector;
