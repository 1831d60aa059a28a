//! AI provider adapters and the registry that holds them.

mod mock_provider;
mod registry;

pub use mock_provider::{MockProvider, MockReply};
pub use registry::ProviderRegistry;
