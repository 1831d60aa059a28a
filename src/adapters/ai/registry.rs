//! Provider registry - explicit adapter registration and descriptor state.
//!
//! Holds every registered adapter together with the descriptor the policy
//! engine ranks on. Registration is explicit; there is no runtime plug-in
//! discovery. `refresh_from_metrics` folds rolling stats back into the
//! descriptors so ranking always sees recent behavior, and stamps
//! `updated_at` so unrefreshed entries age into staleness.

use dashmap::DashMap;
use std::sync::Arc;

use crate::domain::foundation::ProviderId;
use crate::domain::{HealthState, ProviderDescriptor, SanitizedContext, TaskType};
use crate::ports::{HealthSignal, MetricsCollector, ProviderAdapter};

struct RegistryEntry {
    adapter: Arc<dyn ProviderAdapter>,
    descriptor: ProviderDescriptor,
}

/// Concurrent registry of provider adapters.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: DashMap<ProviderId, RegistryEntry>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter, replacing any previous entry with the same id.
    ///
    /// The initial descriptor is optimistic; rolling stats take over on the
    /// first refresh.
    pub fn register(&self, adapter: Arc<dyn ProviderAdapter>) {
        let id = adapter.id();
        let descriptor = ProviderDescriptor::new(
            id.clone(),
            adapter.class(),
            adapter.model(),
            adapter.capabilities(),
            adapter.estimated_cost(&probe_context()),
        );
        self.entries
            .insert(id, RegistryEntry { adapter, descriptor });
    }

    /// Removes an adapter. Returns false when the id was not registered.
    pub fn deregister(&self, id: &ProviderId) -> bool {
        self.entries.remove(id).is_some()
    }

    /// The adapter for an id, if registered.
    pub fn adapter(&self, id: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.entries.get(id).map(|entry| entry.adapter.clone())
    }

    /// Current descriptors, with the liveness probe folded in: an adapter
    /// reporting unavailable is descriptor-unavailable regardless of stats.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.entries
            .iter()
            .map(|entry| {
                let mut descriptor = entry.descriptor.clone();
                if !entry.adapter.is_available() {
                    descriptor.health = HealthState::Unavailable;
                }
                descriptor
            })
            .collect()
    }

    /// Folds rolling metrics into the descriptors and stamps `updated_at`.
    pub async fn refresh_from_metrics(&self, metrics: &dyn MetricsCollector) {
        let reports = metrics.health_status().await;
        for mut entry in self.entries.iter_mut() {
            let descriptor = &mut entry.descriptor;
            if let Some(report) = reports.iter().find(|r| r.provider == descriptor.id) {
                descriptor.success_rate = report.stats.success_rate;
                descriptor.p95_latency_ms = report.stats.p95_latency_ms;
                descriptor.health = match report.signal {
                    HealthSignal::Healthy => HealthState::Healthy,
                    HealthSignal::Degraded => HealthState::Degraded,
                    HealthSignal::Critical => HealthState::Unavailable,
                };
            }
            descriptor.updated_at = crate::domain::foundation::Timestamp::now();
        }
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no adapter is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Nominal context for the registration-time cost estimate.
fn probe_context() -> SanitizedContext {
    SanitizedContext::new(TaskType::Search, Vec::new(), String::new(), 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockProvider;
    use crate::domain::ProviderClass;

    fn mock(id: &str) -> Arc<MockProvider> {
        Arc::new(MockProvider::new(
            ProviderId::new(id).unwrap(),
            ProviderClass::Local,
        ))
    }

    #[test]
    fn register_and_lookup() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());

        registry.register(mock("local-rules"));
        assert_eq!(registry.len(), 1);

        let id = ProviderId::new("local-rules").unwrap();
        assert!(registry.adapter(&id).is_some());
        assert!(registry.deregister(&id));
        assert!(!registry.deregister(&id));
    }

    #[test]
    fn descriptors_reflect_adapter_metadata() {
        let registry = ProviderRegistry::new();
        registry.register(mock("local-rules"));

        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].id.as_str(), "local-rules");
        assert_eq!(descriptors[0].class, ProviderClass::Local);
        assert!(descriptors[0].supports(TaskType::Search));
    }

    #[test]
    fn unavailable_adapter_is_descriptor_unavailable() {
        let registry = ProviderRegistry::new();
        let provider = mock("flaky");
        registry.register(provider.clone());

        provider.set_available(false);
        let descriptors = registry.descriptors();
        assert_eq!(descriptors[0].health, HealthState::Unavailable);

        provider.set_available(true);
        let descriptors = registry.descriptors();
        assert_eq!(descriptors[0].health, HealthState::Healthy);
    }
}
