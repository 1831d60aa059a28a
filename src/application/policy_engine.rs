//! Policy engine - provider selection under the active policy snapshot.
//!
//! Pure ranking over provider descriptors: filter out everything the
//! snapshot forbids (capability, allowlist, availability, staleness), then
//! order by health tier and weighted score. Healthy providers always outrank
//! degraded ones no matter how the score weights are tuned.

use std::cmp::Ordering;

use crate::config::PolicyConfig;
use crate::domain::foundation::{ProviderId, Timestamp};
use crate::domain::{HealthState, ProviderClass, ProviderDescriptor, TaskType};

/// One eligible provider in routing order.
#[derive(Debug, Clone)]
pub struct RankedProvider {
    /// Provider identity.
    pub id: ProviderId,
    /// Cache-sharing class.
    pub class: ProviderClass,
    /// Health tier at ranking time (never `Unavailable`).
    pub health: HealthState,
    /// Weighted score within the tier, higher is better.
    pub score: f64,
    /// Estimated cost of one call, in cents.
    pub estimated_cost_cents: u32,
}

/// Stateless provider ranking.
pub struct PolicyEngine;

impl PolicyEngine {
    /// Ranks the descriptors eligible for `task_type` under `policy`.
    ///
    /// Excluded outright: providers that lack the capability, whose model is
    /// not allowlisted, or whose descriptor is unavailable or stale. The
    /// remainder is ordered healthy-before-degraded, then by
    /// `cost/success/latency` weighted score, with the per-provider weight
    /// override and finally the provider id breaking ties.
    pub fn rank(
        policy: &PolicyConfig,
        task_type: TaskType,
        descriptors: &[ProviderDescriptor],
        now: Timestamp,
    ) -> Vec<RankedProvider> {
        let eligible: Vec<(&ProviderDescriptor, HealthState)> = descriptors
            .iter()
            .filter(|d| d.supports(task_type))
            .filter(|d| policy.model_allowed(&d.model))
            .filter_map(|d| {
                let health = d.effective_health(policy.descriptor_ttl_secs, now);
                health.is_routable().then_some((d, health))
            })
            .collect();

        let max_cost = eligible
            .iter()
            .map(|(d, _)| d.cost_per_call_cents)
            .max()
            .unwrap_or(0);
        let max_latency = eligible
            .iter()
            .map(|(d, _)| d.p95_latency_ms)
            .max()
            .unwrap_or(0);

        let mut ranked: Vec<RankedProvider> = eligible
            .into_iter()
            .map(|(d, health)| {
                let score = Self::score(policy, d, max_cost, max_latency);
                RankedProvider {
                    id: d.id.clone(),
                    class: d.class,
                    health,
                    score,
                    estimated_cost_cents: d.cost_per_call_cents,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            Self::tier(a.health)
                .cmp(&Self::tier(b.health))
                .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
                .then_with(|| {
                    let oa = policy.weight_override(a.id.as_str());
                    let ob = policy.weight_override(b.id.as_str());
                    ob.partial_cmp(&oa).unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        ranked
    }

    /// Weighted score: cheaper, more reliable and faster is better. Cost and
    /// latency are normalized against the worst eligible provider so the
    /// three terms share a [0, 1] scale.
    fn score(
        policy: &PolicyConfig,
        descriptor: &ProviderDescriptor,
        max_cost: u32,
        max_latency: u64,
    ) -> f64 {
        let weights = &policy.scoring;
        let cost_score = if max_cost > 0 {
            1.0 - descriptor.cost_per_call_cents as f64 / max_cost as f64
        } else {
            1.0
        };
        let latency_score = if max_latency > 0 {
            1.0 - descriptor.p95_latency_ms as f64 / max_latency as f64
        } else {
            1.0
        };
        weights.cost * cost_score
            + weights.success_rate * descriptor.success_rate
            + weights.latency * latency_score
            + policy.weight_override(descriptor.id.as_str())
    }

    fn tier(health: HealthState) -> u8 {
        match health {
            HealthState::Healthy => 0,
            HealthState::Degraded => 1,
            HealthState::Unavailable => 2,
        }
    }
}
