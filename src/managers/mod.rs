//! Component managers. All six share one `ComponentManager` trait;
//! `render` centralizes the rendering rules every manager must apply
//! (deterministic naming, owner references, overlay application,
//! server-side apply). Structural generalization of the plan-then-apply
//! split used elsewhere in this codebase, from "patch an existing
//! workload" to "render and server-side-apply an owned object graph".

pub mod alertrouter;
pub mod collector;
pub mod frontend;
pub mod logs;
pub mod metrics;
pub mod render;
pub mod traces;

use async_trait::async_trait;

use crate::crd::{ComponentKind, ObservabilityPlatform, Phase};
use crate::gateway::ClusterGateway;
use crate::health::ComponentResult;

/// One probe observation, independent of the damping window applied
/// by the caller: the reconciler owns a `health::ProbeTracker` per
/// component, managers just report raw observations.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSample {
    pub ready_replicas: i32,
    pub desired_replicas: i32,
    pub version_matches: bool,
    pub probe_endpoint_ok: bool,
}

impl HealthSample {
    pub fn is_ok(&self) -> bool {
        self.ready_replicas >= self.desired_replicas
            && self.desired_replicas > 0
            && self.version_matches
            && self.probe_endpoint_ok
    }
}

/// Contract every component manager implements.
#[async_trait]
pub trait ComponentManager: Send + Sync {
    fn kind(&self) -> ComponentKind;

    /// Render and server-side-apply this component's desired objects,
    /// then probe them. Idempotent: safe to call on every reconcile.
    async fn reconcile(
        &self,
        gateway: &ClusterGateway,
        platform: &ObservabilityPlatform,
    ) -> Result<ComponentResult, crate::errors::ReconcileError>;

    /// Delete this component's owned children. Returns true once none
    /// remain (idempotent: re-entrant at any point).
    async fn teardown(
        &self,
        gateway: &ClusterGateway,
        platform: &ObservabilityPlatform,
    ) -> Result<bool, crate::errors::ReconcileError>;

    /// Probe readiness without rendering/applying. Used for drift
    /// detection while the platform is already Ready.
    async fn probe(
        &self,
        gateway: &ClusterGateway,
        platform: &ObservabilityPlatform,
    ) -> Result<HealthSample, crate::errors::ReconcileError>;
}

/// Build the standard six managers in dependency order, ready for the
/// reconciler to dispatch. Stateless: all state lives in the cluster,
/// so a fresh set can be constructed per reconcile pass at negligible
/// cost.
pub fn standard_managers() -> Vec<Box<dyn ComponentManager>> {
    vec![
        Box::new(metrics::MetricsManager),
        Box::new(logs::LogsManager),
        Box::new(traces::TracesManager),
        Box::new(collector::CollectorManager),
        Box::new(frontend::FrontendManager),
        Box::new(alertrouter::AlertRouterManager),
    ]
}

/// Derive the `ComponentResult.phase` from a health sample plus
/// whether the manager is still converging (desired count fresh) vs.
/// truly failed. Shared by every manager's `reconcile()` so the
/// Installing/Upgrading vs. Failed distinction is made one way.
pub fn phase_from_sample(sample: &HealthSample, attempts_remaining: bool) -> Phase {
    if sample.is_ok() {
        Phase::Ready
    } else if attempts_remaining {
        Phase::Installing
    } else {
        Phase::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_sample_ok_requires_all_conditions() {
        let sample = HealthSample {
            ready_replicas: 2,
            desired_replicas: 2,
            version_matches: true,
            probe_endpoint_ok: true,
        };
        assert!(sample.is_ok());
    }

    #[test]
    fn test_health_sample_not_ok_when_under_replicated() {
        let sample = HealthSample {
            ready_replicas: 1,
            desired_replicas: 2,
            version_matches: true,
            probe_endpoint_ok: true,
        };
        assert!(!sample.is_ok());
    }

    #[test]
    fn test_health_sample_not_ok_when_zero_desired() {
        let sample = HealthSample {
            ready_replicas: 0,
            desired_replicas: 0,
            version_matches: true,
            probe_endpoint_ok: true,
        };
        assert!(!sample.is_ok());
    }

    #[test]
    fn test_standard_managers_dependency_order() {
        let managers = standard_managers();
        let kinds: Vec<ComponentKind> = managers.iter().map(|m| m.kind()).collect();
        assert_eq!(kinds, ComponentKind::ORDER.to_vec());
    }

    #[test]
    fn test_phase_from_sample_ready() {
        let sample = HealthSample {
            ready_replicas: 1,
            desired_replicas: 1,
            version_matches: true,
            probe_endpoint_ok: true,
        };
        assert_eq!(phase_from_sample(&sample, true), Phase::Ready);
    }

    #[test]
    fn test_phase_from_sample_installing_while_converging() {
        let sample = HealthSample {
            ready_replicas: 0,
            desired_replicas: 1,
            version_matches: true,
            probe_endpoint_ok: false,
        };
        assert_eq!(phase_from_sample(&sample, true), Phase::Installing);
    }

    #[test]
    fn test_phase_from_sample_failed_when_budget_exhausted() {
        let sample = HealthSample {
            ready_replicas: 0,
            desired_replicas: 1,
            version_matches: true,
            probe_endpoint_ok: false,
        };
        assert_eq!(phase_from_sample(&sample, false), Phase::Failed);
    }
}
