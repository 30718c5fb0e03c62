//! The health aggregator: combines per-component probe results into a
//! platform-level `PlatformHealth` and the four standard conditions.
//! A two-stage split (numeric/observed signals -> classification)
//! generalized from per-component-result into enum health.

use crate::crd::{
    Condition, ObservabilityPlatformStatus, Phase, PlatformHealth, CONDITION_AVAILABLE,
    CONDITION_DEGRADED, CONDITION_PROGRESSING, CONDITION_READY,
};

/// Default number of consecutive probe misses before a component is
/// considered to have a sustained failure (the damping window).
pub const DEFAULT_PROBE_MISS_WINDOW: u32 = 3;

/// Normalized result a component manager reports after one reconcile.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentResult {
    pub phase: Phase,
    pub version: Option<String>,
    pub ready_replicas: i32,
    pub desired_replicas: i32,
    pub message: String,
    /// True if any probe has completed since the last spec change.
    pub probed: bool,
}

impl ComponentResult {
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }
}

/// Combine all enabled components' results into platform health:
/// - Healthy: all enabled components Ready.
/// - Degraded: >=1 non-Ready but >=1 Ready; or any sustained probe miss.
/// - Unhealthy: all enabled components non-Ready.
/// - Unknown: no probe has completed since the latest spec change.
pub fn aggregate(results: &[ComponentResult]) -> PlatformHealth {
    if results.is_empty() {
        return PlatformHealth::Unknown;
    }
    if results.iter().any(|r| !r.probed) {
        return PlatformHealth::Unknown;
    }

    let ready = results.iter().filter(|r| r.is_ready()).count();
    let total = results.len();

    if ready == total {
        PlatformHealth::Healthy
    } else if ready == 0 {
        PlatformHealth::Unhealthy
    } else {
        PlatformHealth::Degraded
    }
}

/// Derive the four standard conditions (Ready, Progressing, Available,
/// Degraded) from the aggregate health and platform phase.
pub fn conditions(phase: Phase, health: PlatformHealth, now: &str) -> Vec<Condition> {
    let mut status = ObservabilityPlatformStatus::default();

    let ready = phase == Phase::Ready && health == PlatformHealth::Healthy;
    status.set_condition(
        CONDITION_READY,
        ready,
        if ready { "AllComponentsReady" } else { "ComponentsNotReady" },
        &format!("platform phase={phase} health={health}"),
        now,
    );

    let progressing = matches!(phase, Phase::Installing | Phase::Upgrading | Phase::Deleting);
    status.set_condition(
        CONDITION_PROGRESSING,
        progressing,
        if progressing { "Converging" } else { "Settled" },
        &format!("platform phase={phase}"),
        now,
    );

    let available = matches!(health, PlatformHealth::Healthy | PlatformHealth::Degraded)
        && phase != Phase::Pending;
    status.set_condition(
        CONDITION_AVAILABLE,
        available,
        if available { "MinimumComponentsReady" } else { "Unavailable" },
        &format!("platform health={health}"),
        now,
    );

    let degraded = health == PlatformHealth::Degraded || phase == Phase::Degraded;
    status.set_condition(
        CONDITION_DEGRADED,
        degraded,
        if degraded { "ProbeFailuresSustained" } else { "NoDegradation" },
        &format!("platform health={health}"),
        now,
    );

    status.conditions
}

/// Sustained-failure damping: a single probe miss does not flip a
/// component's result to non-Ready; only `window` consecutive misses do.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeTracker {
    consecutive_misses: u32,
    window: u32,
}

impl ProbeTracker {
    pub fn new(window: u32) -> Self {
        Self {
            consecutive_misses: 0,
            window: window.max(1),
        }
    }

    /// Record one probe outcome; returns true if the component should be
    /// considered sustained-failing after this observation.
    pub fn record(&mut self, ok: bool) -> bool {
        if ok {
            self.consecutive_misses = 0;
        } else {
            self.consecutive_misses = self.consecutive_misses.saturating_add(1);
        }
        self.consecutive_misses >= self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(version: &str) -> ComponentResult {
        ComponentResult {
            phase: Phase::Ready,
            version: Some(version.to_string()),
            ready_replicas: 1,
            desired_replicas: 1,
            message: "ok".to_string(),
            probed: true,
        }
    }

    fn failing() -> ComponentResult {
        ComponentResult {
            phase: Phase::Failed,
            version: None,
            ready_replicas: 0,
            desired_replicas: 1,
            message: "bad".to_string(),
            probed: true,
        }
    }

    #[test]
    fn test_all_ready_is_healthy() {
        let results = vec![ready("v1"), ready("v2")];
        assert_eq!(aggregate(&results), PlatformHealth::Healthy);
    }

    #[test]
    fn test_mixed_is_degraded() {
        let results = vec![ready("v1"), failing()];
        assert_eq!(aggregate(&results), PlatformHealth::Degraded);
    }

    #[test]
    fn test_all_failing_is_unhealthy() {
        let results = vec![failing(), failing()];
        assert_eq!(aggregate(&results), PlatformHealth::Unhealthy);
    }

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(aggregate(&[]), PlatformHealth::Unknown);
    }

    #[test]
    fn test_unprobed_component_is_unknown() {
        let mut r = ready("v1");
        r.probed = false;
        assert_eq!(aggregate(&[r]), PlatformHealth::Unknown);
    }

    #[test]
    fn test_conditions_ready_true_when_healthy() {
        let conds = conditions(Phase::Ready, PlatformHealth::Healthy, "t0");
        let ready_cond = conds.iter().find(|c| c.type_ == CONDITION_READY).unwrap();
        assert_eq!(ready_cond.status, "True");
    }

    #[test]
    fn test_conditions_progressing_true_during_install() {
        let conds = conditions(Phase::Installing, PlatformHealth::Unknown, "t0");
        let p = conds.iter().find(|c| c.type_ == CONDITION_PROGRESSING).unwrap();
        assert_eq!(p.status, "True");
    }

    #[test]
    fn test_conditions_degraded_true_when_health_degraded() {
        let conds = conditions(Phase::Ready, PlatformHealth::Degraded, "t0");
        let d = conds.iter().find(|c| c.type_ == CONDITION_DEGRADED).unwrap();
        assert_eq!(d.status, "True");
    }

    #[test]
    fn test_conditions_available_false_when_pending() {
        let conds = conditions(Phase::Pending, PlatformHealth::Unknown, "t0");
        let a = conds.iter().find(|c| c.type_ == CONDITION_AVAILABLE).unwrap();
        assert_eq!(a.status, "False");
    }

    #[test]
    fn test_probe_tracker_single_miss_not_sustained() {
        let mut tracker = ProbeTracker::new(3);
        assert!(!tracker.record(false));
        assert!(!tracker.record(false));
    }

    #[test]
    fn test_probe_tracker_sustained_after_window() {
        let mut tracker = ProbeTracker::new(3);
        tracker.record(false);
        tracker.record(false);
        assert!(tracker.record(false));
    }

    #[test]
    fn test_probe_tracker_resets_on_success() {
        let mut tracker = ProbeTracker::new(3);
        tracker.record(false);
        tracker.record(false);
        assert!(!tracker.record(true));
        assert!(!tracker.record(false));
    }
}
