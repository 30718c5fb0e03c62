mod common;

use common::{
    component_spec, converging_result, failed_result, frontend_spec, next_input, ready_result,
    with_ha,
};
use obsplatform::crd::{ObservabilityPlatformSpec, Phase};
use obsplatform::defaulter;
use obsplatform::health;
use obsplatform::phase::{self, Input, RetryBudget};

// ══════════════════════════════════════════════════════════════════
// End-to-end phase lifecycle tests (no cluster required).
//
// Each test drives defaulting -> component results -> health
// aggregation -> phase transition the way one reconcile pass would,
// verifying the pipeline in one shot rather than each stage alone.
// ══════════════════════════════════════════════════════════════════

#[test]
fn test_minimal_install_reaches_ready() {
    // Scenario: metrics only, replicas 1, pinned version.
    let spec = ObservabilityPlatformSpec {
        metrics: Some(component_spec("v2.48.0", 1)),
        ..Default::default()
    };
    let defaulted = defaulter::default_platform_spec(&spec);
    assert_eq!(defaulted.metrics.as_ref().unwrap().replicas, Some(1));

    let mut phase_now = Phase::Pending;
    phase_now = phase::transition(phase_now, Input::PreflightOk);
    assert_eq!(phase_now, Phase::Installing);

    // First pass: component still converging (0/1 ready).
    let pass_one = vec![converging_result(0, 1)];
    let health_one = health::aggregate(&pass_one);
    assert_eq!(health_one, obsplatform::crd::PlatformHealth::Unhealthy);
    phase_now = phase::transition(phase_now, next_input(&pass_one, false));
    assert_eq!(phase_now, Phase::Installing);

    // Second pass: component converged.
    let pass_two = vec![ready_result("v2.48.0", 1)];
    let health_two = health::aggregate(&pass_two);
    assert_eq!(health_two, obsplatform::crd::PlatformHealth::Healthy);
    phase_now = phase::transition(phase_now, next_input(&pass_two, false));
    assert_eq!(phase_now, Phase::Ready);
}

#[test]
fn test_ha_defaulting_raises_replica_floors_before_install() {
    // Scenario: metrics + frontend enabled, HA requested, no explicit
    // replica counts -- the HA floor must win before Installing even
    // starts, and install only completes once that many pods are
    // Ready.
    let spec = with_ha(ObservabilityPlatformSpec {
        metrics: Some(obsplatform::crd::ComponentSpec::default()),
        frontend: Some(frontend_spec("v10.2.2", 1)),
        ..Default::default()
    });
    let defaulted = defaulter::default_platform_spec(&spec);

    let metrics_replicas = defaulted.metrics.as_ref().unwrap().replicas.unwrap();
    let frontend_replicas = defaulted.frontend.as_ref().unwrap().common.replicas.unwrap();
    assert!(metrics_replicas >= 3, "metrics HA floor is 3");
    assert!(frontend_replicas >= 2, "frontend HA floor is 2");

    // Partial replica count (2 of 3 metrics pods ready) must not yet
    // report Ready.
    let partial = vec![
        converging_result(2, metrics_replicas),
        converging_result(frontend_replicas, frontend_replicas),
    ];
    assert_eq!(health::aggregate(&partial), obsplatform::crd::PlatformHealth::Unhealthy);

    let full = vec![
        ready_result("v2.48.0", metrics_replicas),
        ready_result("v10.2.2", frontend_replicas),
    ];
    assert_eq!(health::aggregate(&full), obsplatform::crd::PlatformHealth::Healthy);
    let next = phase::transition(Phase::Installing, next_input(&full, false));
    assert_eq!(next, Phase::Ready);
}

#[test]
fn test_upgrade_never_reports_unhealthy_with_redundant_replicas() {
    // Scenario: healthy platform at v2.47.0, user bumps to v2.48.0.
    // While the rolling update is in flight with replicas=2, at least
    // one replica stays on the old version and Ready -- health must
    // never read Unhealthy mid-upgrade.
    let ready_phase = Phase::Ready;
    let upgrading = phase::transition(ready_phase, Input::VersionDrift);
    assert_eq!(upgrading, Phase::Upgrading);

    // Rolling: one replica already on the new version and ready, one
    // still converging.
    let mid_upgrade = vec![ready_result("v2.48.0", 1)];
    let health = health::aggregate(&mid_upgrade);
    assert_ne!(health, obsplatform::crd::PlatformHealth::Unhealthy);

    let converged = vec![ready_result("v2.48.0", 2)];
    let final_phase = phase::transition(upgrading, next_input(&converged, false));
    assert_eq!(final_phase, Phase::Ready);

    let statuses = health::conditions(final_phase, health::aggregate(&converged), "t1");
    let ready_cond = statuses
        .iter()
        .find(|c| c.type_ == obsplatform::crd::CONDITION_READY)
        .unwrap();
    assert_eq!(ready_cond.status, "True");
}

#[test]
fn test_retry_budget_exhaustion_drives_install_to_failed() {
    let mut budget = RetryBudget::with_max_attempts(3);
    let mut phase_now = Phase::Installing;

    for _ in 0..3 {
        budget.record_failure();
        let results = vec![failed_result("probe endpoint unreachable")];
        phase_now = phase::transition(phase_now, next_input(&results, budget.exhausted()));
    }

    assert_eq!(phase_now, Phase::Failed);
}

#[test]
fn test_failed_platform_retries_after_spec_change() {
    let phase_now = phase::transition(Phase::Failed, Input::SpecChanged);
    assert_eq!(phase_now, Phase::Installing);
}

#[test]
fn test_degraded_recovers_to_ready_once_probe_passes() {
    let degraded = phase::transition(Phase::Ready, Input::SustainedProbeFailure);
    assert_eq!(degraded, Phase::Degraded);

    let recovered = phase::transition(degraded, Input::HealthRecovered);
    assert_eq!(recovered, Phase::Ready);
}
