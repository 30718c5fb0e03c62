mod common;

use common::{make_platform, with_pvc_retention};
use obsplatform::crd::{ComponentKind, ObservabilityPlatformSpec, PvcRetentionPolicy};
use obsplatform::phase::{self, Input};
use obsplatform::teardown;

// ══════════════════════════════════════════════════════════════════
// End-to-end teardown-ordering tests (no cluster required).
//
// `teardown::run` itself needs a live `Client`, so these exercise the
// pure pieces of the deletion path together: finalizer presence,
// reverse dependency order, PVC retention policy selection, and the
// state-machine transition into `Deleting`.
// ══════════════════════════════════════════════════════════════════

#[test]
fn test_deletion_marker_drives_phase_to_deleting_from_any_state() {
    for phase in [
        obsplatform::crd::Phase::Pending,
        obsplatform::crd::Phase::Installing,
        obsplatform::crd::Phase::Ready,
        obsplatform::crd::Phase::Upgrading,
        obsplatform::crd::Phase::Degraded,
        obsplatform::crd::Phase::Failed,
    ] {
        let next = phase::transition(phase, Input::DeletionRequested);
        assert_eq!(next, obsplatform::crd::Phase::Deleting);
    }
}

#[test]
fn test_deletion_wins_over_simultaneous_spec_change() {
    // Tie-break: if a spec change and a deletion arrive in the same
    // observed generation, deletion wins.
    let after_spec_change = phase::transition(obsplatform::crd::Phase::Ready, Input::SpecChanged);
    let after_deletion = phase::transition(after_spec_change, Input::DeletionRequested);
    assert_eq!(after_deletion, obsplatform::crd::Phase::Deleting);
}

#[test]
fn test_teardown_order_is_frontend_alertrouter_collector_traces_logs_metrics() {
    // Scenario: ordered deletion with all six components enabled.
    let order = teardown::teardown_order();
    assert_eq!(
        order,
        vec![
            ComponentKind::AlertRouter,
            ComponentKind::Frontend,
            ComponentKind::Collector,
            ComponentKind::Traces,
            ComponentKind::Logs,
            ComponentKind::Metrics,
        ]
    );
}

#[test]
fn test_teardown_order_is_exact_reverse_of_install_order() {
    let install_order = ComponentKind::ORDER.to_vec();
    let mut reversed = install_order.clone();
    reversed.reverse();
    assert_eq!(teardown::teardown_order(), reversed);
}

#[test]
fn test_no_finalizer_on_freshly_built_platform() {
    let platform = make_platform("prod", "observability");
    assert!(!teardown::has_finalizer(&platform));
}

#[test]
fn test_pvc_retention_policy_defaults_to_delete() {
    let spec = ObservabilityPlatformSpec::default();
    assert_eq!(spec.pvc_retention_policy.unwrap_or_default(), PvcRetentionPolicy::Delete);
}

#[test]
fn test_pvc_retention_policy_retain_is_explicit() {
    let spec = with_pvc_retention(ObservabilityPlatformSpec::default(), PvcRetentionPolicy::Retain);
    assert_eq!(spec.pvc_retention_policy, Some(PvcRetentionPolicy::Retain));
}
