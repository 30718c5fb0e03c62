mod common;

use common::{converging_result, failed_result, make_platform, ready_result};
use obsplatform::crd::{Phase, PlatformHealth, CONDITION_PROGRESSING, CONDITION_READY};
use obsplatform::errors::{ErrorKind, ReconcileError};
use obsplatform::health;
use obsplatform::phase::{self, Input, RetryBudget};

// ══════════════════════════════════════════════════════════════════
// End-to-end health + error-taxonomy pipeline tests (no cluster
// required): component result -> aggregate health -> conditions,
// combined with the error kind a precondition failure would carry.
// ══════════════════════════════════════════════════════════════════

#[test]
fn test_precondition_missing_is_retryable_and_keeps_platform_installing() {
    // Scenario: logs enabled, referenced secret absent. The manager
    // surfaces a PreconditionMissing error; the reconciler must stay
    // in Installing with a backoff requeue, not escalate to Failed.
    let err = ReconcileError::precondition_missing("secret 'logs-s3-creds' not found");
    assert!(err.kind.retryable());
    assert_eq!(err.kind.reason(), "PreconditionMissing");

    let mut budget = RetryBudget::default();
    budget.record_failure();
    assert!(!budget.exhausted(), "one miss must not exhaust the budget");

    let phase_now = phase::transition(Phase::Installing, Input::ComponentsConverging);
    assert_eq!(phase_now, Phase::Installing);
}

#[test]
fn test_precondition_resolves_once_secret_appears() {
    // Upon secret creation, convergence resumes without user
    // intervention: the next pass reports the component Ready and the
    // platform proceeds to Ready.
    let still_missing = vec![converging_result(0, 1)];
    assert_eq!(health::aggregate(&still_missing), PlatformHealth::Unhealthy);

    let resolved = vec![ready_result("v2.9.3", 1)];
    assert_eq!(health::aggregate(&resolved), PlatformHealth::Healthy);

    let next = phase::transition(Phase::Installing, Input::AllComponentsReady);
    assert_eq!(next, Phase::Ready);
}

#[test]
fn test_validation_error_is_not_retryable_and_fails_fast() {
    let err = ReconcileError::validation("unknown metrics version 'vNaN'");
    assert!(!err.kind.retryable());
    assert_eq!(err.kind, ErrorKind::Validation);

    let next = phase::transition(Phase::Pending, Input::PreflightInvalid);
    assert_eq!(next, Phase::Failed);
}

#[test]
fn test_mixed_component_health_yields_progressing_and_non_ready_condition() {
    let results = vec![ready_result("v2.48.0", 1), failed_result("endpoint timeout")];
    let health = health::aggregate(&results);
    assert_eq!(health, PlatformHealth::Degraded);

    let conditions = health::conditions(Phase::Installing, health, "t0");
    let ready = conditions.iter().find(|c| c.type_ == CONDITION_READY).unwrap();
    let progressing = conditions.iter().find(|c| c.type_ == CONDITION_PROGRESSING).unwrap();
    assert_eq!(ready.status, "False");
    assert_eq!(progressing.status, "True");
}

#[test]
fn test_platform_with_no_enabled_components_is_unknown_health() {
    let platform = make_platform("empty", "observability");
    assert!(platform.spec.enabled_components().is_empty());
    assert_eq!(health::aggregate(&[]), PlatformHealth::Unknown);
}
