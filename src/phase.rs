//! The phase state machine: pure transition logic plus the per-platform
//! retry budget. Kept free of any `kube`/cluster dependency so it can
//! be exhaustively unit tested; retries live here and in the
//! reconciler, never inside individual component managers.

use std::time::Duration;

use crate::crd::Phase;

/// Signal the reconciler feeds into the state machine for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// The object carries a deletion timestamp.
    DeletionRequested,
    /// Pre-flight checks (spec valid, quota, referenced secrets) passed.
    PreflightOk,
    /// Pre-flight checks failed in a way that cannot be retried.
    PreflightInvalid,
    /// At least one enabled component is still converging.
    ComponentsConverging,
    /// Every enabled component reports Ready at the spec's version.
    AllComponentsReady,
    /// The retry budget for the current phase is exhausted and the
    /// last error was classified non-transient.
    RetryBudgetExhausted,
    /// The spec's component versions no longer match the observed ones.
    VersionDrift,
    /// A component probe has failed for longer than the degrade window.
    SustainedProbeFailure,
    /// Health has recovered after a Degraded period.
    HealthRecovered,
    /// Nothing changed since the last pass (periodic resync).
    NoChange,
    /// The generation was bumped (a spec edit landed) or the manual
    /// retry annotation was toggled.
    SpecChanged,
}

/// Drive one state-machine step. Pure function: same `(phase, input)`
/// always yields the same next `Phase`.
pub fn transition(phase: Phase, input: Input) -> Phase {
    // Deletion always wins, from any non-Deleting state: if a spec
    // change and a deletion arrive in the same observed generation,
    // deletion wins.
    if input == Input::DeletionRequested && phase != Phase::Deleting {
        return Phase::Deleting;
    }

    match (phase, input) {
        (Phase::Pending, Input::PreflightOk) => Phase::Installing,
        (Phase::Pending, Input::PreflightInvalid) => Phase::Failed,

        (Phase::Installing, Input::ComponentsConverging) => Phase::Installing,
        (Phase::Installing, Input::AllComponentsReady) => Phase::Ready,
        (Phase::Installing, Input::RetryBudgetExhausted) => Phase::Failed,

        (Phase::Ready, Input::VersionDrift) => Phase::Upgrading,
        (Phase::Ready, Input::SustainedProbeFailure) => Phase::Degraded,
        (Phase::Ready, Input::NoChange) => Phase::Ready,

        (Phase::Upgrading, Input::AllComponentsReady) => Phase::Ready,
        (Phase::Upgrading, Input::ComponentsConverging) => Phase::Upgrading,
        (Phase::Upgrading, Input::RetryBudgetExhausted) => Phase::Failed,

        (Phase::Degraded, Input::HealthRecovered) => Phase::Ready,
        (Phase::Degraded, _) => Phase::Degraded,

        (Phase::Failed, Input::SpecChanged) => Phase::Installing,
        (Phase::Failed, _) => Phase::Failed,

        // Unhandled (phase, input) combinations are no-ops: stay put.
        // This keeps the function total without silently accepting an
        // invalid jump (e.g. Pending -> Ready directly).
        (current, _) => current,
    }
}

/// Exponential backoff with a cap, reset on phase change or generation
/// bump. Defaults: 10s initial, factor 2, cap 5m, 5 max attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub attempts: u32,
    pub max_attempts: u32,
    initial: Duration,
    cap: Duration,
    factor: u32,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            attempts: 0,
            max_attempts: 5,
            initial: Duration::from_secs(10),
            cap: Duration::from_secs(300),
            factor: 2,
        }
    }
}

impl RetryBudget {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Record one failed attempt and return the backoff to wait before
    /// the next one.
    pub fn record_failure(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.backoff()
    }

    /// The backoff that would apply for the current attempt count,
    /// without mutating it.
    pub fn backoff(&self) -> Duration {
        let exp = self.attempts.min(20); // guard against overflow in pow
        let scaled = self.initial.saturating_mul(self.factor.saturating_pow(exp));
        scaled.min(self.cap)
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
