//! Error taxonomy. `ReconcileError` carries a stable reason string
//! (surfaced in conditions/events) and converts to/from `kube::Error`
//! at the `Controller::run` boundary so retry/backoff decisions stay
//! centralized in `error_policy` rather than scattered across managers.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing required field, unknown version. Non-retryable.
    Validation,
    /// Referenced secret absent. Retryable with backoff.
    PreconditionMissing,
    /// API server 5xx, timeouts, conflicts. Retryable with backoff.
    Transient,
    /// Sustained probe failure. Does not escalate to Failed.
    ComponentUnhealthy,
    /// Component failed to roll to a new version. Retryable within budget.
    Upgrade,
    /// Owner-reference loop, lease lost. Abandon pass, no local recovery.
    Fatal,
}

impl ErrorKind {
    /// Stable reason string surfaced in conditions and events.
    pub fn reason(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationFailed",
            ErrorKind::PreconditionMissing => "PreconditionMissing",
            ErrorKind::Transient => "TransientError",
            ErrorKind::ComponentUnhealthy => "ComponentUnhealthy",
            ErrorKind::Upgrade => "UpgradeFailed",
            ErrorKind::Fatal => "FatalError",
        }
    }

    /// Whether local recovery (requeue with backoff) should be
    /// attempted for this class. Everything else surfaces to the user
    /// through status/conditions/events with no silent retry.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::PreconditionMissing | ErrorKind::Transient | ErrorKind::Upgrade
        )
    }
}

#[derive(Debug)]
pub struct ReconcileError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ReconcileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn precondition_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PreconditionMissing, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.reason(), self.message)
    }
}

impl std::error::Error for ReconcileError {}

impl From<kube::Error> for ReconcileError {
    fn from(e: kube::Error) -> Self {
        let kind = match &e {
            kube::Error::Api(resp) if resp.code == 409 => ErrorKind::Transient,
            kube::Error::Api(resp) if resp.code >= 500 => ErrorKind::Transient,
            kube::Error::Api(resp) if resp.code == 404 => ErrorKind::PreconditionMissing,
            _ => ErrorKind::Transient,
        };
        ReconcileError::new(kind, e.to_string())
    }
}
