use obsplatform::crd::{
    ComponentKind, ComponentSpec, FrontendSpec, GitOpsReference, HighAvailability,
    ObservabilityPlatform, ObservabilityPlatformSpec, Phase, PvcRetentionPolicy, StorageEnvelope,
    SyncPolicy,
};
use obsplatform::health::ComponentResult;
use obsplatform::phase::Input;

/// Build a minimal `ObservabilityPlatform` with the given name/namespace,
/// no components enabled. Tests enable the components they need.
pub fn make_platform(name: &str, namespace: &str) -> ObservabilityPlatform {
    let mut platform = ObservabilityPlatform::new(name, ObservabilityPlatformSpec::default());
    platform.metadata.namespace = Some(namespace.to_string());
    platform.metadata.generation = Some(1);
    platform
}

/// A component spec with just a version and replica count set, the
/// shape a user would author by hand before defaulting runs.
pub fn component_spec(version: &str, replicas: i32) -> ComponentSpec {
    ComponentSpec {
        version: Some(version.to_string()),
        replicas: Some(replicas),
        ..Default::default()
    }
}

pub fn component_spec_with_storage(version: &str, replicas: i32, size: &str) -> ComponentSpec {
    ComponentSpec {
        storage: Some(StorageEnvelope {
            size: size.to_string(),
            storage_class: None,
        }),
        ..component_spec(version, replicas)
    }
}

pub fn frontend_spec(version: &str, replicas: i32) -> FrontendSpec {
    FrontendSpec {
        common: component_spec(version, replicas),
        ..Default::default()
    }
}

pub fn with_ha(mut spec: ObservabilityPlatformSpec) -> ObservabilityPlatformSpec {
    spec.high_availability = Some(HighAvailability { enabled: true });
    spec
}

pub fn with_pvc_retention(
    mut spec: ObservabilityPlatformSpec,
    policy: PvcRetentionPolicy,
) -> ObservabilityPlatformSpec {
    spec.pvc_retention_policy = Some(policy);
    spec
}

pub fn git_ops_reference(repo_url: &str, branch: &str, webhook_secret_ref: &str) -> GitOpsReference {
    GitOpsReference {
        repo_url: repo_url.to_string(),
        branch: Some(branch.to_string()),
        path: None,
        sync_policy: SyncPolicy::Automatic,
        webhook_secret_ref: Some(webhook_secret_ref.to_string()),
        target_revision: None,
    }
}

/// A `ComponentResult` as a manager would report it mid-install: still
/// converging, N of M replicas ready.
pub fn converging_result(ready: i32, desired: i32) -> ComponentResult {
    ComponentResult {
        phase: Phase::Installing,
        version: None,
        ready_replicas: ready,
        desired_replicas: desired,
        message: format!("{ready}/{desired} replicas ready"),
        probed: true,
    }
}

/// A `ComponentResult` as a manager would report it once fully
/// converged at the given version.
pub fn ready_result(version: &str, replicas: i32) -> ComponentResult {
    ComponentResult {
        phase: Phase::Ready,
        version: Some(version.to_string()),
        ready_replicas: replicas,
        desired_replicas: replicas,
        message: format!("{replicas}/{replicas} replicas ready"),
        probed: true,
    }
}

pub fn failed_result(message: &str) -> ComponentResult {
    ComponentResult {
        phase: Phase::Failed,
        version: None,
        ready_replicas: 0,
        desired_replicas: 1,
        message: message.to_string(),
        probed: true,
    }
}

/// Drive the phase state machine the way the reconciler would for one
/// pass: if any component failed, feed `ComponentsConverging` or
/// `RetryBudgetExhausted` depending on the retry budget; if every
/// component is Ready, feed `AllComponentsReady`; otherwise
/// `ComponentsConverging`.
pub fn next_input(results: &[ComponentResult], budget_exhausted: bool) -> Input {
    if results.is_empty() {
        return Input::PreflightInvalid;
    }
    if results.iter().any(|r| r.phase == Phase::Failed) {
        return if budget_exhausted {
            Input::RetryBudgetExhausted
        } else {
            Input::ComponentsConverging
        };
    }
    if results.iter().all(|r| r.is_ready()) {
        Input::AllComponentsReady
    } else {
        Input::ComponentsConverging
    }
}

pub fn enabled_kinds(spec: &ObservabilityPlatformSpec) -> Vec<ComponentKind> {
    spec.enabled_components()
}
