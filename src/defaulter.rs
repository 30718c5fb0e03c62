//! The resource defaulter: applies defaults once at admission time.
//! Pure functions, unit-tested directly without standing up a webhook
//! server.

use base64::Engine;
use rand::RngCore;

use crate::crd::{ComponentKind, ComponentSpec, ObservabilityPlatformSpec};

/// Known-good pinned versions applied when a component's `version`
/// field is absent.
pub fn default_version(kind: ComponentKind) -> &'static str {
    match kind {
        ComponentKind::Metrics => "v2.48.0",
        ComponentKind::Logs => "v2.9.3",
        ComponentKind::Traces => "v2.3.1",
        ComponentKind::Collector => "v0.91.0",
        ComponentKind::Frontend => "v10.2.2",
        ComponentKind::AlertRouter => "v0.26.0",
    }
}

/// HA-derived replica floor for a component. When
/// `highAvailability.enabled`, the floor wins over a lower explicit
/// replica count.
pub fn ha_replica_floor(kind: ComponentKind) -> i32 {
    match kind {
        ComponentKind::Metrics => 3,
        ComponentKind::Logs => 3,
        ComponentKind::Traces => 3,
        ComponentKind::Collector => 2,
        ComponentKind::Frontend => 2,
        ComponentKind::AlertRouter => 3,
    }
}

/// Apply version default and HA-aware replica floor to one component's
/// spec, returning the defaulted copy. Does not mutate its input.
pub fn default_component(kind: ComponentKind, spec: &ComponentSpec, ha: bool) -> ComponentSpec {
    let mut out = spec.clone();

    if out.version.is_none() {
        out.version = Some(default_version(kind).to_string());
    }

    let explicit = out.replicas.unwrap_or(1);
    out.replicas = Some(if ha {
        explicit.max(ha_replica_floor(kind))
    } else {
        explicit
    });

    out
}

/// Apply defaulting to every enabled component of a platform spec,
/// returning a fully-defaulted copy. Run once per generation bump from
/// the admission path.
pub fn default_platform_spec(spec: &ObservabilityPlatformSpec) -> ObservabilityPlatformSpec {
    let mut out = spec.clone();
    let ha = spec.is_ha();

    if let Some(c) = &spec.metrics {
        out.metrics = Some(default_component(ComponentKind::Metrics, c, ha));
    }
    if let Some(c) = &spec.logs {
        out.logs = Some(default_component(ComponentKind::Logs, c, ha));
    }
    if let Some(c) = &spec.traces {
        out.traces = Some(default_component(ComponentKind::Traces, c, ha));
    }
    if let Some(c) = &spec.collector {
        out.collector = Some(default_component(ComponentKind::Collector, c, ha));
    }
    if let Some(f) = &spec.frontend {
        let mut f = f.clone();
        f.common = default_component(ComponentKind::Frontend, &f.common, ha);
        out.frontend = Some(f);
    }
    if let Some(c) = &spec.alert_router {
        out.alert_router = Some(default_component(ComponentKind::AlertRouter, c, ha));
    }

    out
}

/// Derive the `observability.io/environment` label: copied from the
/// namespace's own label if present, else "unspecified".
pub fn derive_environment_label(namespace_labels: &std::collections::BTreeMap<String, String>) -> String {
    namespace_labels
        .get("observability.io/environment")
        .cloned()
        .unwrap_or_else(|| "unspecified".to_string())
}

/// Length (in raw bytes, before base64 encoding) of a generated
/// Grafana admin password.
const GENERATED_PASSWORD_BYTES: usize = 24;

/// Generate a cryptographically random admin password for the
/// frontend component, base64-encoded for direct use as a Secret
/// `stringData` value. Called once at first admission when
/// `frontend.adminPasswordSecretRef` is absent, and again only if that
/// Secret is deleted out-of-band.
pub fn generate_admin_password() -> String {
    let mut bytes = [0u8; GENERATED_PASSWORD_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
