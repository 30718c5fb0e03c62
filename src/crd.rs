use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    LocalObjectReference, PodSecurityContext, Toleration,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/* ============================= PHASE ============================= */

/// Coarse platform lifecycle state, used for user communication and as
/// the state-machine node label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum Phase {
    #[default]
    Pending,
    Installing,
    Ready,
    Upgrading,
    Failed,
    Degraded,
    Deleting,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Aggregate platform health, combining all enabled components' probes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum PlatformHealth {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Unknown,
}

impl std::fmt::Display for PlatformHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// GitOps provider sync phase, surfaced from the external application
/// controller (or from the bridge's own spec-patch path).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum SyncPhase {
    Synced,
    OutOfSync,
    Syncing,
    #[default]
    Unknown,
}

/* ============================= COMPONENTS ============================= */

/// One of the six managed observability subsystems.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    Metrics,
    Logs,
    Traces,
    Collector,
    Frontend,
    AlertRouter,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Metrics => "metrics",
            ComponentKind::Logs => "logs",
            ComponentKind::Traces => "traces",
            ComponentKind::Collector => "collector",
            ComponentKind::Frontend => "frontend",
            ComponentKind::AlertRouter => "alertRouter",
        }
    }

    /// Dependency order for install/upgrade: storage backends first,
    /// then the collector, then the frontend, then the alert router.
    /// Teardown uses the reverse of this slice.
    pub const ORDER: &'static [ComponentKind] = &[
        ComponentKind::Metrics,
        ComponentKind::Logs,
        ComponentKind::Traces,
        ComponentKind::Collector,
        ComponentKind::Frontend,
        ComponentKind::AlertRouter,
    ];
}

/// Resource envelope applied to a component's workload containers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
}

/// Storage envelope for components that persist data (metrics, logs, traces).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageEnvelope {
    /// Requested PVC size, e.g. "50Gi".
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

/// Per-component configuration shared by every one of the six backends.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Image/chart version. Defaulted by the Resource Defaulter when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Desired replica count. Raised to the HA floor when
    /// `highAvailability.enabled` is set, regardless of this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceEnvelope>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageEnvelope>,

    /// Retention window, e.g. "15d". Backend-specific interpretation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<String>,

    /// Opaque backend-specific knobs passed through to the rendered
    /// ConfigMap verbatim (e.g. Prometheus scrape intervals, Loki
    /// schema config). Not validated by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_config: Option<serde_json::Value>,
}

/// Frontend (Grafana) specific knobs, layered on top of `ComponentSpec`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FrontendSpec {
    #[serde(flatten)]
    pub common: ComponentSpec,

    /// Reference to a Secret holding the admin password. The Resource
    /// Defaulter generates and creates one if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password_secret_ref: Option<String>,

    /// Enable the Ingress for the frontend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_host: Option<String>,
}

/* ============================= GLOBAL OVERLAY ============================= */

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GlobalOverlay {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HighAvailability {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackupPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AlertRoute {
    pub receiver: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

/// Failure policy when a storage backend's own schema migration
/// fails during an upgrade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SchemaMigrationFailureAction {
    #[default]
    Degrade,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_migration_failure_action: Option<SchemaMigrationFailureAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RetryBudgetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// Synchronization policy requested by the user for the GitOps reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SyncPolicy {
    #[default]
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsReference {
    pub repo_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub sync_policy: SyncPolicy,

    /// Name of the Secret (in the platform's namespace) holding the
    /// webhook signing secret for this reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret_ref: Option<String>,

    /// Revision currently targeted. Written by the GitOps Bridge,
    /// readable/settable by the user for manual rollback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision: Option<String>,
}

/* ============================= SPEC ============================= */

/// ObservabilityPlatform declares one composite observability stack:
/// coordinated Prometheus/Loki/Tempo/Grafana/Alertmanager/OTel-collector
/// deployments reconciled as a single unit.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "observability.io",
    version = "v1beta1",
    kind = "ObservabilityPlatform",
    plural = "observabilityplatforms",
    status = "ObservabilityPlatformStatus",
    namespaced,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Health", "type":"string", "jsonPath":".status.health"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.readyComponents"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.metrics.version"}"#,
    printcolumn = r#"{"name":"Components", "type":"string", "jsonPath":".status.componentPhases", "priority":1}"#,
    printcolumn = r#"{"name":"Message", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].message", "priority":1}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityPlatformSpec {
    /// When true, the reconciler writes a Paused condition and takes no
    /// further action until cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ComponentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<ComponentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traces: Option<ComponentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector: Option<ComponentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend: Option<FrontendSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_router: Option<ComponentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_availability: Option<HighAvailability>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_policy: Option<BackupPolicy>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alerting_routes: Vec<AlertRoute>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_ops: Option<GitOpsReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<GlobalOverlay>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_policy: Option<UpgradePolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_budget: Option<RetryBudgetSpec>,

    /// Reclaim policy for PVCs on platform deletion. Default `Delete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc_retention_policy: Option<PvcRetentionPolicy>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PvcRetentionPolicy {
    #[default]
    Delete,
    Retain,
}

impl ObservabilityPlatformSpec {
    /// Iterate over the enabled components in dependency order.
    pub fn enabled_components(&self) -> Vec<ComponentKind> {
        ComponentKind::ORDER
            .iter()
            .copied()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }

    pub fn is_enabled(&self, kind: ComponentKind) -> bool {
        match kind {
            ComponentKind::Metrics => self.metrics.is_some(),
            ComponentKind::Logs => self.logs.is_some(),
            ComponentKind::Traces => self.traces.is_some(),
            ComponentKind::Collector => self.collector.is_some(),
            ComponentKind::Frontend => self.frontend.is_some(),
            ComponentKind::AlertRouter => self.alert_router.is_some(),
        }
    }

    pub fn component(&self, kind: ComponentKind) -> Option<ComponentSpec> {
        match kind {
            ComponentKind::Metrics => self.metrics.clone(),
            ComponentKind::Logs => self.logs.clone(),
            ComponentKind::Traces => self.traces.clone(),
            ComponentKind::Collector => self.collector.clone(),
            ComponentKind::Frontend => self.frontend.clone().map(|f| f.common),
            ComponentKind::AlertRouter => self.alert_router.clone(),
        }
    }

    pub fn is_ha(&self) -> bool {
        self.high_availability.as_ref().is_some_and(|ha| ha.enabled)
    }
}

/* ============================= STATUS ============================= */

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
    pub last_transition_time: String,
}

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_PROGRESSING: &str = "Progressing";
pub const CONDITION_AVAILABLE: &str = "Available";
pub const CONDITION_DEGRADED: &str = "Degraded";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_phase: Option<SyncPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<String>,
}

/// ObservabilityPlatformStatus reports the observed convergence state.
/// Writable only through the `status` subresource by the operator's
/// own service identity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityPlatformStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<PlatformHealth>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, ComponentStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoints: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_ops: Option<GitOpsStatus>,

    /// Aggregate healthy-component count, e.g. `"2/3"`. Surfaced as a
    /// printer column so `kubectl get` shows progress without `-o wide`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_components: Option<String>,

    /// Per-component phase, e.g. `"metrics=Ready,logs=Installing"`.
    /// Wide/priority-1 printer column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_phases: Option<String>,
}

impl ObservabilityPlatformStatus {
    pub fn set_condition(&mut self, type_: &str, status: bool, reason: &str, message: &str, now: &str) {
        let status_str = if status { "True" } else { "False" };
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.type_ == type_) {
            if existing.status != status_str || existing.reason != reason {
                existing.last_transition_time = now.to_string();
            }
            existing.status = status_str.to_string();
            existing.reason = reason.to_string();
            existing.message = message.to_string();
        } else {
            self.conditions.push(Condition {
                type_: type_.to_string(),
                status: status_str.to_string(),
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: now.to_string(),
            });
        }
    }
}

/* ============================= AUDIT TRAIL ============================= */

/// One recorded GitOps sync attempt for a platform. Retained to the
/// last `REVISION_RETENTION` entries per platform, the same rolling
/// retention the reconciler applies to its own audit trail.
pub const REVISION_RETENTION: usize = 10;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "observability.io",
    version = "v1beta1",
    kind = "ObservabilityPlatformRevision",
    plural = "observabilityplatformrevisions",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityPlatformRevisionSpec {
    pub platform_name: String,
    pub repo_url: String,
    pub revision: String,
    pub provider: String,
    pub timestamp: String,
    pub sync_phase: SyncPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/* ============================= CRD GENERATION ============================= */

/// Build both `CustomResourceDefinition`s this operator owns, with
/// `ObservabilityPlatform` carrying both the `v1beta1` (storage,
/// authoritative) and `v1alpha1` (served, sharing the same schema)
/// versions.
pub fn merged_platform_crd(
) -> k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition {
    use kube::CustomResourceExt;

    let mut crd = ObservabilityPlatform::crd();
    if let Some(v1beta1) = crd.spec.versions.first().cloned() {
        let mut v1alpha1 = v1beta1.clone();
        v1alpha1.name = "v1alpha1".to_string();
        v1alpha1.storage = false;
        v1alpha1.served = true;
        crd.spec.versions.push(v1alpha1);
    }
    crd
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_crd_generates_valid_yaml() {
        let crd = ObservabilityPlatform::crd();
        let yaml = serde_yaml::to_string(&crd).expect("CRD should serialize to YAML");
        assert!(yaml.contains("observability.io"));
        assert!(yaml.contains("ObservabilityPlatform"));
        assert!(yaml.contains("observabilityplatforms"));
    }

    #[test]
    fn test_crd_is_namespaced() {
        let crd = ObservabilityPlatform::crd();
        assert_eq!(crd.spec.scope, "Namespaced");
    }

    #[test]
    fn test_merged_crd_has_two_versions() {
        let crd = merged_platform_crd();
        let names: Vec<&str> = crd.spec.versions.iter().map(|v| v.name.as_str()).collect();
        assert!(names.contains(&"v1beta1"));
        assert!(names.contains(&"v1alpha1"));
    }

    #[test]
    fn test_merged_crd_v1beta1_is_storage_version() {
        let crd = merged_platform_crd();
        let storage: Vec<&str> = crd
            .spec
            .versions
            .iter()
            .filter(|v| v.storage)
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(storage, vec!["v1beta1"]);
    }

    #[test]
    fn test_enabled_components_respects_order() {
        let spec = ObservabilityPlatformSpec {
            alert_router: Some(ComponentSpec::default()),
            metrics: Some(ComponentSpec::default()),
            frontend: Some(FrontendSpec::default()),
            ..Default::default()
        };
        let enabled = spec.enabled_components();
        assert_eq!(
            enabled,
            vec![ComponentKind::Metrics, ComponentKind::Frontend, ComponentKind::AlertRouter]
        );
    }

    #[test]
    fn test_is_enabled_false_when_absent() {
        let spec = ObservabilityPlatformSpec::default();
        assert!(!spec.is_enabled(ComponentKind::Logs));
    }

    #[test]
    fn test_is_ha_default_false() {
        let spec = ObservabilityPlatformSpec::default();
        assert!(!spec.is_ha());
    }

    #[test]
    fn test_set_condition_creates_new() {
        let mut status = ObservabilityPlatformStatus::default();
        status.set_condition(CONDITION_READY, true, "AllComponentsReady", "ok", "t0");
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].status, "True");
    }

    #[test]
    fn test_set_condition_updates_existing_without_duplicating() {
        let mut status = ObservabilityPlatformStatus::default();
        status.set_condition(CONDITION_READY, true, "AllComponentsReady", "ok", "t0");
        status.set_condition(CONDITION_READY, false, "ComponentFailed", "bad", "t1");
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].status, "False");
        assert_eq!(status.conditions[0].last_transition_time, "t1");
    }

    #[test]
    fn test_set_condition_stable_status_keeps_transition_time() {
        let mut status = ObservabilityPlatformStatus::default();
        status.set_condition(CONDITION_READY, true, "AllComponentsReady", "ok", "t0");
        status.set_condition(CONDITION_READY, true, "AllComponentsReady", "still ok", "t1");
        assert_eq!(status.conditions[0].last_transition_time, "t0");
        assert_eq!(status.conditions[0].message, "still ok");
    }

    #[test]
    fn test_status_omits_none_fields() {
        let status = ObservabilityPlatformStatus {
            health: Some(PlatformHealth::Healthy),
            ..Default::default()
        };
        let json = serde_json::to_string(&status).expect("should serialize");
        assert!(json.contains("health"));
        assert!(!json.contains("observedGeneration"));
        assert!(!json.contains("retryCount"));
    }

    #[test]
    fn test_spec_roundtrip() {
        let spec = ObservabilityPlatformSpec {
            metrics: Some(ComponentSpec {
                version: Some("v2.48.0".to_string()),
                replicas: Some(1),
                ..Default::default()
            }),
            high_availability: Some(HighAvailability { enabled: true }),
            ..Default::default()
        };
        let json = serde_json::to_string(&spec).expect("should serialize");
        let deserialized: ObservabilityPlatformSpec =
            serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(
            deserialized.metrics.as_ref().unwrap().version.as_deref(),
            Some("v2.48.0")
        );
        assert!(deserialized.is_ha());
    }

    #[test]
    fn test_component_spec_backward_compat_empty_object() {
        let json = r#"{}"#;
        let spec: ComponentSpec = serde_json::from_str(json).expect("empty object deserializes");
        assert_eq!(spec.version, None);
        assert_eq!(spec.replicas, None);
    }
}
