//! Rendering rules shared by every component manager: deterministic
//! naming, owner-reference wiring, overlay application.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    ConfigMap, Container, Probe, ResourceRequirements, Service, ServicePort, ServiceSpec,
    TCPSocketAction,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::{ComponentKind, GlobalOverlay, ObservabilityPlatform, ResourceEnvelope};

/// Deterministic child object name: `(platform-name, component, role)`.
pub fn child_name(platform_name: &str, component: ComponentKind, role: &str) -> String {
    format!("{platform_name}-{}-{role}", component.as_str())
}

/// Standard label set applied to every child object and merged with
/// the global overlay's external labels.
pub fn standard_labels(
    platform_name: &str,
    component: ComponentKind,
    overlay: Option<&GlobalOverlay>,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/managed-by".to_string(), "observability-platform-operator".to_string());
    labels.insert("app.kubernetes.io/part-of".to_string(), platform_name.to_string());
    labels.insert("app.kubernetes.io/component".to_string(), component.as_str().to_string());
    labels.insert("observability.io/platform".to_string(), platform_name.to_string());

    if let Some(overlay) = overlay {
        for (k, v) in &overlay.external_labels {
            labels.insert(k.clone(), v.clone());
        }
    }
    labels
}

pub fn selector(labels: &BTreeMap<String, String>) -> LabelSelector {
    LabelSelector {
        match_labels: Some(labels.clone()),
        match_expressions: None,
    }
}

/// Build the owner reference pointing back at the platform. Every
/// child materialized by a component manager must carry this so
/// cluster garbage collection can reclaim them once the platform is
/// gone and finalizers are released.
pub fn owner_reference(platform: &ObservabilityPlatform) -> Option<OwnerReference> {
    use kube::ResourceExt;
    let name = platform.meta().name.clone()?;
    let uid = platform.meta().uid.clone()?;
    Some(OwnerReference {
        api_version: "observability.io/v1beta1".to_string(),
        kind: "ObservabilityPlatform".to_string(),
        name,
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

/// Translate a component's resource envelope into `ResourceRequirements`,
/// falling back to a conservative default when a field is absent.
pub fn resource_requirements(envelope: Option<&ResourceEnvelope>) -> ResourceRequirements {
    let e = envelope.cloned().unwrap_or_default();
    let mut requests = BTreeMap::new();
    let mut limits = BTreeMap::new();

    requests.insert("cpu".to_string(), Quantity(e.cpu_request.unwrap_or_else(|| "100m".to_string())));
    requests.insert("memory".to_string(), Quantity(e.memory_request.unwrap_or_else(|| "256Mi".to_string())));
    limits.insert("cpu".to_string(), Quantity(e.cpu_limit.unwrap_or_else(|| "1".to_string())));
    limits.insert("memory".to_string(), Quantity(e.memory_limit.unwrap_or_else(|| "1Gi".to_string())));

    ResourceRequirements {
        requests: Some(requests),
        limits: Some(limits),
        ..Default::default()
    }
}

/// Standard TCP readiness/liveness probe against a container's own port.
pub fn tcp_probe(port: i32, initial_delay_seconds: i32) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay_seconds),
        period_seconds: Some(10),
        ..Default::default()
    }
}

/// Build the ClusterIP `Service` fronting a component's workload pods.
pub fn build_service(
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    owner: Option<OwnerReference>,
    port: i32,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            owner_references: owner.map(|o| vec![o]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(labels.clone()),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port,
                target_port: Some(IntOrString::Int(port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build a `ConfigMap` carrying one component's rendered backend
/// configuration (scrape config, schema config, datasource provisioning,
/// routing tree — whatever the calling manager renders to text).
pub fn build_config_map(
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    owner: Option<OwnerReference>,
    data: BTreeMap<String, String>,
) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            owner_references: owner.map(|o| vec![o]),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

/// The single workload container common to every component: one image,
/// one port, resource envelope, and a TCP probe pair.
pub fn workload_container(
    name: &str,
    image: &str,
    port: i32,
    resources: ResourceRequirements,
) -> Container {
    Container {
        name: name.to_string(),
        image: Some(image.to_string()),
        ports: Some(vec![k8s_openapi::api::core::v1::ContainerPort {
            container_port: port,
            name: Some("http".to_string()),
            ..Default::default()
        }]),
        resources: Some(resources),
        readiness_probe: Some(tcp_probe(port, 5)),
        liveness_probe: Some(tcp_probe(port, 15)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ObservabilityPlatformSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn test_child_name_is_deterministic() {
        let a = child_name("prod", ComponentKind::Metrics, "server");
        let b = child_name("prod", ComponentKind::Metrics, "server");
        assert_eq!(a, b);
        assert_eq!(a, "prod-metrics-server");
    }

    #[test]
    fn test_standard_labels_includes_managed_by() {
        let labels = standard_labels("prod", ComponentKind::Logs, None);
        assert_eq!(
            labels.get("app.kubernetes.io/managed-by"),
            Some(&"observability-platform-operator".to_string())
        );
        assert_eq!(labels.get("app.kubernetes.io/component"), Some(&"logs".to_string()));
    }

    #[test]
    fn test_standard_labels_merges_overlay() {
        let mut overlay = crate::crd::GlobalOverlay::default();
        overlay.external_labels.insert("team".to_string(), "sre".to_string());
        let labels = standard_labels("prod", ComponentKind::Metrics, Some(&overlay));
        assert_eq!(labels.get("team"), Some(&"sre".to_string()));
    }

    #[test]
    fn test_owner_reference_requires_uid() {
        let platform = ObservabilityPlatform::new("prod", ObservabilityPlatformSpec::default());
        assert!(owner_reference(&platform).is_none());
    }

    #[test]
    fn test_owner_reference_populated_when_uid_present() {
        let mut platform = ObservabilityPlatform::new("prod", ObservabilityPlatformSpec::default());
        platform.metadata = ObjectMeta {
            name: Some("prod".to_string()),
            uid: Some("abc-123".to_string()),
            ..Default::default()
        };
        let owner = owner_reference(&platform).unwrap();
        assert_eq!(owner.kind, "ObservabilityPlatform");
        assert_eq!(owner.uid, "abc-123");
        assert_eq!(owner.controller, Some(true));
    }

    #[test]
    fn test_resource_requirements_defaults_when_envelope_absent() {
        let r = resource_requirements(None);
        let requests = r.requests.unwrap();
        assert_eq!(requests.get("cpu"), Some(&Quantity("100m".to_string())));
    }

    #[test]
    fn test_resource_requirements_honors_explicit_values() {
        let envelope = ResourceEnvelope {
            cpu_request: Some("250m".to_string()),
            ..Default::default()
        };
        let r = resource_requirements(Some(&envelope));
        assert_eq!(r.requests.unwrap().get("cpu"), Some(&Quantity("250m".to_string())));
    }

    #[test]
    fn test_build_service_selects_on_labels() {
        let labels = standard_labels("prod", ComponentKind::Metrics, None);
        let svc = build_service("prod-metrics-server", "obs", &labels, None, 9090);
        assert_eq!(svc.spec.unwrap().selector, Some(labels));
    }

    #[test]
    fn test_workload_container_exposes_named_port() {
        let resources = resource_requirements(None);
        let c = workload_container("metrics", "prom/prometheus:v2.48.0", 9090, resources);
        let port = &c.ports.unwrap()[0];
        assert_eq!(port.container_port, 9090);
        assert_eq!(port.name.as_deref(), Some("http"));
    }
}
