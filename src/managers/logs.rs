//! Manages the logs backend (a Loki-compatible StatefulSet): ConfigMap
//! with schema config, a Service, and a StatefulSet with an optional
//! PVC per replica.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec, PodTemplateSpec,
    ResourceRequirements as PvcResources,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crate::crd::{ComponentKind, ObservabilityPlatform};
use crate::defaulter::default_component;
use crate::errors::ReconcileError;
use crate::gateway::{ClusterGateway, DeletePolicy};
use crate::health::ComponentResult;
use crate::managers::render;
use crate::managers::{phase_from_sample, ComponentManager, HealthSample};

const PORT: i32 = 3100;

pub struct LogsManager;

fn schema_config(retention: Option<&str>) -> String {
    let retention = retention.unwrap_or("336h");
    format!(
        "schema_config:\n  configs:\n    - from: 2020-01-01\n      store: boltdb-shipper\n      object_store: filesystem\n      schema: v12\nlimits_config:\n  retention_period: {retention}\n"
    )
}

impl LogsManager {
    fn namespace(platform: &ObservabilityPlatform) -> String {
        platform.namespace().unwrap_or_default()
    }

    fn render(
        &self,
        platform: &ObservabilityPlatform,
    ) -> Option<(StatefulSet, k8s_openapi::api::core::v1::Service, k8s_openapi::api::core::v1::ConfigMap)> {
        let spec = platform.spec.logs.clone()?;
        let spec = default_component(ComponentKind::Logs, &spec, platform.spec.is_ha());
        let namespace = Self::namespace(platform);
        let name = render::child_name(&platform.name_any(), ComponentKind::Logs, "server");
        let labels = render::standard_labels(&platform.name_any(), ComponentKind::Logs, platform.spec.global.as_ref());
        let owner = render::owner_reference(platform);

        let cm_name = render::child_name(&platform.name_any(), ComponentKind::Logs, "config");
        let mut data = BTreeMap::new();
        data.insert("loki.yml".to_string(), schema_config(spec.retention.as_deref()));
        let config_map = render::build_config_map(&cm_name, &namespace, &labels, owner.clone(), data);

        let service = render::build_service(&name, &namespace, &labels, owner.clone(), PORT);

        let image = format!("grafana/loki:{}", spec.version.as_deref().unwrap_or("latest"));
        let container = render::workload_container("logs", &image, PORT, render::resource_requirements(spec.resources.as_ref()));

        let volume_claim_templates = spec.storage.as_ref().map(|storage| {
            let mut requests = BTreeMap::new();
            requests.insert("storage".to_string(), Quantity(storage.size.clone()));
            vec![PersistentVolumeClaim {
                metadata: ObjectMeta {
                    name: Some("data".to_string()),
                    ..Default::default()
                },
                spec: Some(PersistentVolumeClaimSpec {
                    access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                    storage_class_name: storage.storage_class.clone(),
                    resources: Some(PvcResources {
                        requests: Some(requests),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]
        });

        let statefulset = StatefulSet {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(namespace.clone()),
                labels: Some(labels.clone()),
                owner_references: owner.map(|o| vec![o]),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec {
                service_name: name.clone(),
                replicas: spec.replicas,
                selector: render::selector(&labels),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels.clone()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        ..Default::default()
                    }),
                },
                volume_claim_templates,
                ..Default::default()
            }),
            ..Default::default()
        };

        Some((statefulset, service, config_map))
    }
}

#[async_trait]
impl ComponentManager for LogsManager {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Logs
    }

    async fn reconcile(
        &self,
        gateway: &ClusterGateway,
        platform: &ObservabilityPlatform,
    ) -> Result<ComponentResult, ReconcileError> {
        let Some((statefulset, service, config_map)) = self.render(platform) else {
            return Err(ReconcileError::validation("logs component is not enabled"));
        };
        let namespace = Self::namespace(platform);

        gateway.apply(&namespace, &config_map).await?;
        gateway.apply(&namespace, &service).await?;
        let applied = gateway.apply(&namespace, &statefulset).await?;

        let sample = self.probe(gateway, platform).await?;
        let desired = applied.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let phase = phase_from_sample(&sample, true);

        Ok(ComponentResult {
            phase,
            version: platform.spec.logs.as_ref().and_then(|c| c.version.clone()),
            ready_replicas: sample.ready_replicas,
            desired_replicas: desired,
            message: format!("{}/{} replicas ready", sample.ready_replicas, desired),
            probed: true,
        })
    }

    async fn teardown(&self, gateway: &ClusterGateway, platform: &ObservabilityPlatform) -> Result<bool, ReconcileError> {
        let namespace = Self::namespace(platform);
        let name = render::child_name(&platform.name_any(), ComponentKind::Logs, "server");
        let cm_name = render::child_name(&platform.name_any(), ComponentKind::Logs, "config");

        gateway.delete::<StatefulSet>(&namespace, &name, DeletePolicy::Foreground).await?;
        gateway.delete::<k8s_openapi::api::core::v1::Service>(&namespace, &name, DeletePolicy::Background).await?;
        gateway.delete::<k8s_openapi::api::core::v1::ConfigMap>(&namespace, &cm_name, DeletePolicy::Background).await?;

        Ok(gateway.get::<StatefulSet>(&namespace, &name).await?.is_none())
    }

    async fn probe(&self, gateway: &ClusterGateway, platform: &ObservabilityPlatform) -> Result<HealthSample, ReconcileError> {
        let namespace = Self::namespace(platform);
        let name = render::child_name(&platform.name_any(), ComponentKind::Logs, "server");
        let Some(spec) = platform.spec.logs.as_ref() else {
            return Err(ReconcileError::validation("logs component is not enabled"));
        };
        let defaulted = default_component(ComponentKind::Logs, spec, platform.spec.is_ha());
        let desired_replicas = defaulted.replicas.unwrap_or(1);

        let Some(observed) = gateway.get::<StatefulSet>(&namespace, &name).await? else {
            return Ok(HealthSample {
                ready_replicas: 0,
                desired_replicas,
                version_matches: false,
                probe_endpoint_ok: false,
            });
        };

        let ready_replicas = observed.status.as_ref().map(|s| s.ready_replicas.unwrap_or(0)).unwrap_or(0);
        let image = observed
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|p| p.containers.first())
            .and_then(|c| c.image.clone());
        let expected_image = format!("grafana/loki:{}", defaulted.version.as_deref().unwrap_or("latest"));
        let version_matches = image.as_deref() == Some(expected_image.as_str());

        Ok(HealthSample {
            ready_replicas,
            desired_replicas,
            version_matches,
            probe_endpoint_ok: ready_replicas > 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ComponentSpec, ObservabilityPlatformSpec};

    #[test]
    fn test_render_none_when_logs_disabled() {
        let platform = ObservabilityPlatform::new("prod", ObservabilityPlatformSpec::default());
        assert!(LogsManager.render(&platform).is_none());
    }

    #[test]
    fn test_schema_config_defaults_retention() {
        let rendered = schema_config(None);
        assert!(rendered.contains("336h"));
    }

    #[test]
    fn test_render_service_targets_loki_port() {
        let mut platform = ObservabilityPlatform::new(
            "prod",
            ObservabilityPlatformSpec {
                logs: Some(ComponentSpec::default()),
                ..Default::default()
            },
        );
        platform.metadata.namespace = Some("obs".to_string());
        let (_, svc, _) = LogsManager.render(&platform).unwrap();
        assert_eq!(svc.spec.unwrap().ports.unwrap()[0].port, PORT);
    }
}
