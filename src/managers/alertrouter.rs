//! Manages the alert router (an Alertmanager-compatible Deployment):
//! ConfigMap rendering the routing tree from `alertingRoutes`, and a
//! Service.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crate::crd::{AlertRoute, ComponentKind, ObservabilityPlatform};
use crate::defaulter::default_component;
use crate::errors::ReconcileError;
use crate::gateway::{ClusterGateway, DeletePolicy};
use crate::health::ComponentResult;
use crate::managers::render;
use crate::managers::{phase_from_sample, ComponentManager, HealthSample};

const PORT: i32 = 9093;

pub struct AlertRouterManager;

fn routing_config(routes: &[AlertRoute]) -> String {
    if routes.is_empty() {
        return "route:\n  receiver: default\nreceivers:\n  - name: default\n".to_string();
    }
    let mut rendered = "route:\n  receiver: default\n  routes:\n".to_string();
    for route in routes {
        rendered.push_str(&format!("    - receiver: {}\n", route.receiver));
        for (k, v) in &route.match_labels {
            rendered.push_str(&format!("      match:\n        {k}: {v}\n"));
        }
    }
    rendered.push_str("receivers:\n  - name: default\n");
    for route in routes {
        rendered.push_str(&format!("  - name: {}\n", route.receiver));
    }
    rendered
}

impl AlertRouterManager {
    fn namespace(platform: &ObservabilityPlatform) -> String {
        platform.namespace().unwrap_or_default()
    }

    fn render(
        &self,
        platform: &ObservabilityPlatform,
    ) -> Option<(Deployment, k8s_openapi::api::core::v1::Service, k8s_openapi::api::core::v1::ConfigMap)> {
        let spec = platform.spec.alert_router.clone()?;
        let spec = default_component(ComponentKind::AlertRouter, &spec, platform.spec.is_ha());
        let namespace = Self::namespace(platform);
        let name = render::child_name(&platform.name_any(), ComponentKind::AlertRouter, "server");
        let labels = render::standard_labels(&platform.name_any(), ComponentKind::AlertRouter, platform.spec.global.as_ref());
        let owner = render::owner_reference(platform);

        let cm_name = render::child_name(&platform.name_any(), ComponentKind::AlertRouter, "config");
        let mut data = BTreeMap::new();
        data.insert("alertmanager.yml".to_string(), routing_config(&platform.spec.alerting_routes));
        let config_map = render::build_config_map(&cm_name, &namespace, &labels, owner.clone(), data);

        let service = render::build_service(&name, &namespace, &labels, owner.clone(), PORT);

        let image = format!("prom/alertmanager:{}", spec.version.as_deref().unwrap_or("latest"));
        let container = render::workload_container("alertrouter", &image, PORT, render::resource_requirements(spec.resources.as_ref()));

        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(namespace.clone()),
                labels: Some(labels.clone()),
                owner_references: owner.map(|o| vec![o]),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
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
                ..Default::default()
            }),
            ..Default::default()
        };

        Some((deployment, service, config_map))
    }
}

#[async_trait]
impl ComponentManager for AlertRouterManager {
    fn kind(&self) -> ComponentKind {
        ComponentKind::AlertRouter
    }

    async fn reconcile(
        &self,
        gateway: &ClusterGateway,
        platform: &ObservabilityPlatform,
    ) -> Result<ComponentResult, ReconcileError> {
        let Some((deployment, service, config_map)) = self.render(platform) else {
            return Err(ReconcileError::validation("alert router component is not enabled"));
        };
        let namespace = Self::namespace(platform);

        gateway.apply(&namespace, &config_map).await?;
        gateway.apply(&namespace, &service).await?;
        let applied = gateway.apply(&namespace, &deployment).await?;

        let sample = self.probe(gateway, platform).await?;
        let desired = applied.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let phase = phase_from_sample(&sample, true);

        Ok(ComponentResult {
            phase,
            version: platform.spec.alert_router.as_ref().and_then(|c| c.version.clone()),
            ready_replicas: sample.ready_replicas,
            desired_replicas: desired,
            message: format!("{}/{} replicas ready", sample.ready_replicas, desired),
            probed: true,
        })
    }

    async fn teardown(&self, gateway: &ClusterGateway, platform: &ObservabilityPlatform) -> Result<bool, ReconcileError> {
        let namespace = Self::namespace(platform);
        let name = render::child_name(&platform.name_any(), ComponentKind::AlertRouter, "server");
        let cm_name = render::child_name(&platform.name_any(), ComponentKind::AlertRouter, "config");

        gateway.delete::<Deployment>(&namespace, &name, DeletePolicy::Foreground).await?;
        gateway.delete::<k8s_openapi::api::core::v1::Service>(&namespace, &name, DeletePolicy::Background).await?;
        gateway.delete::<k8s_openapi::api::core::v1::ConfigMap>(&namespace, &cm_name, DeletePolicy::Background).await?;

        Ok(gateway.get::<Deployment>(&namespace, &name).await?.is_none())
    }

    async fn probe(&self, gateway: &ClusterGateway, platform: &ObservabilityPlatform) -> Result<HealthSample, ReconcileError> {
        let namespace = Self::namespace(platform);
        let name = render::child_name(&platform.name_any(), ComponentKind::AlertRouter, "server");
        let Some(spec) = platform.spec.alert_router.as_ref() else {
            return Err(ReconcileError::validation("alert router component is not enabled"));
        };
        let defaulted = default_component(ComponentKind::AlertRouter, spec, platform.spec.is_ha());
        let desired_replicas = defaulted.replicas.unwrap_or(1);

        let Some(observed) = gateway.get::<Deployment>(&namespace, &name).await? else {
            return Ok(HealthSample {
                ready_replicas: 0,
                desired_replicas,
                version_matches: false,
                probe_endpoint_ok: false,
            });
        };

        let ready_replicas = observed.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
        let image = observed
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|p| p.containers.first())
            .and_then(|c| c.image.clone());
        let expected_image = format!("prom/alertmanager:{}", defaulted.version.as_deref().unwrap_or("latest"));
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
    use crate::crd::ObservabilityPlatformSpec;

    #[test]
    fn test_render_none_when_alert_router_disabled() {
        let platform = ObservabilityPlatform::new("prod", ObservabilityPlatformSpec::default());
        assert!(AlertRouterManager.render(&platform).is_none());
    }

    #[test]
    fn test_routing_config_falls_back_to_default_receiver() {
        let rendered = routing_config(&[]);
        assert!(rendered.contains("receiver: default"));
    }

    #[test]
    fn test_routing_config_includes_custom_receivers() {
        let routes = vec![AlertRoute {
            receiver: "pagerduty".to_string(),
            match_labels: BTreeMap::new(),
        }];
        let rendered = routing_config(&routes);
        assert!(rendered.contains("pagerduty"));
    }
}
