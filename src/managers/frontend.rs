//! Manages the frontend (a Grafana Deployment): ConfigMap with
//! datasource provisioning, a generated-or-referenced admin credential
//! Secret, a Service, and an optional Ingress.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec, Secret};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressServiceBackend,
    IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use crate::crd::{ComponentKind, FrontendSpec, ObservabilityPlatform};
use crate::defaulter::{default_component, generate_admin_password};
use crate::errors::ReconcileError;
use crate::gateway::{ClusterGateway, DeletePolicy};
use crate::health::ComponentResult;
use crate::managers::render;
use crate::managers::{phase_from_sample, ComponentManager, HealthSample};

const PORT: i32 = 3000;

pub struct FrontendManager;

fn datasource_config(metrics_enabled: bool, logs_enabled: bool, traces_enabled: bool) -> String {
    let mut rendered = "apiVersion: 1\ndatasources:\n".to_string();
    if metrics_enabled {
        rendered.push_str("  - name: Metrics\n    type: prometheus\n    url: http://metrics-server:9090\n");
    }
    if logs_enabled {
        rendered.push_str("  - name: Logs\n    type: loki\n    url: http://logs-server:3100\n");
    }
    if traces_enabled {
        rendered.push_str("  - name: Traces\n    type: tempo\n    url: http://traces-server:3200\n");
    }
    rendered
}

impl FrontendManager {
    fn namespace(platform: &ObservabilityPlatform) -> String {
        platform.namespace().unwrap_or_default()
    }

    fn secret_name(platform_name: &str, frontend: &FrontendSpec) -> String {
        frontend
            .admin_password_secret_ref
            .clone()
            .unwrap_or_else(|| render::child_name(platform_name, ComponentKind::Frontend, "admin"))
    }

    fn render(
        &self,
        platform: &ObservabilityPlatform,
    ) -> Option<(Deployment, k8s_openapi::api::core::v1::Service, k8s_openapi::api::core::v1::ConfigMap)> {
        let frontend = platform.spec.frontend.clone()?;
        let mut frontend = frontend;
        frontend.common = default_component(ComponentKind::Frontend, &frontend.common, platform.spec.is_ha());
        let namespace = Self::namespace(platform);
        let name = render::child_name(&platform.name_any(), ComponentKind::Frontend, "server");
        let labels = render::standard_labels(&platform.name_any(), ComponentKind::Frontend, platform.spec.global.as_ref());
        let owner = render::owner_reference(platform);

        let cm_name = render::child_name(&platform.name_any(), ComponentKind::Frontend, "config");
        let mut data = BTreeMap::new();
        data.insert(
            "datasources.yml".to_string(),
            datasource_config(platform.spec.metrics.is_some(), platform.spec.logs.is_some(), platform.spec.traces.is_some()),
        );
        let config_map = render::build_config_map(&cm_name, &namespace, &labels, owner.clone(), data);

        let service = render::build_service(&name, &namespace, &labels, owner.clone(), PORT);

        let image = format!("grafana/grafana:{}", frontend.common.version.as_deref().unwrap_or("latest"));
        let container = render::workload_container("frontend", &image, PORT, render::resource_requirements(frontend.common.resources.as_ref()));

        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(namespace.clone()),
                labels: Some(labels.clone()),
                owner_references: owner.map(|o| vec![o]),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: frontend.common.replicas,
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

    fn render_ingress(&self, platform: &ObservabilityPlatform, frontend: &FrontendSpec) -> Option<Ingress> {
        if !frontend.ingress_enabled.unwrap_or(false) {
            return None;
        }
        let host = frontend.ingress_host.clone()?;
        let namespace = Self::namespace(platform);
        let name = render::child_name(&platform.name_any(), ComponentKind::Frontend, "ingress");
        let service_name = render::child_name(&platform.name_any(), ComponentKind::Frontend, "server");
        let labels = render::standard_labels(&platform.name_any(), ComponentKind::Frontend, platform.spec.global.as_ref());
        let owner = render::owner_reference(platform);

        Some(Ingress {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace),
                labels: Some(labels),
                owner_references: owner.map(|o| vec![o]),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: Some(host),
                    http: Some(HTTPIngressRuleValue {
                        paths: vec![HTTPIngressPath {
                            path: Some("/".to_string()),
                            path_type: "Prefix".to_string(),
                            backend: IngressBackend {
                                service: Some(IngressServiceBackend {
                                    name: service_name,
                                    port: Some(ServiceBackendPort {
                                        number: Some(PORT),
                                        ..Default::default()
                                    }),
                                }),
                                ..Default::default()
                            },
                        }],
                    }),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    /// Ensure the admin credential Secret exists, generating a password
    /// the first time and never overwriting one created out-of-band.
    async fn ensure_admin_secret(
        &self,
        gateway: &ClusterGateway,
        platform: &ObservabilityPlatform,
        frontend: &FrontendSpec,
    ) -> Result<(), ReconcileError> {
        let namespace = Self::namespace(platform);
        let secret_name = Self::secret_name(&platform.name_any(), frontend);

        if gateway.get::<Secret>(&namespace, &secret_name).await?.is_some() {
            return Ok(());
        }

        let labels = render::standard_labels(&platform.name_any(), ComponentKind::Frontend, platform.spec.global.as_ref());
        let owner = render::owner_reference(platform);
        let mut string_data = BTreeMap::new();
        string_data.insert("admin-password".to_string(), generate_admin_password());

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret_name),
                namespace: Some(namespace.clone()),
                labels: Some(labels),
                owner_references: owner.map(|o| vec![o]),
                ..Default::default()
            },
            string_data: Some(string_data),
            ..Default::default()
        };

        gateway.apply(&namespace, &secret).await?;
        Ok(())
    }
}

#[async_trait]
impl ComponentManager for FrontendManager {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Frontend
    }

    async fn reconcile(
        &self,
        gateway: &ClusterGateway,
        platform: &ObservabilityPlatform,
    ) -> Result<ComponentResult, ReconcileError> {
        let Some(frontend) = platform.spec.frontend.clone() else {
            return Err(ReconcileError::validation("frontend component is not enabled"));
        };
        self.ensure_admin_secret(gateway, platform, &frontend).await?;

        let Some((deployment, service, config_map)) = self.render(platform) else {
            return Err(ReconcileError::validation("frontend component is not enabled"));
        };
        let namespace = Self::namespace(platform);

        gateway.apply(&namespace, &config_map).await?;
        gateway.apply(&namespace, &service).await?;
        let applied = gateway.apply(&namespace, &deployment).await?;

        if let Some(ingress) = self.render_ingress(platform, &frontend) {
            gateway.apply(&namespace, &ingress).await?;
        }

        let sample = self.probe(gateway, platform).await?;
        let desired = applied.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let phase = phase_from_sample(&sample, true);

        Ok(ComponentResult {
            phase,
            version: Some(frontend.common.version.unwrap_or_default()),
            ready_replicas: sample.ready_replicas,
            desired_replicas: desired,
            message: format!("{}/{} replicas ready", sample.ready_replicas, desired),
            probed: true,
        })
    }

    async fn teardown(&self, gateway: &ClusterGateway, platform: &ObservabilityPlatform) -> Result<bool, ReconcileError> {
        let namespace = Self::namespace(platform);
        let name = render::child_name(&platform.name_any(), ComponentKind::Frontend, "server");
        let cm_name = render::child_name(&platform.name_any(), ComponentKind::Frontend, "config");
        let ingress_name = render::child_name(&platform.name_any(), ComponentKind::Frontend, "ingress");

        gateway.delete::<Deployment>(&namespace, &name, DeletePolicy::Foreground).await?;
        gateway.delete::<k8s_openapi::api::core::v1::Service>(&namespace, &name, DeletePolicy::Background).await?;
        gateway.delete::<k8s_openapi::api::core::v1::ConfigMap>(&namespace, &cm_name, DeletePolicy::Background).await?;
        gateway.delete::<Ingress>(&namespace, &ingress_name, DeletePolicy::Background).await?;

        Ok(gateway.get::<Deployment>(&namespace, &name).await?.is_none())
    }

    async fn probe(&self, gateway: &ClusterGateway, platform: &ObservabilityPlatform) -> Result<HealthSample, ReconcileError> {
        let namespace = Self::namespace(platform);
        let name = render::child_name(&platform.name_any(), ComponentKind::Frontend, "server");
        let Some(frontend) = platform.spec.frontend.as_ref() else {
            return Err(ReconcileError::validation("frontend component is not enabled"));
        };
        let defaulted_common = default_component(ComponentKind::Frontend, &frontend.common, platform.spec.is_ha());
        let desired_replicas = defaulted_common.replicas.unwrap_or(1);

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
        let expected_image = format!("grafana/grafana:{}", defaulted_common.version.as_deref().unwrap_or("latest"));
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
    fn test_render_none_when_frontend_disabled() {
        let platform = ObservabilityPlatform::new("prod", ObservabilityPlatformSpec::default());
        assert!(FrontendManager.render(&platform).is_none());
    }

    #[test]
    fn test_secret_name_defaults_when_ref_absent() {
        let frontend = FrontendSpec::default();
        assert_eq!(FrontendManager::secret_name("prod", &frontend), "prod-frontend-admin");
    }

    #[test]
    fn test_secret_name_honors_explicit_ref() {
        let frontend = FrontendSpec {
            admin_password_secret_ref: Some("custom-secret".to_string()),
            ..Default::default()
        };
        assert_eq!(FrontendManager::secret_name("prod", &frontend), "custom-secret");
    }

    #[test]
    fn test_datasource_config_includes_only_enabled_backends() {
        let rendered = datasource_config(true, false, false);
        assert!(rendered.contains("prometheus"));
        assert!(!rendered.contains("loki"));
    }

    #[test]
    fn test_render_ingress_none_when_disabled() {
        let mut platform = ObservabilityPlatform::new(
            "prod",
            ObservabilityPlatformSpec {
                frontend: Some(FrontendSpec::default()),
                ..Default::default()
            },
        );
        platform.metadata.namespace = Some("obs".to_string());
        let frontend = platform.spec.frontend.clone().unwrap();
        assert!(FrontendManager.render_ingress(&platform, &frontend).is_none());
    }
}
