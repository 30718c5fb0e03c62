//! Ordered teardown: tears down every enabled component in reverse
//! dependency order, then applies the PVC retention policy, then
//! releases the finalizer. Driven by the reconciler once a platform
//! carries a deletion timestamp.

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use tracing::{info, warn};

use crate::crd::{ComponentKind, ObservabilityPlatform, PvcRetentionPolicy};
use crate::errors::ReconcileError;
use crate::gateway::{ClusterGateway, FIELD_MANAGER};
use crate::managers::ComponentManager;

pub const FINALIZER: &str = "observability.io/cleanup";

pub fn has_finalizer(platform: &ObservabilityPlatform) -> bool {
    platform
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|s| s == FINALIZER))
}

pub async fn add_finalizer(client: &Client, platform: &ObservabilityPlatform) -> kube::Result<()> {
    let name = platform.name_any();
    let namespace = platform.namespace().unwrap_or_default();
    let api: Api<ObservabilityPlatform> = Api::namespaced(client.clone(), &namespace);

    let patch = serde_json::json!({ "metadata": { "finalizers": [FINALIZER] } });
    api.patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch)).await?;
    info!(platform = %name, "finalizer_added");
    Ok(())
}

pub async fn remove_finalizer(client: &Client, platform: &ObservabilityPlatform) -> kube::Result<()> {
    let name = platform.name_any();
    let namespace = platform.namespace().unwrap_or_default();
    let api: Api<ObservabilityPlatform> = Api::namespaced(client.clone(), &namespace);

    let patch = serde_json::json!({ "metadata": { "finalizers": [] } });
    api.patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch)).await?;
    info!(platform = %name, "finalizer_removed");
    Ok(())
}

/// Tear down every enabled component in the reverse of the install
/// order (alert router first, storage backends last). Waits for each
/// manager to report its children gone before moving to the next;
/// short-circuits on the first manager that still reports children
/// present, so a slow-to-delete frontend never races ahead of the
/// storage backends underneath it. `on_step` fires once per manager
/// that reports fully gone, letting the caller emit an event without
/// this module knowing about `Recorder`.
pub async fn teardown_components<F, Fut>(
    gateway: &ClusterGateway,
    platform: &ObservabilityPlatform,
    managers: &[Box<dyn ComponentManager>],
    on_step: &F,
) -> Result<bool, ReconcileError>
where
    F: Fn(ComponentKind) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let enabled = platform.spec.enabled_components();

    for manager in managers.iter().rev() {
        let kind = manager.kind();
        if !enabled.contains(&kind) {
            continue;
        }
        let gone = manager.teardown(gateway, platform).await?;
        if !gone {
            info!(
                platform = %platform.name_any(),
                component = kind.as_str(),
                "teardown_waiting_for_component"
            );
            return Ok(false);
        }
        on_step(kind).await;
    }

    Ok(true)
}

/// Reclaim (or deliberately leave behind) the PVCs created for
/// storage-backed components, per `pvcRetentionPolicy`. Only
/// metrics/logs/traces provision PVCs via StatefulSet volume claim
/// templates.
pub async fn apply_pvc_retention_policy(client: &Client, platform: &ObservabilityPlatform) -> Result<(), ReconcileError> {
    let policy = platform.spec.pvc_retention_policy.unwrap_or_default();
    if policy == PvcRetentionPolicy::Retain {
        info!(platform = %platform.name_any(), "pvc_retention_policy_retain_skipping_delete");
        return Ok(());
    }

    let namespace = platform.namespace().unwrap_or_default();
    let platform_name = platform.name_any();
    let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), &namespace);

    let selector = format!("observability.io/platform={platform_name}");
    let list = api.list(&ListParams::default().labels(&selector)).await?;

    for pvc in list.items {
        let Some(name) = pvc.metadata.name.clone() else { continue };
        if let Err(e) = api.delete(&name, &Default::default()).await {
            warn!(error = %e, pvc = %name, "pvc_delete_failed");
        } else {
            info!(pvc = %name, platform = %platform_name, "pvc_deleted");
        }
    }

    Ok(())
}

/// Full deletion sequence: tear down components, reclaim (or retain)
/// PVCs only once every component is confirmed gone, then release the
/// finalizer. Returns true once the platform is fully torn down and
/// the finalizer has been removed.
pub async fn run<F, Fut>(
    client: &Client,
    gateway: &ClusterGateway,
    platform: &ObservabilityPlatform,
    managers: &[Box<dyn ComponentManager>],
    on_step: F,
) -> Result<bool, ReconcileError>
where
    F: Fn(ComponentKind) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let all_gone = teardown_components(gateway, platform, managers, &on_step).await?;
    if !all_gone {
        return Ok(false);
    }

    apply_pvc_retention_policy(client, platform).await?;

    if has_finalizer(platform) {
        remove_finalizer(client, platform).await?;
    }

    Ok(true)
}

/// Reverse of the standard install order, surfaced for callers that
/// want to log or display the teardown sequence without constructing
/// managers.
pub fn teardown_order() -> Vec<ComponentKind> {
    ComponentKind::ORDER.iter().rev().copied().collect()
}
