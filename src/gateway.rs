//! The cluster gateway: a thin declarative layer every component manager
//! calls instead of touching `kube::Api` directly. Centralizes all
//! cluster writes behind one `Api::patch` call with a stable
//! field-manager identity.

use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PropagationPolicy};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Field-manager identity every write from this operator carries.
pub const FIELD_MANAGER: &str = "observability-platform-operator";

/// Deletion propagation policy for `Delete` calls. Mirrors
/// `kube::api::PropagationPolicy` one-to-one; re-exported here so
/// callers don't need to depend on the exact `kube` re-export path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    Foreground,
    Background,
    Orphan,
}

impl Default for DeletePolicy {
    fn default() -> Self {
        DeletePolicy::Background
    }
}

impl From<DeletePolicy> for PropagationPolicy {
    fn from(p: DeletePolicy) -> Self {
        match p {
            DeletePolicy::Foreground => PropagationPolicy::Foreground,
            DeletePolicy::Background => PropagationPolicy::Background,
            DeletePolicy::Orphan => PropagationPolicy::Orphan,
        }
    }
}

/// Thin wrapper around `kube::Client` providing the apply/get/delete
/// contract component managers are built on. Managers are constructed
/// with one of these rather than a bare `Client`.
#[derive(Clone)]
pub struct ClusterGateway {
    client: Client,
}

impl ClusterGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Idempotent create-or-update via server-side apply, safe to call
    /// on every reconcile. Conflicts on fields owned by other
    /// controllers are preserved; conflicts on our own fields are
    /// force-resolved by the `PatchParams::apply` force flag.
    pub async fn apply<K>(&self, namespace: &str, obj: &K) -> kube::Result<K>
    where
        K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Serialize,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let name = obj.name_any();
        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&name, &params, &Patch::Apply(obj)).await
    }

    pub async fn get<K>(&self, namespace: &str, name: &str) -> kube::Result<Option<K>>
    where
        K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete<K>(&self, namespace: &str, name: &str, policy: DeletePolicy) -> kube::Result<()>
    where
        K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            propagation_policy: Some(policy.into()),
            ..Default::default()
        };
        match api.delete(name, &params).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn list<K>(&self, namespace: &str) -> kube::Result<Vec<K>>
    where
        K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&Default::default()).await?;
        Ok(list.items)
    }

    pub async fn patch_status<K>(&self, namespace: &str, name: &str, status_patch: serde_json::Value) -> kube::Result<K>
    where
        K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Serialize,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await
    }

    pub async fn patch_merge<K>(&self, namespace: &str, name: &str, patch: serde_json::Value) -> kube::Result<K>
    where
        K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Serialize,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
    }

    /// Fetch the labels of a (cluster-scoped) `Namespace`. Separate from
    /// the generic `get`/`list` pair above since every other type this
    /// gateway touches is namespaced; `Namespace` is the one object a
    /// component manager ever needs to read cluster-scoped.
    pub async fn namespace_labels(&self, namespace: &str) -> kube::Result<BTreeMap<String, String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.get(namespace).await {
            Ok(ns) => Ok(ns.metadata.labels.unwrap_or_default()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_policy_default_is_background() {
        assert_eq!(DeletePolicy::default(), DeletePolicy::Background);
    }

    #[test]
    fn test_delete_policy_conversion() {
        let p: PropagationPolicy = DeletePolicy::Foreground.into();
        assert!(matches!(p, PropagationPolicy::Foreground));
    }

    #[test]
    fn test_field_manager_is_stable() {
        assert_eq!(FIELD_MANAGER, "observability-platform-operator");
    }
}
