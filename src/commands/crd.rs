use anyhow::Result;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::CustomResourceExt;

use obsplatform::crd::{merged_platform_crd, ObservabilityPlatformRevision};

/// Print both owned CRDs' YAML to stdout for `kubectl apply -f`.
pub fn generate() -> Result<()> {
    let platform = merged_platform_crd();
    let revision = ObservabilityPlatformRevision::crd();

    println!("{}", serde_yaml::to_string(&platform)?);
    println!("---");
    println!("{}", serde_yaml::to_string(&revision)?);
    Ok(())
}

/// Apply both owned CRDs directly to the connected cluster.
pub async fn install() -> Result<()> {
    use kube::{Api, Client};

    let client = Client::try_default().await?;
    let crds: Api<CustomResourceDefinition> = Api::all(client);

    for crd in [merged_platform_crd(), ObservabilityPlatformRevision::crd()] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        match crds.create(&Default::default(), &crd).await {
            Ok(_) => println!("CRD '{name}' installed successfully"),
            Err(kube::Error::Api(err)) if err.code == 409 => {
                println!("CRD '{name}' already exists, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
