use anyhow::Context;
use kube::api::ListParams;
use kube::{Api, Client};

use obsplatform::crd::ObservabilityPlatform;

pub async fn run(resource: String) -> anyhow::Result<()> {
    if resource != "platforms" {
        anyhow::bail!("Unsupported resource '{}'. Supported: platforms", resource);
    }

    let client = Client::try_default()
        .await
        .context("Failed to connect to Kubernetes cluster. Is your kubeconfig valid?")?;

    let platforms: Api<ObservabilityPlatform> = Api::all(client);

    let list = platforms
        .list(&ListParams::default())
        .await
        .context("Failed to list ObservabilityPlatforms. Check RBAC permissions.")?;

    let mut rows: Vec<(String, String, String, String, String)> = list
        .into_iter()
        .map(|p| {
            let namespace = p.metadata.namespace.unwrap_or_default();
            let name = p.metadata.name.unwrap_or_default();
            let phase = p
                .status
                .as_ref()
                .and_then(|s| s.phase)
                .map(|p| p.to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            let health = p
                .status
                .as_ref()
                .and_then(|s| s.health)
                .map(|h| h.to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            let age = p.metadata.creation_timestamp.map(|t| t.0.to_rfc3339()).unwrap_or_default();
            (namespace, name, phase, health, age)
        })
        .collect();

    rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    println!("{:<20} {:<30} {:<12} {:<10} {:<25}", "NAMESPACE", "NAME", "PHASE", "HEALTH", "AGE");
    println!("{}", "-".repeat(100));

    for (namespace, name, phase, health, age) in &rows {
        println!("{:<20} {:<30} {:<12} {:<10} {:<25}", namespace, name, phase, health, age);
    }

    println!("\nTotal: {} platforms", rows.len());

    Ok(())
}
