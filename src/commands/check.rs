use k8s_openapi::api::core::v1::Node;
use kube::api::ListParams;
use kube::{Api, Client};

use obsplatform::crd::ObservabilityPlatform;

pub async fn run() -> anyhow::Result<()> {
    println!("Running cluster connectivity checks...\n");

    print!("  Kubeconfig .................. ");
    let client = match Client::try_default().await {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAIL");
            anyhow::bail!("Cannot load kubeconfig: {}", e);
        }
    };

    print!("  Cluster connection .......... ");
    let version = match client.apiserver_version().await {
        Ok(v) => {
            println!("OK (v{}.{})", v.major, v.minor);
            Some(v)
        }
        Err(e) => {
            println!("FAIL");
            println!("\n  Error: {}", e);
            println!("  Hint:  Is the cluster running? Check with: kubectl cluster-info\n");
            return Ok(());
        }
    };

    print!("  List ObservabilityPlatforms . ");
    let platforms: Api<ObservabilityPlatform> = Api::all(client.clone());
    match platforms.list(&ListParams::default().limit(1)).await {
        Ok(_) => println!("OK"),
        Err(e) => println!("FAIL ({e})"),
    }

    print!("  List nodes permission ........ ");
    let nodes: Api<Node> = Api::all(client.clone());
    match nodes.list(&ListParams::default()).await {
        Ok(node_list) => println!("OK ({} nodes)", node_list.items.len()),
        Err(e) => println!("FAIL ({e})"),
    }

    if let Some(v) = version {
        println!("\n  Kubernetes version: {}.{}", v.major, v.minor);
    }

    println!("\nAll checks completed.");
    Ok(())
}
