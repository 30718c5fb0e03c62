use std::net::SocketAddr;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use prometheus::{Encoder, Histogram, IntCounterVec, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, warn};

use k8s_openapi::api::core::v1::Secret;

use obsplatform::crd::{
    ObservabilityPlatform, ObservabilityPlatformRevision, ObservabilityPlatformRevisionSpec,
    REVISION_RETENTION,
};
use obsplatform::gateway::ClusterGateway;
use obsplatform::gitops;

/* ============================= PROMETHEUS ============================= */

static WEBHOOK_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static WEBHOOK_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        prometheus::Opts::new("gitops_webhook_requests_total", "Total GitOps bridge webhook requests"),
        &["provider", "outcome"],
    )
    .expect("metric definition is valid");
    WEBHOOK_REGISTRY.register(Box::new(c.clone())).expect("metric not yet registered");
    c
});

static WEBHOOK_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    let h = Histogram::with_opts(prometheus::HistogramOpts::new(
        "gitops_webhook_request_duration_seconds",
        "Duration of GitOps bridge webhook request processing in seconds",
    ))
    .expect("metric definition is valid");
    WEBHOOK_REGISTRY.register(Box::new(h.clone())).expect("metric not yet registered");
    h
});

/* ============================= STATE ============================= */

#[derive(Clone)]
pub(crate) struct WebhookState {
    pub(crate) client: Client,
    pub(crate) gateway: ClusterGateway,
    pub(crate) ready: bool,
}

/* ============================= ENTRY: SERVE ============================= */

pub async fn serve(addr_str: &str, tls_cert: &str, tls_key: &str) -> Result<()> {
    println!("Starting GitOps bridge webhook server...\n");
    info!("gitops_webhook_starting");

    let client = Client::try_default().await.context("Failed to connect to Kubernetes cluster")?;

    print!("  Cluster connection .......... ");
    match client.apiserver_version().await {
        Ok(v) => println!("OK (v{}.{})", v.major, v.minor),
        Err(e) => {
            println!("FAIL");
            anyhow::bail!("Cannot reach cluster: {}. Is the cluster running?", e);
        }
    }

    print!("  TLS ......................... ");
    validate_tls_files(tls_cert, tls_key)?;
    println!("loaded ({tls_cert}, {tls_key})");

    let addr: SocketAddr = addr_str.parse().context("Invalid address format")?;

    println!("  HTTPS server ................ https://{addr}");
    println!();
    println!("  Available endpoints:");
    println!("    POST /webhook/:provider ... Push event receiver (github, gitlab, generic)");
    println!("    GET  /healthz ............. Liveness probe");
    println!("    GET  /readyz .............. Readiness probe");
    println!("    GET  /metrics ............. Prometheus metrics");
    println!();
    println!("GitOps bridge running. Press Ctrl+C to stop.\n");
    println!("{}", "=".repeat(70));

    let state = WebhookState {
        client: client.clone(),
        gateway: ClusterGateway::new(client),
        ready: true,
    };

    let tls_cert = tls_cert.to_string();
    let tls_key = tls_key.to_string();

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let http_shutdown = shutdown_tx.subscribe();

    let http_handle =
        tokio::spawn(async move { start_https_server(state, http_shutdown, addr, &tls_cert, &tls_key).await });

    tokio::signal::ctrl_c().await?;
    info!("shutdown_signal_received");
    println!("\n{}", "=".repeat(70));
    println!("Shutdown signal received. Stopping GitOps bridge...");
    println!("{}", "=".repeat(70));

    let _ = shutdown_tx.send(());
    let _ = http_handle.await?;

    info!("gitops_webhook_stopped");
    println!("GitOps bridge stopped.");
    Ok(())
}

/* ============================= TLS ============================= */

fn validate_tls_files(cert_path: &str, key_path: &str) -> Result<()> {
    if !std::path::Path::new(cert_path).exists() {
        anyhow::bail!("TLS certificate file not found: {}", cert_path);
    }
    if !std::path::Path::new(key_path).exists() {
        anyhow::bail!("TLS key file not found: {}", key_path);
    }
    Ok(())
}

/* ============================= HTTPS SERVER ============================= */

pub(crate) fn build_webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook/:provider", post(webhook_handler))
        .route("/healthz", get(|| async { (StatusCode::OK, "OK") }))
        .route(
            "/readyz",
            get({
                let state = state.clone();
                move || ready_handler(state.clone())
            }),
        )
        .route("/metrics", get(webhook_metrics_handler))
        .with_state(state)
}

async fn start_https_server(
    state: WebhookState,
    mut shutdown: broadcast::Receiver<()>,
    addr: SocketAddr,
    tls_cert: &str,
    tls_key: &str,
) -> Result<()> {
    let app = build_webhook_router(state);

    let rustls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(tls_cert, tls_key)
        .await
        .context("Failed to load TLS configuration")?;

    info!(addr = %addr, "gitops_https_server_started");

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        let _ = shutdown.recv().await;
        shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(5)));
    });

    axum_server::bind_rustls(addr, rustls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn ready_handler(state: WebhookState) -> impl IntoResponse {
    if state.ready {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn webhook_metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = WEBHOOK_REGISTRY.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => match String::from_utf8(buffer) {
            Ok(body) => (StatusCode::OK, body),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error".to_string()),
        },
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error".to_string()),
    }
}

/* ============================= WEBHOOK HANDLER ============================= */

/// Key expected in the webhook secret referenced by `webhookSecretRef`.
const SECRET_TOKEN_KEY: &str = "token";

async fn webhook_handler(
    State(state): State<WebhookState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let _timer = WEBHOOK_DURATION.start_timer();

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            info!(error = %e, "invalid_webhook_payload");
            WEBHOOK_REQUESTS.with_label_values(&[&provider, "bad_payload"]).inc();
            return (StatusCode::BAD_REQUEST, "invalid JSON payload".to_string());
        }
    };

    let Some(event) = gitops::parse_push_event(&provider, &payload) else {
        WEBHOOK_REQUESTS.with_label_values(&[&provider, "unparsable"]).inc();
        return (StatusCode::BAD_REQUEST, "could not parse push event".to_string());
    };

    let platforms_api: Api<ObservabilityPlatform> = Api::all(state.client.clone());
    let platforms = match platforms_api.list(&ListParams::default()).await {
        Ok(list) => list.items,
        Err(e) => {
            warn!(error = %e, "platform_list_failed");
            WEBHOOK_REQUESTS.with_label_values(&[&provider, "list_failed"]).inc();
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to list platforms".to_string());
        }
    };

    let Some(platform) = gitops::match_platform(&event, &platforms) else {
        WEBHOOK_REQUESTS.with_label_values(&[&provider, "no_match"]).inc();
        return (StatusCode::OK, "no platform tracks this repository/branch".to_string());
    };

    let platform_name = platform.name_any();
    let namespace = platform.namespace().unwrap_or_default();
    let reference = platform.spec.git_ops.as_ref().expect("match_platform only returns platforms with a gitOps reference");

    let Some(secret_ref) = reference.webhook_secret_ref.as_deref() else {
        warn!(platform = %platform_name, "webhook_secret_not_configured");
        WEBHOOK_REQUESTS.with_label_values(&[&provider, "unconfigured"]).inc();
        return (StatusCode::BAD_REQUEST, "platform has no webhookSecretRef configured".to_string());
    };

    let secrets_api: Api<Secret> = Api::namespaced(state.client.clone(), &namespace);
    let secret = match secrets_api.get(secret_ref).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, secret = %secret_ref, "webhook_secret_fetch_failed");
            WEBHOOK_REQUESTS.with_label_values(&[&provider, "secret_missing"]).inc();
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch webhook secret".to_string());
        }
    };

    let Some(token_bytes) = secret.data.as_ref().and_then(|d| d.get(SECRET_TOKEN_KEY)) else {
        warn!(secret = %secret_ref, "webhook_secret_missing_token_key");
        WEBHOOK_REQUESTS.with_label_values(&[&provider, "secret_malformed"]).inc();
        return (StatusCode::INTERNAL_SERVER_ERROR, "webhook secret missing 'token' key".to_string());
    };
    let secret_value = String::from_utf8_lossy(&token_bytes.0).to_string();

    let header_name = gitops::signature_header(&provider);
    let signature_value = headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !gitops::verify_signature(&provider, &secret_value, &body, signature_value) {
        warn!(platform = %platform_name, provider = %provider, "webhook_signature_rejected");
        WEBHOOK_REQUESTS.with_label_values(&[&provider, "signature_rejected"]).inc();
        return (StatusCode::UNAUTHORIZED, "signature verification failed".to_string());
    }

    let patch = gitops::revision_patch(&event.revision);
    if let Err(e) = state.gateway.patch_merge::<ObservabilityPlatform>(&namespace, &platform_name, patch).await {
        warn!(error = %e, platform = %platform_name, "target_revision_patch_failed");
        WEBHOOK_REQUESTS.with_label_values(&[&provider, "patch_failed"]).inc();
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to patch target revision".to_string());
    }

    info!(
        platform = %platform_name,
        namespace = %namespace,
        revision = %event.revision,
        provider = %provider,
        "target_revision_converged"
    );

    let record_client = state.client.clone();
    let record_platform = platform_name.clone();
    let record_namespace = namespace.clone();
    let record_repo = event.repo_url.clone();
    let record_revision = event.revision.clone();
    let record_provider = provider.clone();
    tokio::spawn(async move {
        if let Err(e) = record_sync_revision(
            &record_client,
            &record_namespace,
            &record_platform,
            &record_repo,
            &record_revision,
            &record_provider,
        )
        .await
        {
            warn!(error = %e, platform = %record_platform, "sync_revision_record_failed");
        }
    });

    WEBHOOK_REQUESTS.with_label_values(&[&provider, "converged"]).inc();
    (StatusCode::OK, format!("platform '{platform_name}' converging to {}", event.revision))
}

/// Record one sync attempt as an `ObservabilityPlatformRevision`, trimming to
/// the last `REVISION_RETENTION` entries per platform.
async fn record_sync_revision(
    client: &Client,
    namespace: &str,
    platform_name: &str,
    repo_url: &str,
    revision: &str,
    provider: &str,
) -> Result<()> {
    let api: Api<ObservabilityPlatformRevision> = Api::namespaced(client.clone(), namespace);
    let timestamp = chrono::Utc::now();
    let name = format!("{platform_name}-{}", timestamp.timestamp_millis());

    let record = ObservabilityPlatformRevision::new(
        &name,
        ObservabilityPlatformRevisionSpec {
            platform_name: platform_name.to_string(),
            repo_url: repo_url.to_string(),
            revision: revision.to_string(),
            provider: provider.to_string(),
            timestamp: timestamp.to_rfc3339(),
            sync_phase: obsplatform::crd::SyncPhase::Syncing,
            message: None,
        },
    );

    api.create(&Default::default(), &record).await?;

    let existing = api.list(&ListParams::default()).await?;
    let mut for_platform: Vec<_> = existing
        .items
        .iter()
        .filter(|r| r.spec.platform_name == platform_name)
        .collect();
    for_platform.sort_by(|a, b| a.spec.timestamp.cmp(&b.spec.timestamp));

    if for_platform.len() > REVISION_RETENTION {
        let to_delete = for_platform.len() - REVISION_RETENTION;
        for record in for_platform.iter().take(to_delete) {
            if let Some(name) = record.metadata.name.as_deref() {
                let _ = api.delete(name, &Default::default()).await;
            }
        }
    }

    Ok(())
}

/* ============================= CERT GENERATION ============================= */

pub fn cert_generate(service_name: &str, namespace: &str, output_dir: &str, ip_sans: &[String]) -> Result<()> {
    println!("Generating self-signed TLS certificates...\n");

    let (ca_pem, cert_pem, key_pem) = generate_self_signed_certs(service_name, namespace, ip_sans)?;

    let output_path = std::path::Path::new(output_dir);
    if !output_path.exists() {
        std::fs::create_dir_all(output_path).context("Failed to create output directory")?;
    }

    let ca_path = output_path.join("ca.crt");
    let cert_path = output_path.join("tls.crt");
    let key_path = output_path.join("tls.key");

    std::fs::write(&ca_path, &ca_pem).context("Failed to write ca.crt")?;
    std::fs::write(&cert_path, &cert_pem).context("Failed to write tls.crt")?;
    std::fs::write(&key_path, &key_pem).context("Failed to write tls.key")?;

    println!("  CA certificate .............. {}", ca_path.display());
    println!("  Server certificate .......... {}", cert_path.display());
    println!("  Server key .................. {}", key_path.display());
    println!();
    println!("  Service name ................ {service_name}");
    println!("  Namespace ................... {namespace}");
    println!("  SANs:");
    println!("    - {service_name}.{namespace}.svc");
    println!("    - {service_name}.{namespace}.svc.cluster.local");
    for ip in ip_sans {
        println!("    - {ip} (IP)");
    }
    println!();
    println!("TLS certificates generated successfully.");

    Ok(())
}

fn generate_self_signed_certs(service_name: &str, namespace: &str, ip_sans: &[String]) -> Result<(String, String, String)> {
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
    use std::net::IpAddr;

    let mut ca_params = CertificateParams::default();
    ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let mut ca_dn = DistinguishedName::new();
    ca_dn.push(DnType::CommonName, "observability-platform-gitops-ca");
    ca_dn.push(DnType::OrganizationName, "observability-platform-operator");
    ca_params.distinguished_name = ca_dn;

    let ca_key = KeyPair::generate().context("Failed to generate CA key pair")?;
    let ca_cert = ca_params.self_signed(&ca_key).context("Failed to self-sign CA certificate")?;

    let mut server_params = CertificateParams::default();
    let mut server_dn = DistinguishedName::new();
    server_dn.push(DnType::CommonName, format!("{service_name}.{namespace}.svc"));
    server_params.distinguished_name = server_dn;

    let mut sans = vec![
        SanType::DnsName(format!("{service_name}.{namespace}.svc").try_into().context("Invalid DNS name for SAN")?),
        SanType::DnsName(
            format!("{service_name}.{namespace}.svc.cluster.local")
                .try_into()
                .context("Invalid DNS name for SAN")?,
        ),
    ];

    for ip_str in ip_sans {
        let ip: IpAddr = ip_str.parse().context(format!("Invalid IP address for SAN: {ip_str}"))?;
        sans.push(SanType::IpAddress(ip));
    }

    server_params.subject_alt_names = sans;

    let server_key = KeyPair::generate().context("Failed to generate server key pair")?;
    let server_cert = server_params
        .signed_by(&server_key, &ca_cert, &ca_key)
        .context("Failed to sign server certificate")?;

    Ok((ca_cert.pem(), server_cert.pem(), server_key.serialize_pem()))
}

/* ============================= INSTALL CONFIG ============================= */

pub fn install_config(service_name: &str, namespace: &str, provider: &str) -> Result<()> {
    let header = gitops::signature_header(provider);
    let url = format!("https://{service_name}.{namespace}.svc/webhook/{provider}");

    println!("GitOps bridge webhook configuration for provider '{provider}':\n");
    println!("  Payload URL ................. {url}");
    println!("  Content type ................ application/json");
    println!("  Signature header ............ {header}");
    println!("  Events ...................... push");
    println!();
    println!("Create a Secret in the platform's namespace holding the shared");
    println!("secret under the '{SECRET_TOKEN_KEY}' key, then reference it from");
    println!("the platform's spec.gitOps.webhookSecretRef:");
    println!();
    println!("  apiVersion: v1");
    println!("  kind: Secret");
    println!("  metadata:");
    println!("    name: <platform-name>-gitops-webhook");
    println!("  stringData:");
    println!("    {SECRET_TOKEN_KEY}: <shared secret>");
    println!();
    match provider {
        "github" => println!("GitHub: set this as a repository webhook with content type 'application/json'\nand the shared secret as the webhook secret."),
        "gitlab" => println!("GitLab: set this as a project webhook and paste the shared secret into the\n'Secret token' field (sent back verbatim in the {header} header)."),
        _ => println!("Generic provider: POST a JSON body shaped {{ \"repo_url\", \"branch\", \"revision\" }}\nwith an HMAC-SHA256 signature in the {header} header."),
    }

    Ok(())
}

/* ============================= TESTS ============================= */
