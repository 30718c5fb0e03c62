use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use prometheus::{Encoder, Histogram, IntCounter, IntGaugeVec, Registry, TextEncoder};
use tokio::signal;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Service};

use obsplatform::crd::{
    ComponentKind, ComponentStatus, GitOpsStatus, ObservabilityPlatform, Phase, PlatformHealth,
};
use obsplatform::defaulter;
use obsplatform::errors::{ErrorKind, ReconcileError};
use obsplatform::gateway::ClusterGateway;
use obsplatform::gitops;
use obsplatform::health;
use obsplatform::lease::{self, LeaseLock};
use obsplatform::managers::{standard_managers, ComponentManager};
use obsplatform::phase::{self, Input, RetryBudget};
use obsplatform::teardown;

/* ============================= CONFIG ============================= */

const REQUEUE_READY: Duration = Duration::from_secs(60);
const REQUEUE_CONVERGING: Duration = Duration::from_secs(15);
const REQUEUE_DELETING: Duration = Duration::from_secs(10);
const MAX_RETRY_ATTEMPTS: u32 = 5;
/// Per-pass deadline: the whole manager-dispatch loop must finish
/// within this, or the pass is treated as a transient failure and
/// retried on the next tick.
const RECONCILE_PASS_DEADLINE: Duration = Duration::from_secs(120);

const OPERATOR_REPORTER: &str = "observability-platform-operator";

/* ============================= PROMETHEUS ============================= */

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILE_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let c = IntCounter::new(
        "observabilityplatform_reconcile_total",
        "Total ObservabilityPlatform reconciliation cycles",
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(c.clone())).expect("metric not yet registered");
    c
});

static RECONCILE_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    let c = IntCounter::new(
        "observabilityplatform_reconcile_errors_total",
        "Total ObservabilityPlatform reconciliation errors",
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(c.clone())).expect("metric not yet registered");
    c
});

static RECONCILE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    let h = Histogram::with_opts(prometheus::HistogramOpts::new(
        "observabilityplatform_reconcile_duration_seconds",
        "Duration of each reconciliation cycle in seconds",
    ))
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(h.clone())).expect("metric not yet registered");
    h
});

static PLATFORM_HEALTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    let g = IntGaugeVec::new(
        prometheus::Opts::new(
            "observabilityplatform_health",
            "Aggregate platform health (0=unknown,1=unhealthy,2=degraded,3=healthy)",
        ),
        &["namespace", "platform"],
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(g.clone())).expect("metric not yet registered");
    g
});

static COMPONENT_READY_REPLICAS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    let g = IntGaugeVec::new(
        prometheus::Opts::new(
            "observabilityplatform_component_ready_replicas",
            "Ready replicas per component",
        ),
        &["namespace", "platform", "component"],
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(g.clone())).expect("metric not yet registered");
    g
});

static COMPONENT_DESIRED_REPLICAS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    let g = IntGaugeVec::new(
        prometheus::Opts::new(
            "observabilityplatform_component_desired_replicas",
            "Desired replicas per component",
        ),
        &["namespace", "platform", "component"],
    )
    .expect("metric definition is valid");
    REGISTRY.register(Box::new(g.clone())).expect("metric not yet registered");
    g
});

fn health_metric_value(health: PlatformHealth) -> i64 {
    match health {
        PlatformHealth::Unknown => 0,
        PlatformHealth::Unhealthy => 1,
        PlatformHealth::Degraded => 2,
        PlatformHealth::Healthy => 3,
    }
}

/* ============================= STATE ============================= */

pub(crate) struct ReconcileState {
    pub(crate) ready: bool,
}

/* ============================= CONTEXT ============================= */

struct ReconcileContext {
    client: Client,
    gateway: ClusterGateway,
    managers: Vec<Box<dyn ComponentManager>>,
    reporter: Reporter,
    /// Sustained-probe-miss damping window, one tracker per
    /// (namespace, platform, component). Owned here rather than by the
    /// managers, which stay stateless.
    probe_trackers: Mutex<HashMap<(String, String, ComponentKind), health::ProbeTracker>>,
    /// Set by the leader-election task; reconcile() is a no-op while
    /// this is false so at most one replica ever touches a platform.
    is_leader: Arc<AtomicBool>,
}

/* ============================= ENTRY ============================= */

pub async fn run() -> Result<()> {
    println!("Starting ObservabilityPlatform operator...\n");

    let client = Client::try_default().await.context("Failed to load kubeconfig")?;

    print!("  Cluster connection .......... ");
    match client.apiserver_version().await {
        Ok(v) => println!("OK (v{}.{})", v.major, v.minor),
        Err(e) => {
            println!("FAIL");
            anyhow::bail!("Cannot reach cluster: {}. Is the cluster running?", e);
        }
    }

    let platforms: Api<ObservabilityPlatform> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::all(client.clone());
    let statefulsets: Api<StatefulSet> = Api::all(client.clone());
    let services: Api<Service> = Api::all(client.clone());
    let configmaps: Api<ConfigMap> = Api::all(client.clone());

    let identity = lease::process_identity();
    let lease_namespace = std::env::var("POD_NAMESPACE").unwrap_or_else(|_| "default".to_string());
    let lease_lock = LeaseLock::new(lease_namespace, identity.clone());
    let is_leader = Arc::new(AtomicBool::new(false));

    let reporter = Reporter {
        controller: OPERATOR_REPORTER.to_string(),
        instance: Some(identity.clone()),
    };

    let ctx = Arc::new(ReconcileContext {
        client: client.clone(),
        gateway: ClusterGateway::new(client.clone()),
        managers: standard_managers(),
        reporter,
        probe_trackers: Mutex::new(HashMap::new()),
        is_leader: is_leader.clone(),
    });

    {
        let lease_client = client.clone();
        let lease_leader = is_leader.clone();
        tokio::spawn(async move {
            loop {
                match lease_lock.try_acquire_or_renew(&lease_client).await {
                    Ok(held) => lease_leader.store(held, Ordering::Relaxed),
                    Err(e) => warn!(error = %e, "lease_renew_failed"),
                }
                tokio::time::sleep(lease::DEFAULT_RENEW_INTERVAL).await;
            }
        });
    }

    LazyLock::force(&RECONCILE_TOTAL);
    LazyLock::force(&RECONCILE_ERRORS);
    LazyLock::force(&RECONCILE_DURATION);
    LazyLock::force(&PLATFORM_HEALTH);
    LazyLock::force(&COMPONENT_READY_REPLICAS);
    LazyLock::force(&COMPONENT_DESIRED_REPLICAS);

    let addr = SocketAddr::from(([0, 0, 0, 0], 9090));

    println!("  CRD watch ................... ObservabilityPlatform.observability.io/v1beta1");
    println!("  Metrics server .............. http://{addr}");
    println!();
    println!("  Available endpoints:");
    println!("    GET /healthz .............. Liveness probe (always 200 OK)");
    println!("    GET /readyz ............... Readiness probe (503 until first reconcile, then 200)");
    println!("    GET /metrics ............... Prometheus metrics scrape endpoint");
    println!();
    println!("Operator running. Press Ctrl+C to stop.\n");
    println!("{}", "=".repeat(70));

    info!("operator_controller_started");

    let reconcile_state = Arc::new(Mutex::new(ReconcileState { ready: false }));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let http_state = reconcile_state.clone();
    let http_shutdown = shutdown_tx.subscribe();
    let http_handle =
        tokio::spawn(async move { start_metrics_server(http_state, http_shutdown, addr).await });

    let controller_state = reconcile_state.clone();
    let controller = Controller::new(platforms, Default::default())
        .owns(deployments, Default::default())
        .owns(statefulsets, Default::default())
        .owns(services, Default::default())
        .owns(configmaps, Default::default())
        .run(reconcile, error_policy, ctx)
        .for_each(move |result| {
            let state = controller_state.clone();
            async move {
                {
                    let mut s = state.lock().await;
                    if !s.ready {
                        s.ready = true;
                    }
                }
                match result {
                    Ok((_obj, _action)) => {}
                    Err(e) => {
                        warn!(error = %e, "reconcile_dispatch_error");
                        eprintln!("[ERROR] Reconcile dispatch: {e}");
                    }
                }
            }
        });

    tokio::select! {
        _ = controller => {
            info!("operator_controller_stream_ended");
            println!("\nController stream ended unexpectedly.");
        }
        _ = signal::ctrl_c() => {
            info!("shutdown_signal_received");
            println!("\n{}", "=".repeat(70));
            println!("Shutdown signal received. Stopping operator...");
            println!("{}", "=".repeat(70));
        }
    }

    let _ = shutdown_tx.send(());
    let _ = http_handle.await?;

    info!("operator_stopped");
    println!("Operator stopped.");

    Ok(())
}

/* ============================= RECONCILE ============================= */

async fn reconcile(
    platform: Arc<ObservabilityPlatform>,
    ctx: Arc<ReconcileContext>,
) -> Result<Action, ReconcileError> {
    let name = platform.name_any();
    let namespace = platform.namespace().unwrap_or_default();
    let generation = platform.metadata.generation;

    if !ctx.is_leader.load(Ordering::Relaxed) {
        info!(platform = %name, namespace = %namespace, "reconcile_skipped_not_leader");
        return Ok(Action::requeue(REQUEUE_CONVERGING));
    }

    if platform.metadata.deletion_timestamp.is_some() {
        return handle_deletion(&platform, &ctx).await;
    }

    if !teardown::has_finalizer(&platform) {
        teardown::add_finalizer(&ctx.client, &platform).await?;
    }

    if platform.spec.paused == Some(true) {
        info!(platform = %name, namespace = %namespace, "reconcile_paused");
        return Ok(Action::requeue(REQUEUE_READY));
    }

    RECONCILE_TOTAL.inc();
    let _timer = RECONCILE_DURATION.start_timer();

    info!(platform = %name, namespace = %namespace, "reconcile_start");

    let current_phase = platform.status.as_ref().and_then(|s| s.phase).unwrap_or_default();
    let retry_count = platform.status.as_ref().and_then(|s| s.retry_count).unwrap_or(0);

    // Apply version pins, HA replica floors, and the derived
    // environment label once per pass, rather than trusting whatever
    // the spec happened to carry. Managers only ever see the
    // defaulted copy.
    let namespace_labels = ctx.gateway.namespace_labels(&namespace).await.unwrap_or_default();
    let environment = defaulter::derive_environment_label(&namespace_labels);
    let mut defaulted_spec = defaulter::default_platform_spec(&platform.spec);
    let mut overlay = defaulted_spec.global.clone().unwrap_or_default();
    overlay
        .external_labels
        .insert("observability.io/environment".to_string(), environment.clone());
    defaulted_spec.global = Some(overlay);

    let mut defaulted_platform = (*platform).clone();
    defaulted_platform.spec = defaulted_spec;
    let defaulted_platform = defaulted_platform;

    let enabled = defaulted_platform.spec.enabled_components();
    let previous_components = platform.status.as_ref().map(|s| s.components.clone()).unwrap_or_default();

    let dispatch = async {
        let mut results: BTreeMap<String, health::ComponentResult> = BTreeMap::new();
        let mut last_error: Option<String> = None;
        let mut failed_this_pass = false;
        // AND across every error this pass: the pass only counts as
        // retryable if every component failure that occurred is itself
        // retryable. One Validation/Fatal failure among several transient
        // ones still escalates once the budget is exhausted.
        let mut pass_retryable = true;

        if enabled.is_empty() {
            last_error = Some("no components enabled".to_string());
            failed_this_pass = true;
            pass_retryable = false;
        } else {
            for manager in &ctx.managers {
                let kind = manager.kind();
                if !enabled.contains(&kind) {
                    continue;
                }
                match manager.reconcile(&ctx.gateway, &defaulted_platform).await {
                    Ok(mut result) => {
                        let was_ready = previous_components
                            .get(kind.as_str())
                            .and_then(|c| c.phase)
                            .is_some_and(|p| p == Phase::Ready);
                        let sustained = {
                            let mut trackers = ctx.probe_trackers.lock().await;
                            let tracker = trackers
                                .entry((namespace.clone(), name.clone(), kind))
                                .or_insert_with(|| health::ProbeTracker::new(health::DEFAULT_PROBE_MISS_WINDOW));
                            tracker.record(result.is_ready())
                        };
                        // Damping: a component that was Ready does not
                        // flip away from Ready on a single probe miss,
                        // only once misses are sustained past the window.
                        if was_ready && !result.is_ready() && !sustained {
                            result.phase = Phase::Ready;
                        }
                        results.insert(kind.as_str().to_string(), result);
                    }
                    Err(e) => {
                        warn!(platform = %name, component = kind.as_str(), error = %e, "component_reconcile_failed");
                        failed_this_pass = true;
                        pass_retryable &= e.kind.retryable();
                        last_error = Some(e.to_string());
                        results.insert(
                            kind.as_str().to_string(),
                            health::ComponentResult {
                                phase: Phase::Failed,
                                version: None,
                                ready_replicas: 0,
                                desired_replicas: 0,
                                message: e.to_string(),
                                probed: true,
                            },
                        );
                    }
                }
            }
        }

        (results, last_error, failed_this_pass, pass_retryable)
    };

    let (results, last_error, failed_this_pass, pass_retryable) =
        match tokio::time::timeout(RECONCILE_PASS_DEADLINE, dispatch).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(platform = %name, namespace = %namespace, "reconcile_pass_deadline_exceeded");
                (
                    BTreeMap::new(),
                    Some(format!("reconcile pass exceeded {}s deadline", RECONCILE_PASS_DEADLINE.as_secs())),
                    true,
                    true,
                )
            }
        };

    let component_results: Vec<health::ComponentResult> = results.values().cloned().collect();
    let platform_health = health::aggregate(&component_results);

    let mut budget = RetryBudget::with_max_attempts(MAX_RETRY_ATTEMPTS);
    for _ in 0..retry_count {
        budget.record_failure();
    }

    // Escalate to Failed only once the budget is exhausted AND the
    // failure is classified non-transient (spec: "retry count > max
    // AND error classified non-transient"). A sustained retryable
    // failure (PreconditionMissing, Transient, Upgrade) keeps backing
    // off indefinitely instead, per ErrorKind::retryable().
    let input = if enabled.is_empty() {
        Input::PreflightInvalid
    } else if failed_this_pass {
        budget.record_failure();
        if budget.exhausted() && !pass_retryable {
            Input::RetryBudgetExhausted
        } else {
            Input::ComponentsConverging
        }
    } else if component_results.iter().all(|r| r.is_ready()) && !component_results.is_empty() {
        Input::AllComponentsReady
    } else {
        Input::ComponentsConverging
    };

    let next_phase = phase::transition(current_phase, input);
    let new_retry_count = if last_error.is_some() { budget.attempts } else { 0 };

    let now = chrono::Utc::now().to_rfc3339();
    let conditions = health::conditions(next_phase, platform_health, &now);

    let component_statuses: BTreeMap<String, ComponentStatus> = results
        .into_iter()
        .map(|(key, result)| {
            (
                key,
                ComponentStatus {
                    phase: Some(result.phase),
                    version: result.version,
                    ready_replicas: Some(result.ready_replicas),
                    desired_replicas: Some(result.desired_replicas),
                    message: Some(result.message),
                    last_transition_time: Some(now.clone()),
                },
            )
        })
        .collect();

    let ready_count = component_statuses.values().filter(|c| c.phase == Some(Phase::Ready)).count();
    let ready_components = Some(format!("{}/{}", ready_count, component_statuses.len()));
    let component_phases = Some(
        component_statuses
            .iter()
            .map(|(k, v)| format!("{k}={}", v.phase.unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(","),
    );

    for (component, status) in &component_statuses {
        let previous_phase = previous_components.get(component).and_then(|c| c.phase);
        if previous_phase == status.phase {
            continue;
        }
        match status.phase {
            Some(Phase::Ready) => {
                emit_event(
                    &ctx.client,
                    &ctx.reporter,
                    &platform,
                    EventType::Normal,
                    "ComponentReady",
                    format!("{component} is ready"),
                    "Reconciling",
                )
                .await;
            }
            Some(Phase::Failed) => {
                emit_event(
                    &ctx.client,
                    &ctx.reporter,
                    &platform,
                    EventType::Warning,
                    "ComponentFailed",
                    format!("{component}: {}", status.message.clone().unwrap_or_default()),
                    "Reconciling",
                )
                .await;
            }
            _ => {}
        }
    }

    let git_ops_status = platform.spec.git_ops.as_ref().map(|reference| {
        let sync_phase = gitops::sync_phase(
            reference.target_revision.as_deref(),
            reference.target_revision.as_deref(),
        );
        GitOpsStatus {
            sync_phase: Some(sync_phase),
            revision: reference.target_revision.clone(),
            last_synced_at: Some(now.clone()),
        }
    });

    // Update Prometheus gauges
    PLATFORM_HEALTH
        .with_label_values(&[&namespace, &name])
        .set(health_metric_value(platform_health));
    for (component, status) in &component_statuses {
        COMPONENT_READY_REPLICAS
            .with_label_values(&[&namespace, &name, component])
            .set(status.ready_replicas.unwrap_or(0) as i64);
        COMPONENT_DESIRED_REPLICAS
            .with_label_values(&[&namespace, &name, component])
            .set(status.desired_replicas.unwrap_or(0) as i64);
    }

    let status = obsplatform::crd::ObservabilityPlatformStatus {
        phase: Some(next_phase),
        observed_generation: generation,
        health: Some(platform_health),
        components: component_statuses,
        conditions,
        endpoints: BTreeMap::new(),
        retry_count: Some(new_retry_count),
        last_error,
        git_ops: git_ops_status,
        ready_components,
        component_phases,
    };

    let status_patch = serde_json::json!({ "status": status });
    ctx.gateway
        .patch_status::<ObservabilityPlatform>(&namespace, &name, status_patch)
        .await?;

    if next_phase != current_phase {
        let event_type = if matches!(next_phase, Phase::Failed) { EventType::Warning } else { EventType::Normal };
        emit_event(
            &ctx.client,
            &ctx.reporter,
            &platform,
            event_type,
            "PhaseTransition",
            format!("{current_phase} -> {next_phase} (environment={environment})"),
            "Reconciling",
        )
        .await;
    }

    info!(
        platform = %name,
        namespace = %namespace,
        phase = %next_phase,
        health = %platform_health,
        "reconcile_evaluated"
    );

    let requeue = match next_phase {
        Phase::Ready | Phase::Degraded => REQUEUE_READY,
        Phase::Failed => budget.backoff(),
        _ => REQUEUE_CONVERGING,
    };

    Ok(Action::requeue(requeue))
}

async fn handle_deletion(
    platform: &ObservabilityPlatform,
    ctx: &ReconcileContext,
) -> Result<Action, ReconcileError> {
    let name = platform.name_any();
    let namespace = platform.namespace().unwrap_or_default();

    info!(platform = %name, namespace = %namespace, "handling_deletion");

    let _ = PLATFORM_HEALTH.remove_label_values(&[&namespace, &name]);

    let done = teardown::run(&ctx.client, &ctx.gateway, platform, &ctx.managers, |kind| {
        let client = ctx.client.clone();
        let reporter = ctx.reporter.clone();
        let platform = platform.clone();
        let kind = kind.as_str().to_string();
        Box::pin(async move {
            emit_event(
                &client,
                &reporter,
                &platform,
                EventType::Normal,
                "TeardownStepComplete",
                format!("{kind} torn down"),
                "Deleting",
            )
            .await;
        })
    })
    .await?;
    if done {
        emit_event(
            &ctx.client,
            &ctx.reporter,
            platform,
            EventType::Normal,
            "TeardownComplete",
            "all components torn down, finalizer released".to_string(),
            "Deleting",
        )
        .await;
        Ok(Action::await_change())
    } else {
        Ok(Action::requeue(REQUEUE_DELETING))
    }
}

/// Publish a Kubernetes event against a platform. Failures just log —
/// a dropped event never blocks reconciliation.
async fn emit_event(
    client: &Client,
    reporter: &Reporter,
    platform: &ObservabilityPlatform,
    type_: EventType,
    reason: &str,
    note: String,
    action: &str,
) {
    let recorder = Recorder::new(client.clone(), reporter.clone(), platform.object_ref(&()));
    if let Err(e) = recorder
        .publish(&Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: action.to_string(),
            secondary: None,
        })
        .await
    {
        warn!(platform = %platform.name_any(), error = %e, "event_publish_failed");
    }
}

/* ============================= ERROR POLICY ============================= */

fn error_policy(
    _platform: Arc<ObservabilityPlatform>,
    error: &ReconcileError,
    _ctx: Arc<ReconcileContext>,
) -> Action {
    RECONCILE_ERRORS.inc();
    warn!(error = %error, "reconcile_error");
    Action::requeue(Duration::from_secs(60))
}

/* ============================= HTTP SERVER ============================= */

pub(crate) fn build_reconcile_router(state: Arc<Mutex<ReconcileState>>) -> Router {
    Router::new()
        .route("/metrics", get(reconcile_metrics_handler))
        .route("/healthz", get(|| async { (StatusCode::OK, "OK") }))
        .route(
            "/readyz",
            get({
                let state = state.clone();
                move || reconcile_ready_handler(state.clone())
            }),
        )
}

async fn start_metrics_server(
    state: Arc<Mutex<ReconcileState>>,
    mut shutdown: broadcast::Receiver<()>,
    addr: SocketAddr,
) -> Result<()> {
    let app = build_reconcile_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind metrics server on :9090")?;

    info!(addr = %addr, "reconcile_metrics_server_started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}

async fn reconcile_ready_handler(state: Arc<Mutex<ReconcileState>>) -> impl IntoResponse {
    let state = state.lock().await;
    if state.ready {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn reconcile_metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => match String::from_utf8(buffer) {
            Ok(body) => (StatusCode::OK, body),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error".to_string()),
        },
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error".to_string()),
    }
}

/* ============================= TESTS ============================= */

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_reconcile_state(ready: bool) -> Arc<Mutex<ReconcileState>> {
        Arc::new(Mutex::new(ReconcileState { ready }))
    }

    #[test]
    fn test_health_metric_values_are_ordered() {
        assert!(health_metric_value(PlatformHealth::Healthy) > health_metric_value(PlatformHealth::Degraded));
        assert!(health_metric_value(PlatformHealth::Degraded) > health_metric_value(PlatformHealth::Unhealthy));
        assert!(health_metric_value(PlatformHealth::Unhealthy) > health_metric_value(PlatformHealth::Unknown));
    }

    #[tokio::test]
    async fn test_reconcile_healthz_returns_ok() {
        let app = build_reconcile_router(test_reconcile_state(false));
        let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_reconcile_readyz_when_ready() {
        let app = build_reconcile_router(test_reconcile_state(true));
        let req = Request::builder().uri("/readyz").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reconcile_readyz_when_not_ready() {
        let app = build_reconcile_router(test_reconcile_state(false));
        let req = Request::builder().uri("/readyz").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_reconcile_metrics_returns_ok() {
        let app = build_reconcile_router(test_reconcile_state(false));
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_reconcile_duration_metric_registered() {
        LazyLock::force(&RECONCILE_DURATION);
        let families = REGISTRY.gather();
        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"observabilityplatform_reconcile_duration_seconds"));
    }
}
