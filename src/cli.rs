use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "observability-platform-operator")]
#[command(about = "Operator for the ObservabilityPlatform composite resource")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display application version
    Version,

    /// Check cluster connectivity and permissions
    Check,

    /// List ObservabilityPlatform resources across the cluster
    List {
        /// Resource type to list (platforms)
        resource: String,
    },

    /// Manage the ObservabilityPlatform CRDs
    Crd {
        #[command(subcommand)]
        action: CrdAction,
    },

    /// Start the ObservabilityPlatform operator reconcile loop
    Reconcile,

    /// Manage the GitOps bridge webhook
    Gitops {
        #[command(subcommand)]
        action: GitopsAction,
    },
}

#[derive(Subcommand)]
pub enum GitopsAction {
    /// Start the GitOps bridge HTTPS server
    Serve {
        #[arg(long, default_value = "0.0.0.0:8443")]
        addr: String,
        #[arg(long, default_value = "tls.crt")]
        tls_cert: String,
        #[arg(long, default_value = "tls.key")]
        tls_key: String,
    },
    /// Generate self-signed TLS certificates for development
    CertGenerate {
        #[arg(long, default_value = "observability-platform-operator-gitops")]
        service_name: String,
        #[arg(long, default_value = "default")]
        namespace: String,
        #[arg(long, default_value = ".")]
        output_dir: String,
        /// Additional IP SANs (e.g. --ip-san 192.168.1.26)
        #[arg(long = "ip-san")]
        ip_sans: Vec<String>,
    },
    /// Print the webhook endpoint configuration for a GitOps provider
    InstallConfig {
        #[arg(long, default_value = "observability-platform-operator-gitops")]
        service_name: String,
        #[arg(long, default_value = "default")]
        namespace: String,
        #[arg(long, default_value = "github")]
        provider: String,
    },
}

#[derive(Subcommand)]
pub enum CrdAction {
    /// Print the CustomResourceDefinition YAML to stdout
    Generate,

    /// Install the CRDs into the connected cluster
    Install,
}
