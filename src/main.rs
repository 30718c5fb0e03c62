mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, CrdAction, GitopsAction};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => commands::version::run()?,
        Commands::Check => commands::check::run().await?,
        Commands::List { resource } => commands::list::run(resource).await?,
        Commands::Crd { action } => match action {
            CrdAction::Generate => commands::crd::generate()?,
            CrdAction::Install => commands::crd::install().await?,
        },
        Commands::Reconcile => commands::reconcile::run().await?,
        Commands::Gitops { action } => match action {
            GitopsAction::Serve { addr, tls_cert, tls_key } => {
                commands::webhook::serve(&addr, &tls_cert, &tls_key).await?
            }
            GitopsAction::CertGenerate {
                service_name,
                namespace,
                output_dir,
                ip_sans,
            } => commands::webhook::cert_generate(&service_name, &namespace, &output_dir, &ip_sans)?,
            GitopsAction::InstallConfig {
                service_name,
                namespace,
                provider,
            } => commands::webhook::install_config(&service_name, &namespace, &provider)?,
        },
    }

    Ok(())
}
