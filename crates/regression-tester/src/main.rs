use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use provisioner::orchestrator::{self, AutoConfirm, ConfirmationGate, LineGate};

mod config;

use config::Config;

/// Creates a batch of Keycloak users concurrently, reports the count, then
/// sweeps and deletes them again.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Do not wait for the enter key before deleting
    #[arg(long)]
    yes: bool,

    /// Leave the created users in place
    #[arg(long)]
    skip_cleanup: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    info!("Starting Keycloak regression tester...");

    // 1. Load configuration
    let config = Config::from_env().context("Failed to load KC_* configuration")?;
    config.validate().context("Invalid configuration")?;
    info!("Configuration loaded: {}", config);

    // 2. Connect
    let facade = Arc::new(config.facade().context("Failed to set up Keycloak client")?);

    // 3. Run
    let mut gate: Box<dyn ConfirmationGate> = if cli.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(LineGate::stdin())
    };

    let options = config.run_options(!cli.skip_cleanup);
    let summary = orchestrator::run(facade, &options, gate.as_mut())
        .await
        .with_context(|| format!("Regression run against realm {} failed", config.target_realm()))?;

    info!(
        "Done: created {} of {} user(s), {} unresolved, {} found after provisioning, {} deleted",
        summary.provisioned.created.len(),
        summary.provisioned.attempted(),
        summary.provisioned.unresolved,
        summary.count_after_provisioning,
        summary.deleted
    );

    Ok(())
}
