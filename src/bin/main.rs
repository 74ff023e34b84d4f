//! docker-dns-sync binary entry point.

use clap::Parser;
use docker_dns_sync::registry::MemoryRegistry;
use docker_dns_sync::watcher::DockerWatcher;
use docker_dns_sync::{telemetry, Config, SyncEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Synchronizes DNS records in a shared registry with labels declared by
/// Docker containers.
#[derive(Parser, Debug)]
#[command(name = "docker-dns-sync")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "docker-dns-sync.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()))
        .add_source(
            config::Environment::with_prefix("DOCKER_DNS_SYNC")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    config.sync.validate()?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        hostname = %config.sync.hostname,
        poll_interval = config.sync.poll_interval,
        label_prefix = %config.sync.label_prefix,
        "Starting docker-dns-sync"
    );

    // Setup graceful shutdown
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Unable to listen for shutdown signal");
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    // Wire collaborators and run
    let watcher = Arc::new(DockerWatcher::connect()?);
    let registry = Arc::new(MemoryRegistry::new(config.sync.hostname.clone()));
    let engine = SyncEngine::new(config.sync, watcher, registry);

    let result = engine.run(shutdown).await;

    if let Err(e) = result {
        error!("Sync engine error: {}", e);
        return Err(e.into());
    }

    info!("docker-dns-sync shutdown complete");
    Ok(())
}
