//! Evicted Pod Reaper daemon.
//!
//! Wires the reconciliation core to the built-in polling watch layer and
//! serves `/metrics` and `/health` until a shutdown signal arrives.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;

use common::config::Configuration;
use common::store::MemoryPodStore;
use reaper::controller::Reconciler;
use reaper::http;
use reaper::metrics;
use reaper::runtime::{PollingEventSource, ReaperRuntime};

#[derive(Parser, Debug)]
#[command(name = "evicted-pod-reaper")]
#[command(about = "Deletes evicted pods after a configurable grace period", version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "pod-reaper.toml")]
    config: String,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(long)]
    quiet: bool,
}

fn init_logging(args: &Args) {
    let level = if args.quiet {
        "warn"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => log::info!("Received SIGINT"),
            _ = sigterm.recv() => log::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        log::info!("Received Ctrl+C");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    // Load configuration
    let config = if Path::new(&args.config).exists() {
        Configuration::load_from_path(Path::new(&args.config))
            .context("Failed to load configuration")?
    } else {
        log::info!("Configuration file not found, using defaults and environment");
        Configuration::load().context("Failed to load configuration")?
    };

    log::info!(
        "Starting evicted-pod-reaper: ttl_seconds={} watch_all_namespaces={} namespaces={:?}",
        config.reaper.ttl_seconds,
        config.reaper.watch_all_namespaces,
        config.reaper.namespaces,
    );

    // Register metrics before anything can reconcile
    let (registry, pod_metrics) =
        metrics::create_registry().context("Failed to initialize metrics")?;

    let store = Arc::new(MemoryPodStore::new());
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        pod_metrics,
        config.reaper.ttl_seconds,
    ));
    let source = PollingEventSource::new(
        store,
        config.reaper.namespace_filter(),
        config.watch.poll_interval,
    );
    let runtime = ReaperRuntime::new(reconciler);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = tokio::spawn(http::run_http_server(
        config.http.listen.clone(),
        registry.clone(),
    ));
    let worker_task = tokio::spawn(async move { runtime.run(source, shutdown_rx).await });

    log::info!("Reaper running, waiting for shutdown signal");
    wait_for_shutdown_signal().await?;

    log::info!("Received shutdown signal, stopping reaper");
    shutdown_tx
        .send(true)
        .context("Failed to signal shutdown")?;
    worker_task.await.context("Reaper worker task failed")?;
    http_task.abort();

    log::info!("Reaper stopped");

    Ok(())
}
