//! K8s Healer - autonomous remediation loop for a Kubernetes cluster
//!
//! Samples pod and node state at a fixed cadence, forecasts resource
//! exhaustion, probes containers for trouble, and executes bounded healing
//! actions. A small HTTP API exposes liveness, status and the audit trail.

use anyhow::{Context, Result};
use healer_lib::{AuditLog, ClusterGateway, HealerLoop, KubeGateway, LoopConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::HealerConfig::load()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(fmt::layer().json())
        .init();

    info!(version = VERSION, dry_run = config.dry_run, "Starting k8s-healer");

    // Cluster client construction failure is fatal: nothing works without it.
    let client = kube::Client::try_default()
        .await
        .context("failed to construct cluster client")?;
    info!("Connected to cluster");

    let tick_interval = Duration::from_secs(config.check_interval);
    let gateway: Arc<dyn ClusterGateway> =
        Arc::new(KubeGateway::for_tick_interval(client, tick_interval));
    let audit = AuditLog::new();

    let healer = HealerLoop::new(
        gateway,
        audit.clone(),
        LoopConfig {
            tick_interval,
            dry_run: config.dry_run,
        },
    );

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let state = Arc::new(api::AppState::new(audit));
    let api_handle = tokio::spawn(api::serve(config.port, state));
    let loop_handle = tokio::spawn(healer.run(shutdown_tx.subscribe()));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(());
    let _ = loop_handle.await;
    api_handle.abort();

    Ok(())
}
