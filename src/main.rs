use std::path::Path;
use std::sync::Arc;

use shard_control_plane::metrics;
use shard_control_plane::start_rpc_server;
use shard_control_plane::BootstrapConfig;
use shard_control_plane::ConfigPublisher;
use shard_control_plane::ControlPlane;
use shard_control_plane::DiscoveryServer;
use shard_control_plane::Error;
use shard_control_plane::Result;
use shard_control_plane::Settings;
use shard_control_plane::SystemError;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&settings.server.log_dir)?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let plane = Arc::new(ControlPlane::default());
    if settings.bootstrap.enabled {
        bootstrap(&plane, &settings.bootstrap)?;
    }

    if settings.monitoring.prometheus_enabled {
        tokio::spawn(metrics::start_server(settings.monitoring.metrics_addr(), graceful_rx.clone()));
    }

    let discovery = DiscoveryServer::new(plane.cache().clone(), settings.discovery.clone(), graceful_rx.clone());

    info!("Application started. Waiting for CTRL+C signal...");
    // Listen on Shutdown Signal
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = start_rpc_server(discovery, plane, &settings.server, graceful_rx).await {
        error!("rpc server stops: {:?}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}

/// Publishes the configured initial values so the first nodes to connect
/// receive a complete snapshot.
fn bootstrap(
    plane: &ControlPlane,
    config: &BootstrapConfig,
) -> Result<()> {
    let receipt = plane.publish_config(&config.node_id, &config.shard_config())?;
    info!(
        node_id = %config.node_id,
        snapshot_version = %receipt.snapshot_version,
        "Bootstrap configuration published"
    );
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        SystemError::SignalSendFailed(e.to_string())
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    let log_file = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix("control-plane")
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| Error::Fatal(format!("cannot open log file in {}: {}", log_dir.display(), e)))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
