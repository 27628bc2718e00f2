//! VisionBridge Server
//!
//! Hosts the command router and event streams over HTTP and WebSocket, fed by
//! a synthetic camera and a demo model loader.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use visionbridge_dispatch::VisionBridge;

mod camera;
mod config;
mod demo_model;
mod routes;
mod state;

use camera::SyntheticCamera;
use config::ServerConfig;
use demo_model::DemoModelLoader;
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "visionbridge-server")]
#[command(about = "VisionBridge inference command and event server", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Listen address
    #[arg(short = 'l', long)]
    listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("Starting VisionBridge server");

    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Models directory: {}", config.models_dir.display());
    info!(
        "Frame stride: {}, drop while busy: {}",
        config.dispatch.frame_stride, config.dispatch.drop_frames_while_busy
    );

    let metrics_handle = init_metrics()?;

    let camera = Arc::new(SyntheticCamera::new(config.camera.clone()));
    let loader = Arc::new(DemoModelLoader::new(config.models_dir.clone()));
    let bridge = VisionBridge::new(config.dispatch.clone(), loader, Arc::clone(&camera) as _)?;
    camera.start(Arc::clone(bridge.dispatcher()) as _)?;

    let app = routes::create_router(AppState::new(bridge, metrics_handle));

    let addr: SocketAddr = format!("{}:{}", config.listen, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tokio::task::spawn_blocking(move || camera.shutdown()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("visionbridge=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("visionbridge=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    visionbridge_dispatch::metrics::describe();

    info!("Metrics exporter initialized");
    Ok(handle)
}
