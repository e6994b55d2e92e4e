//! OSC effects relay server.
//!
//! Receives note events over OSC/UDP, fans them out to every connected
//! viewer and fires visual effects when a viewer's modules see a new match.

mod api;
mod config;
mod ingress;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::ConfigLoader;
use ingress::OscIngress;
use oscfx_core::effects::EffectAggregator;
use oscfx_core::processors::{BroadcastHub, EventIngest};
use server::{build_router, run_server};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// OSC effects relay - fans note events out to viewers and fires effects
#[derive(Parser, Debug)]
#[command(name = "oscfx-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file [default: ./oscfx-config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP/WebSocket listen address (e.g., 0.0.0.0:8081)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override the OSC UDP listen address (e.g., 0.0.0.0:57121)
    #[arg(long)]
    osc_listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting oscfx-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = ConfigLoader::new(args.config.as_deref(), args.listen, args.osc_listen);
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!(
        retention = ?loaded_config.hub.retention,
        default_effect = %loaded_config.default_effect,
        "Configuration loaded from {:?}",
        config_loader.config_path()
    );

    // Build the pipeline
    let effects = Arc::new(EffectAggregator::new());
    let hub = Arc::new(BroadcastHub::new(loaded_config.hub, effects));
    let ingest = Arc::new(EventIngest::new(hub.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ingress = OscIngress::bind(
        loaded_config.osc_listen,
        ingest.clone(),
        loaded_config.max_packet_size,
        shutdown_rx,
    )
    .await
    .map_err(|e| {
        tracing::error!("Failed to bind OSC socket on {}: {}", loaded_config.osc_listen, e);
        e
    })?;
    tracing::info!("OSC ingress listening on {}", loaded_config.osc_listen);
    let ingress_handle = tokio::spawn(ingress.run());

    let state = AppState::new(hub.clone(), loaded_config.default_effect);
    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", loaded_config.listen);
    let result = run_server(router, loaded_config.listen).await;

    // Stop the ingress loop
    let _ = shutdown_tx.send(true);
    if let Err(e) = ingress_handle.await {
        tracing::error!("OSC ingress task failed: {}", e);
    }

    tracing::info!(
        malformed = ingest.malformed(),
        dropped_deliveries = hub.dropped_deliveries(),
        "Server shutdown complete"
    );

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,oscfx_core=info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
