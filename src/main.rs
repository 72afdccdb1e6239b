use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use world_sync_server::config::ServerConfig;
use world_sync_server::metrics::{self, Metrics};
use world_sync_server::net::gateway::{self, AppState};
use world_sync_server::persist::PlayerStore;
use world_sync_server::room::manager::RoomManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("World Sync Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ServerConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: {}:{}, max_rooms={}, speed_check={}",
        config.bind_address, config.port, config.max_rooms, config.speed_check
    );

    // Initialize shared state
    let metrics = Arc::new(Metrics::new());
    metrics::spawn_summary_task(metrics.clone());

    let store = PlayerStore::open(&config.data_dir);
    let manager = Arc::new(RoomManager::new(&config, store.clone(), metrics.clone()));

    let app = gateway::router(AppState {
        manager,
        store: store.clone(),
        metrics,
    });

    let addr = SocketAddr::new(config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server ready on http://{addr}");

    // Shutdown signal handler
    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
    };

    // Run server with graceful shutdown
    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            if let Err(e) = result {
                error!("Server error: {e}");
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    // Push any debounced state out before exiting.
    if let Err(e) = store.flush() {
        warn!("final state flush failed: {e}");
    }
    info!("Server stopped");

    Ok(())
}
