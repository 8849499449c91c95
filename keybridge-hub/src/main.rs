//! Keybridge Hub Server
//!
//! The mediating principal that owns the key-value store. Provides:
//! - WebSocket endpoint carrying the bridge protocol, with the peer's
//!   `Origin` header as the authenticated principal
//! - HTTP endpoints for health checks and Prometheus metrics
//! - Best-effort teardown broadcast to every incorporated origin on
//!   shutdown

mod config;
mod handler;
mod http;
mod metrics;

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::net::TcpListener;
use tracing::{info, warn};

use keybridge_core::{create_adapter, Hub, StorageAdapter, StorageBackend};

use config::HubConfig;
use handler::PeerMap;
use http::{create_router, HttpState};
use metrics::HubMetrics;

/// Dispatcher shared across connection handlers. The lock keeps handler
/// execution one-at-a-time, matching the protocol's cooperative model.
pub type SharedHub = Arc<Mutex<Hub<Box<dyn StorageAdapter>>>>;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keybridge_hub=info".parse().unwrap()),
        )
        .init();

    // Load configuration
    let config = HubConfig::from_env();
    info!("Starting Keybridge Hub v{}", env!("CARGO_PKG_VERSION"));
    info!("WebSocket: {}", config.listen_addr);
    info!("HTTP (health/metrics): {}", config.http_addr);
    info!("Storage backend: {:?}", config.storage_backend);
    info!("Candidate origins: {}", config.allowed_origins.len());
    if config.allowed_origins.is_empty() {
        warn!("KEYBRIDGE_ALLOWED_ORIGINS is empty; no client will be able to mount");
    }

    if config.storage_backend == StorageBackend::Sqlite {
        std::fs::create_dir_all(&config.data_dir).expect("Failed to create data directory");
    }
    let storage = create_adapter(config.storage_backend, Some(&config.data_dir))
        .expect("Failed to open storage backend");

    let hub: SharedHub = Arc::new(Mutex::new(Hub::new(config.allowed_origins.clone(), storage)));
    let metrics = HubMetrics::new();
    let peers = PeerMap::new();
    let start_time = Instant::now();

    // Start HTTP server for health/metrics
    let http_state = HttpState {
        metrics: metrics.clone(),
        hub: hub.clone(),
        start_time,
        metrics_token: config.metrics_token.clone(),
    };
    let http_router = create_router(http_state);
    let http_addr = config.http_addr;
    let http_listener = TcpListener::bind(&http_addr)
        .await
        .expect("Failed to bind HTTP listener");
    tokio::spawn(async move {
        info!("HTTP server listening on {}", http_addr);
        axum::serve(http_listener, http_router).await.unwrap();
    });

    // Teardown broadcast on ctrl-c, then exit.
    let shutdown_hub = hub.clone();
    let shutdown_peers = peers.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let notices = shutdown_hub.lock().expect("hub lock poisoned").shutdown();
            info!("Broadcasting teardown notice to {} origins", notices.len());
            for notice in notices {
                shutdown_peers.route(notice);
            }
            // Give the close notices a moment to flush before exiting.
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            std::process::exit(0);
        }
    });

    // Accept WebSocket connections
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .expect("Failed to bind WebSocket listener");
    info!("WebSocket server listening on {}", config.listen_addr);

    while let Ok((stream, addr)) = listener.accept().await {
        let hub = hub.clone();
        let peers = peers.clone();
        let metrics = metrics.clone();
        let max_frame_size = config.max_frame_size;

        tokio::spawn(async move {
            info!("New connection from {}", addr);
            metrics.connections_total.inc();
            metrics.connections_active.inc();

            handler::handle_connection(stream, hub, peers, metrics.clone(), max_frame_size).await;

            metrics.connections_active.dec();
            info!("Connection closed: {}", addr);
        });
    }
}
