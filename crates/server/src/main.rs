//! labcat-server: Lab Test Catalog HTTP server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use labcat_core::Catalog;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labcat_server::config::Config;
use labcat_server::store::MemoryStore;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();

    // Create the catalog over the in-memory store and rebuild the index
    let store = Arc::new(MemoryStore::new());
    let catalog = Arc::new(Catalog::new(store));
    let indexed = catalog
        .rebuild()
        .expect("Failed to rebuild index from persistence");
    tracing::info!(indexed, "Catalog index rebuilt");

    // Build application
    let app = labcat_server::build_app(catalog, &config);

    // Start server
    let addr: SocketAddr = config.bind_address.parse().expect("Invalid bind address");
    tracing::info!("Starting lab test catalog server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shutdown complete");
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
