//! labcat-server library crate
//!
//! Exposes `build_app`, `config` and the in-memory store for integration
//! tests. The actual binary entrypoint is in `main.rs`.

pub mod config;
mod error;
mod middleware;
mod routes;
pub mod store;

use std::sync::Arc;

use axum::{Router, middleware as axum_mw, routing::get};
use labcat_core::Catalog;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Build the full application router with all routes and middleware.
///
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a TCP port.
pub fn build_app(catalog: Arc<Catalog>, config: &Config) -> Router {
    // Build CORS layer
    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Build application
    Router::new()
        .merge(routes::catalog_routes())
        .route("/metadata", get(routes::metadata::get))
        .route("/metadata/statistics", get(routes::metadata::statistics))
        .route("/metadata/categories", get(routes::metadata::categories))
        .route("/health", get(routes::health::check))
        .with_state(catalog)
        .layer(axum_mw::from_fn(middleware::audit_middleware))
        .layer(axum_mw::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
