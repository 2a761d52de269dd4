//! Health check endpoint

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use labcat_core::Catalog;
use serde::Serialize;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    indexed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// GET /health - Check index availability and return server health status
pub async fn check(State(catalog): State<Arc<Catalog>>) -> impl IntoResponse {
    match catalog.statistics() {
        Ok(stats) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                indexed: Some(stats.total),
                reason: None,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    indexed: None,
                    reason: Some(e.to_string()),
                }),
            )
        }
    }
}
