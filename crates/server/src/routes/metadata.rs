//! Capability and statistics endpoints

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use labcat_core::{Catalog, ResourceKind};
use serde_json::json;

use crate::error::AppError;

/// GET /metadata - Describe the service and the resource types it serves
pub async fn get() -> impl IntoResponse {
    let interactions = ["read", "create", "update", "delete", "search-type"];
    let resources: Vec<_> = [
        ResourceKind::LabTestDefinition,
        ResourceKind::ObservationDefinition,
        ResourceKind::SpecimenDefinition,
    ]
    .iter()
    .map(|kind| {
        json!({
            "type": kind.as_str(),
            "interaction": interactions.iter().map(|code| json!({"code": code})).collect::<Vec<_>>(),
        })
    })
    .collect();

    Json(json!({
        "resourceType": "CapabilityStatement",
        "name": "LabTestCatalog",
        "status": "active",
        "kind": "instance",
        "format": ["json"],
        "rest": [{
            "mode": "server",
            "resource": resources,
        }],
    }))
}

/// GET /metadata/statistics - Aggregate counts over the live catalog
pub async fn statistics(
    State(catalog): State<Arc<Catalog>>,
) -> Result<impl IntoResponse, AppError> {
    let stats = catalog.statistics()?;
    Ok(Json(stats))
}

/// GET /metadata/categories - Distinct categories currently in the catalog
pub async fn categories(
    State(catalog): State<Arc<Catalog>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(catalog.categories()?))
}
