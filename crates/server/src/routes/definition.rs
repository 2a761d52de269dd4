//! LabTestDefinition HTTP handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use labcat_core::{Catalog, LabTestDefinition, OperationOutcome, Resource, SearchParams};

use crate::error::AppError;

/// GET /LabTestDefinition - Search definitions
///
/// Raw query pairs map 1:1 onto the planner's parameter set; repeated names
/// (`code`) and list values (`code:in`) come through unchanged.
pub async fn search(
    State(catalog): State<Arc<Catalog>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let params = SearchParams::from_pairs(&pairs)?;
    let results = catalog.search(&params)?;
    Ok(Json(results))
}

/// GET /Bundle/lab-tests - Same page packaged as a searchset Bundle
pub async fn search_bundle(
    State(catalog): State<Arc<Catalog>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    let params = SearchParams::from_pairs(&pairs)?;
    let bundle = catalog.search_bundle(&params)?;
    Ok(Json(bundle))
}

/// POST /LabTestDefinition - Create a new definition
pub async fn create(
    State(catalog): State<Arc<Catalog>>,
    Json(body): Json<LabTestDefinition>,
) -> Result<impl IntoResponse, AppError> {
    let created = catalog.create_definition(body)?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/LabTestDefinition/{}", created.id).parse() {
        headers.insert(header::LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(created)))
}

/// GET /LabTestDefinition/{id} - Read a definition
pub async fn read(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let def = catalog.get_definition(&id)?;
    Ok(Json(def))
}

/// PUT /LabTestDefinition/{id} - Update a definition
pub async fn update(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
    Json(body): Json<LabTestDefinition>,
) -> Result<impl IntoResponse, AppError> {
    let updated = catalog.update_definition(&id, body)?;
    Ok(Json(updated))
}

/// DELETE /LabTestDefinition/{id} - Delete a definition
pub async fn delete(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    catalog.delete_definition(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /LabTestDefinition/$validate - Validate without storing
///
/// Always 200; the outcome carries the full ordered issue list, never just
/// the first finding.
pub async fn validate(
    State(catalog): State<Arc<Catalog>>,
    Json(body): Json<LabTestDefinition>,
) -> Result<impl IntoResponse, AppError> {
    let issues = catalog.validate(&Resource::LabTestDefinition(body))?;
    let outcome = if issues.is_empty() {
        OperationOutcome::success("resource is valid")
    } else {
        OperationOutcome::from_issues(issues)
    };
    Ok(Json(outcome))
}
