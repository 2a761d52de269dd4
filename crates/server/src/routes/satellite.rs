//! Satellite resource handlers: ObservationDefinition and SpecimenDefinition

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use labcat_core::{Catalog, ObservationDefinition, Resource, SpecimenDefinition};

use crate::error::AppError;

/// POST /ObservationDefinition - Create an observation definition
pub async fn create_observation(
    State(catalog): State<Arc<Catalog>>,
    Json(body): Json<ObservationDefinition>,
) -> Result<impl IntoResponse, AppError> {
    let created = catalog.create_satellite(Resource::ObservationDefinition(body))?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /ObservationDefinition/{id} - Read an observation definition
pub async fn read_observation(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let def = catalog.get_observation(&id)?;
    Ok(Json(def))
}

/// POST /SpecimenDefinition - Create a specimen definition
pub async fn create_specimen(
    State(catalog): State<Arc<Catalog>>,
    Json(body): Json<SpecimenDefinition>,
) -> Result<impl IntoResponse, AppError> {
    let created = catalog.create_satellite(Resource::SpecimenDefinition(body))?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /SpecimenDefinition/{id} - Read a specimen definition
pub async fn read_specimen(
    State(catalog): State<Arc<Catalog>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let def = catalog.get_specimen(&id)?;
    Ok(Json(def))
}
