mod definition;
pub mod health;
pub mod metadata;
mod satellite;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use labcat_core::Catalog;

/// Build the catalog resource routes
pub fn catalog_routes() -> Router<Arc<Catalog>> {
    Router::new()
        .route(
            "/LabTestDefinition",
            get(definition::search).post(definition::create),
        )
        .route("/LabTestDefinition/$validate", post(definition::validate))
        .route(
            "/LabTestDefinition/{id}",
            get(definition::read)
                .put(definition::update)
                .delete(definition::delete),
        )
        .route(
            "/ObservationDefinition",
            post(satellite::create_observation),
        )
        .route(
            "/ObservationDefinition/{id}",
            get(satellite::read_observation),
        )
        .route("/SpecimenDefinition", post(satellite::create_specimen))
        .route("/SpecimenDefinition/{id}", get(satellite::read_specimen))
        .route("/Bundle/lab-tests", get(definition::search_bundle))
}
