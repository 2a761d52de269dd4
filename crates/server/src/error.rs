//! Application error handling

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use labcat_core::{CatalogError, IssueType, OperationOutcome};

/// Application error: a catalog error on its way to the wire.
#[derive(Debug)]
pub struct AppError(pub CatalogError);

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, outcome) = match self.0 {
            CatalogError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, OperationOutcome::not_found(&msg))
            }
            CatalogError::DuplicateId(id) => (
                StatusCode::CONFLICT,
                OperationOutcome::error(IssueType::Duplicate, &format!("duplicate id: {}", id)),
            ),
            CatalogError::Conflict(msg) => (StatusCode::CONFLICT, OperationOutcome::conflict(&msg)),
            CatalogError::InvalidParameter(msg) | CatalogError::UnknownResourceType(msg) => {
                (StatusCode::BAD_REQUEST, OperationOutcome::invalid(&msg))
            }
            CatalogError::Validation(issues) => (
                StatusCode::BAD_REQUEST,
                OperationOutcome::from_issues(issues),
            ),
            // Internal invariant violations: log and surface as fatal,
            // continuing would risk silently wrong search results.
            CatalogError::IndexConsistency(msg) => {
                tracing::error!(error = %msg, "index consistency violation");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    OperationOutcome::error(IssueType::Exception, &msg),
                )
            }
            CatalogError::NotIndexed(id) => {
                tracing::error!(id = %id, "id present in persistence but not indexed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    OperationOutcome::error(IssueType::Exception, &format!("id not indexed: {}", id)),
                )
            }
            CatalogError::Store(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                OperationOutcome::error(IssueType::Exception, &err.to_string()),
            ),
        };

        (status, Json(outcome)).into_response()
    }
}
