use thiserror::Error;

use crate::store::StoreError;
use crate::validate::Issue;

/// Catalog error taxonomy.
///
/// Everything here is returned as a value to the caller; only
/// `IndexConsistency` marks an internal invariant violation that should be
/// escalated rather than handled.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("id not indexed: {0}")]
    NotIndexed(String),

    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("validation failed with {} issue(s)", .0.len())]
    Validation(Vec<Issue>),

    #[error("index consistency violation: {0}")]
    IndexConsistency(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
