//! labcat-core: validation and search engines for the lab test catalog.
//!
//! This crate holds the transport-agnostic core: the resource model, the
//! schema registry, the four-pass validator, the inverted index with facet
//! counters, the query planner and the result assembler, all owned by a
//! [`catalog::Catalog`] instance. Persistence is consumed through the
//! [`store::Store`] trait; HTTP lives in the server crate.

pub mod assemble;
pub mod bundle;
pub mod catalog;
pub mod error;
pub mod index;
pub mod model;
pub mod outcome;
pub mod query;
pub mod schema;
pub mod store;
pub mod validate;

// Re-export the types a transport layer needs
pub use assemble::SearchResults;
pub use bundle::{Bundle, BundleEntry, BundleSearch, BundleType};
pub use catalog::{Catalog, CatalogStatistics};
pub use error::CatalogError;
pub use model::{
    AppliesTo, CodeableConcept, Coding, LabTestDefinition, ObservationDefinition, ReferenceRange,
    Resource, ResourceKind, SpecimenDefinition, Status,
};
pub use outcome::{IssueSeverity, IssueType, OperationOutcome, OperationOutcomeIssue};
pub use query::{SearchParams, SortKey};
pub use store::{AuditAction, AuditRecord, Store, StoreError};
pub use validate::Issue;
