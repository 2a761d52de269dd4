//! Persistence collaborator interface.
//!
//! The core never talks to a storage engine directly; it consumes this
//! narrow trait. Durability, transactions and the audit trail's retention
//! are the backend's concern.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::model::{Resource, ResourceKind};

/// Backend failure, opaque to the core.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

/// Append-only audit entry recorded for every write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub action: AuditAction,
    pub resource_type: ResourceKind,
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        action: AuditAction,
        resource_type: ResourceKind,
        resource_id: impl Into<String>,
        before: Option<JsonValue>,
        after: Option<JsonValue>,
    ) -> Self {
        Self {
            action,
            resource_type,
            resource_id: resource_id.into(),
            actor: None,
            before,
            after,
            timestamp: Utc::now(),
        }
    }
}

/// Narrow persistence interface consumed by the catalog.
///
/// `get`/`list` must not return logically deleted records, and the backend
/// must guarantee read-after-write visibility for ids it has accepted.
pub trait Store: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Resource>, StoreError>;

    /// All live resources, used for startup index rebuild.
    fn list(&self) -> Result<Vec<Resource>, StoreError>;

    fn put(&self, resource: Resource) -> Result<(), StoreError>;

    /// Tombstone a record; it stays in persistence for audit. Returns
    /// whether a live record with that id existed.
    fn mark_deleted(&self, id: &str) -> Result<bool, StoreError>;

    fn audit(&self, record: AuditRecord) -> Result<(), StoreError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Minimal in-memory store for unit tests.
    pub struct TestStore {
        records: Mutex<HashMap<String, (Resource, bool)>>,
        audits: Mutex<Vec<AuditRecord>>,
    }

    impl TestStore {
        pub fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                audits: Mutex::new(Vec::new()),
            }
        }

        pub fn seed(&self, resource: Resource) {
            self.records
                .lock()
                .unwrap()
                .insert(resource.id().to_string(), (resource, false));
        }

        pub fn audit_len(&self) -> usize {
            self.audits.lock().unwrap().len()
        }
    }

    impl Store for TestStore {
        fn get(&self, id: &str) -> Result<Option<Resource>, StoreError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(id)
                .filter(|(_, deleted)| !deleted)
                .map(|(r, _)| r.clone()))
        }

        fn list(&self) -> Result<Vec<Resource>, StoreError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .values()
                .filter(|(_, deleted)| !deleted)
                .map(|(r, _)| r.clone())
                .collect())
        }

        fn put(&self, resource: Resource) -> Result<(), StoreError> {
            self.records
                .lock()
                .unwrap()
                .insert(resource.id().to_string(), (resource, false));
            Ok(())
        }

        fn mark_deleted(&self, id: &str) -> Result<bool, StoreError> {
            match self.records.lock().unwrap().get_mut(id) {
                Some(entry) if !entry.1 => {
                    entry.1 = true;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        fn audit(&self, record: AuditRecord) -> Result<(), StoreError> {
            self.audits.lock().unwrap().push(record);
            Ok(())
        }
    }
}
