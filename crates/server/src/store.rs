//! In-memory persistence backend.
//!
//! Implements the core's `Store` trait: deletes are tombstones (the record
//! stays for audit) and every write appends to the audit trail.

use std::collections::HashMap;
use std::sync::RwLock;

use labcat_core::{AuditRecord, Resource, Store, StoreError};

struct StoredRecord {
    resource: Resource,
    deleted: bool,
}

/// Process-local store. A durable backend would implement the same trait.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, StoredRecord>>,
    audits: RwLock<Vec<AuditRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the audit trail, oldest first.
    pub fn audit_trail(&self) -> Result<Vec<AuditRecord>, StoreError> {
        Ok(self.audits.read().map_err(poisoned)?.clone())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("store lock poisoned".to_string())
}

impl Store for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Resource>, StoreError> {
        Ok(self
            .records
            .read()
            .map_err(poisoned)?
            .get(id)
            .filter(|r| !r.deleted)
            .map(|r| r.resource.clone()))
    }

    fn list(&self) -> Result<Vec<Resource>, StoreError> {
        Ok(self
            .records
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|r| !r.deleted)
            .map(|r| r.resource.clone())
            .collect())
    }

    fn put(&self, resource: Resource) -> Result<(), StoreError> {
        self.records.write().map_err(poisoned)?.insert(
            resource.id().to_string(),
            StoredRecord {
                resource,
                deleted: false,
            },
        );
        Ok(())
    }

    fn mark_deleted(&self, id: &str) -> Result<bool, StoreError> {
        match self.records.write().map_err(poisoned)?.get_mut(id) {
            Some(record) if !record.deleted => {
                record.deleted = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn audit(&self, record: AuditRecord) -> Result<(), StoreError> {
        self.audits.write().map_err(poisoned)?.push(record);
        Ok(())
    }
}
