//! The catalog service: one shared index behind a read-write lock plus the
//! persistence collaborator.
//!
//! Writers (create/update/delete) serialize on the write lock, so readers
//! never observe a definition absent or doubly counted mid-update. All
//! operations complete synchronously.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::assemble::{self, SearchResults};
use crate::bundle::Bundle;
use crate::error::CatalogError;
use crate::index::{FacetDimension, Index, IndexDocument};
use crate::model::{
    LabTestDefinition, ObservationDefinition, Resource, ResourceKind, SpecimenDefinition,
};
use crate::query::{self, SearchParams};
use crate::schema;
use crate::store::{AuditAction, AuditRecord, Store};
use crate::validate::{self, Issue, has_blocking};

/// Aggregate counts over the live catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatistics {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

/// Explicitly constructed, explicitly owned catalog instance.
pub struct Catalog {
    store: Arc<dyn Store>,
    index: RwLock<Index>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            index: RwLock::new(Index::new()),
        }
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, Index>, CatalogError> {
        self.index
            .read()
            .map_err(|_| CatalogError::IndexConsistency("index lock poisoned".to_string()))
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, Index>, CatalogError> {
        self.index
            .write()
            .map_err(|_| CatalogError::IndexConsistency("index lock poisoned".to_string()))
    }

    /// Rebuild the index from the persistence collaborator. Returns the
    /// number of definitions indexed.
    pub fn rebuild(&self) -> Result<usize, CatalogError> {
        let resources = self.store.list()?;
        let mut indexed = 0;
        let mut index = self.write_index()?;
        *index = Index::new();
        for resource in &resources {
            if let Resource::LabTestDefinition(def) = resource {
                let doc = IndexDocument::from_definition(def, self.specimen_type_of(def)?);
                index.insert(doc)?;
                indexed += 1;
            }
        }
        Ok(indexed)
    }

    /// Validate without side effects; callers decide whether blocking
    /// issues stop a write.
    pub fn validate(&self, resource: &Resource) -> Result<Vec<Issue>, CatalogError> {
        validate::validate(
            resource,
            schema::resolve(resource.kind()),
            self.store.as_ref(),
        )
    }

    /// Validated insert. Assigns an id when absent and sets both timestamps.
    pub fn create_definition(
        &self,
        mut def: LabTestDefinition,
    ) -> Result<LabTestDefinition, CatalogError> {
        if def.id.is_empty() {
            def.id = Uuid::new_v4().to_string();
        }
        let now = Utc::now();
        def.created_at = Some(now);
        def.updated_at = Some(now);

        let resource = Resource::LabTestDefinition(def.clone());

        // Writers serialize on the write lock, so the duplicate check, the
        // index insert and the store write cannot interleave with another
        // writer. The index mutation comes first; a failed store write is
        // rolled back so neither side keeps a stray entry.
        let mut index = self.write_index()?;
        if self.store.get(&def.id)?.is_some() {
            return Err(CatalogError::DuplicateId(def.id));
        }
        let issues = self.validate(&resource)?;
        if has_blocking(&issues) {
            return Err(CatalogError::Validation(issues));
        }

        let doc = IndexDocument::from_definition(&def, self.specimen_type_of(&def)?);
        index.insert(doc)?;
        if let Err(err) = self.store.put(resource.clone()) {
            let _ = index.delete(&def.id);
            return Err(err.into());
        }
        drop(index);

        self.store.audit(AuditRecord::new(
            AuditAction::Create,
            ResourceKind::LabTestDefinition,
            &def.id,
            None,
            Some(to_json(&resource)),
        ))?;
        Ok(def)
    }

    /// Validated update: enforces the status-transition rule, recomputes
    /// `updatedAt` and re-indexes atomically.
    pub fn update_definition(
        &self,
        id: &str,
        mut def: LabTestDefinition,
    ) -> Result<LabTestDefinition, CatalogError> {
        // The existence check must see the same state the mutation acts on,
        // so the whole operation runs under the write lock. An update racing
        // a delete otherwise resurrects the tombstoned record.
        let mut index = self.write_index()?;
        let old = match self.store.get(id)? {
            Some(Resource::LabTestDefinition(d)) => d,
            _ => return Err(CatalogError::NotFound(format!("LabTestDefinition/{}", id))),
        };

        // id is immutable once assigned
        def.id = id.to_string();
        if !old.status.can_transition(def.status) {
            return Err(CatalogError::Conflict(format!(
                "illegal status transition {} -> {}",
                old.status.as_str(),
                def.status.as_str()
            )));
        }
        def.created_at = old.created_at;
        def.updated_at = Some(Utc::now());

        let resource = Resource::LabTestDefinition(def.clone());
        let issues = self.validate(&resource)?;
        if has_blocking(&issues) {
            return Err(CatalogError::Validation(issues));
        }

        let doc = IndexDocument::from_definition(&def, self.specimen_type_of(&def)?);
        let previous = index.doc(id).cloned();
        index.update(doc)?;
        if let Err(err) = self.store.put(resource.clone()) {
            if let Some(previous) = previous {
                let _ = index.update(previous);
            }
            return Err(err.into());
        }
        drop(index);

        self.store.audit(AuditRecord::new(
            AuditAction::Update,
            ResourceKind::LabTestDefinition,
            id,
            Some(to_json(&Resource::LabTestDefinition(old))),
            Some(to_json(&resource)),
        ))?;
        Ok(def)
    }

    /// Tombstone in persistence and drop every index entry.
    pub fn delete_definition(&self, id: &str) -> Result<(), CatalogError> {
        let mut index = self.write_index()?;
        let old = match self.store.get(id)? {
            Some(Resource::LabTestDefinition(d)) => d,
            _ => return Err(CatalogError::NotFound(format!("LabTestDefinition/{}", id))),
        };
        index.delete(id)?;
        // The record was live under this lock, so the tombstone must land.
        if !self.store.mark_deleted(id)? {
            return Err(CatalogError::IndexConsistency(format!(
                "record '{}' vanished during delete",
                id
            )));
        }
        drop(index);

        self.store.audit(AuditRecord::new(
            AuditAction::Delete,
            ResourceKind::LabTestDefinition,
            id,
            Some(to_json(&Resource::LabTestDefinition(old))),
            None,
        ))?;
        Ok(())
    }

    pub fn get_definition(&self, id: &str) -> Result<LabTestDefinition, CatalogError> {
        match self.store.get(id)? {
            Some(Resource::LabTestDefinition(d)) => Ok(d),
            _ => Err(CatalogError::NotFound(format!("LabTestDefinition/{}", id))),
        }
    }

    pub fn get_observation(&self, id: &str) -> Result<ObservationDefinition, CatalogError> {
        match self.store.get(id)? {
            Some(Resource::ObservationDefinition(d)) => Ok(d),
            _ => Err(CatalogError::NotFound(format!(
                "ObservationDefinition/{}",
                id
            ))),
        }
    }

    pub fn get_specimen(&self, id: &str) -> Result<SpecimenDefinition, CatalogError> {
        match self.store.get(id)? {
            Some(Resource::SpecimenDefinition(d)) => Ok(d),
            _ => Err(CatalogError::NotFound(format!("SpecimenDefinition/{}", id))),
        }
    }

    /// Validated insert of a satellite record. Satellites are stored and
    /// resolvable by reference but never indexed for search.
    pub fn create_satellite(&self, mut resource: Resource) -> Result<Resource, CatalogError> {
        match &mut resource {
            Resource::LabTestDefinition(_) => {
                return Err(CatalogError::InvalidParameter(
                    "lab test definitions are created through their own operation".to_string(),
                ));
            }
            Resource::ObservationDefinition(d) => {
                if d.id.is_empty() {
                    d.id = Uuid::new_v4().to_string();
                }
            }
            Resource::SpecimenDefinition(d) => {
                if d.id.is_empty() {
                    d.id = Uuid::new_v4().to_string();
                }
            }
        }
        let id = resource.id().to_string();
        if self.store.get(&id)?.is_some() {
            return Err(CatalogError::DuplicateId(id));
        }
        let issues = self.validate(&resource)?;
        if has_blocking(&issues) {
            return Err(CatalogError::Validation(issues));
        }
        self.store.put(resource.clone())?;
        self.store.audit(AuditRecord::new(
            AuditAction::Create,
            resource.kind(),
            &id,
            None,
            Some(to_json(&resource)),
        ))?;
        Ok(resource)
    }

    /// Run a search under the read lock and assemble the response envelope.
    pub fn search(&self, params: &SearchParams) -> Result<SearchResults, CatalogError> {
        let index = self.read_index()?;
        let plan = query::execute(&index, params);

        let mut hits = Vec::with_capacity(plan.candidates.len());
        for id in &plan.candidates {
            match self.store.get(id)? {
                Some(Resource::LabTestDefinition(def)) => {
                    let score = plan.scores.get(id).copied().unwrap_or(0);
                    hits.push((def, score));
                }
                _ => {
                    return Err(CatalogError::IndexConsistency(format!(
                        "indexed id '{}' missing from persistence",
                        id
                    )));
                }
            }
        }
        drop(index);

        Ok(assemble::assemble(hits, plan.facets, params))
    }

    /// Same page packaged as a searchset collection.
    pub fn search_bundle(&self, params: &SearchParams) -> Result<Bundle, CatalogError> {
        Ok(assemble::to_bundle(&self.search(params)?))
    }

    /// Aggregate counts from the live index.
    pub fn statistics(&self) -> Result<CatalogStatistics, CatalogError> {
        let index = self.read_index()?;
        let counts = |dim: FacetDimension| -> BTreeMap<String, usize> {
            index
                .facet_values(dim)
                .map(|(value, ids)| (value.clone(), ids.len()))
                .collect()
        };
        Ok(CatalogStatistics {
            total: index.len(),
            by_status: counts(FacetDimension::Status),
            by_category: counts(FacetDimension::Category),
        })
    }

    /// Distinct category values currently indexed, sorted.
    pub fn categories(&self) -> Result<Vec<String>, CatalogError> {
        let index = self.read_index()?;
        Ok(index
            .facet_values(FacetDimension::Category)
            .map(|(value, _)| value.clone())
            .collect())
    }

    fn specimen_type_of(&self, def: &LabTestDefinition) -> Result<Option<String>, CatalogError> {
        let Some(id) = def.specimen_definition_ref.as_ref().filter(|r| !r.is_empty()) else {
            return Ok(None);
        };
        match self.store.get(id)? {
            Some(Resource::SpecimenDefinition(sd)) => Ok(sd.specimen_type()),
            _ => Ok(None),
        }
    }
}

fn to_json(resource: &Resource) -> JsonValue {
    serde_json::to_value(resource).unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppliesTo, CodeableConcept, Coding, ReferenceRange, Status};
    use crate::store::testing::TestStore;

    fn glucose(id: &str) -> LabTestDefinition {
        LabTestDefinition {
            id: id.into(),
            name: "Blood Glucose".into(),
            status: Status::Active,
            category: "chemistry".into(),
            code: CodeableConcept {
                coding: vec![Coding {
                    system: "LOINC".into(),
                    code: "33747-0".into(),
                    display: None,
                }],
                text: None,
            },
            reference_ranges: vec![ReferenceRange {
                low: Some(70.0),
                high: Some(99.0),
                unit: "mg/dL".into(),
                applies_to: AppliesTo::default(),
            }],
            ..Default::default()
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(TestStore::new()))
    }

    fn text_query(q: &str) -> SearchParams {
        SearchParams {
            query: Some(q.into()),
            ..Default::default()
        }
    }

    #[test]
    fn insert_then_fetch_returns_the_resource() {
        let catalog = catalog();
        let created = catalog.create_definition(glucose("t1")).unwrap();
        assert!(created.created_at.is_some());
        let fetched = catalog.get_definition("t1").unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn validation_is_idempotent_across_insert() {
        let catalog = catalog();
        let standalone = catalog
            .validate(&Resource::LabTestDefinition(glucose("t1")))
            .unwrap();
        catalog.create_definition(glucose("t1")).unwrap();
        let fetched = catalog.get_definition("t1").unwrap();
        let stored = catalog
            .validate(&Resource::LabTestDefinition(fetched))
            .unwrap();
        assert!(stored.len() >= standalone.len());
        assert_eq!(standalone, vec![]);
        assert_eq!(stored, vec![]);
    }

    #[test]
    fn search_scenario_matches_spec() {
        let catalog = catalog();
        catalog.create_definition(glucose("t1")).unwrap();

        let results = catalog.search(&text_query("glucose")).unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.results[0].id, "t1");

        let by_category = SearchParams {
            category: Some("chemistry".into()),
            ..Default::default()
        };
        let results = catalog.search(&by_category).unwrap();
        assert_eq!(results.facets["status"]["active"], 1);
    }

    #[test]
    fn delete_scenario_matches_spec() {
        let catalog = catalog();
        catalog.create_definition(glucose("t1")).unwrap();
        catalog.delete_definition("t1").unwrap();

        let results = catalog.search(&text_query("glucose")).unwrap();
        assert_eq!(results.total, 0);
        assert!(results.results.is_empty());
        assert!(
            results.facets["category"]
                .get("chemistry")
                .is_none_or(|n| *n == 0)
        );
        assert!(matches!(
            catalog.get_definition("t1"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn delete_restores_facet_sums() {
        let catalog = catalog();
        let before = catalog.statistics().unwrap();
        catalog.create_definition(glucose("t1")).unwrap();
        catalog.delete_definition("t1").unwrap();
        let after = catalog.statistics().unwrap();
        assert_eq!(before.total, after.total);
        assert_eq!(before.by_status, after.by_status);
        assert_eq!(before.by_category, after.by_category);
    }

    #[test]
    fn duplicate_create_is_a_conflict() {
        let catalog = catalog();
        catalog.create_definition(glucose("t1")).unwrap();
        assert!(matches!(
            catalog.create_definition(glucose("t1")),
            Err(CatalogError::DuplicateId(_))
        ));
    }

    #[test]
    fn invalid_resource_is_blocked_with_full_issue_list() {
        let catalog = catalog();
        let mut def = glucose("t1");
        def.reference_ranges.clear();
        def.observation_definition_ref = Some("missing".into());
        match catalog.create_definition(def) {
            Err(CatalogError::Validation(issues)) => assert_eq!(issues.len(), 2),
            other => panic!("expected validation failure, got {:?}", other.map(|d| d.id)),
        }
        assert!(matches!(
            catalog.get_definition("t1"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn illegal_status_transition_is_a_conflict() {
        let catalog = catalog();
        let mut def = glucose("t1");
        def.status = Status::Retired;
        catalog.create_definition(def.clone()).unwrap();
        def.status = Status::Active;
        assert!(matches!(
            catalog.update_definition("t1", def),
            Err(CatalogError::Conflict(_))
        ));
    }

    #[test]
    fn update_reindexes_atomically() {
        let catalog = catalog();
        catalog.create_definition(glucose("t1")).unwrap();

        let mut def = glucose("t1");
        def.name = "Serum Sodium".into();
        def.code.coding[0].code = "2951-2".into();
        let updated = catalog.update_definition("t1", def).unwrap();
        assert!(updated.updated_at >= updated.created_at);

        assert_eq!(catalog.search(&text_query("glucose")).unwrap().total, 0);
        assert_eq!(catalog.search(&text_query("sodium")).unwrap().total, 1);
    }

    #[test]
    fn update_of_missing_definition_is_not_found() {
        let catalog = catalog();
        assert!(matches!(
            catalog.update_definition("ghost", glucose("ghost")),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn satellites_resolve_for_cross_reference_and_faceting() {
        let catalog = catalog();
        catalog
            .create_satellite(Resource::SpecimenDefinition(SpecimenDefinition {
                id: "spec-1".into(),
                status: Status::Active,
                type_collected: Some(CodeableConcept {
                    coding: vec![],
                    text: Some("Serum".into()),
                }),
                ..Default::default()
            }))
            .unwrap();

        let mut def = glucose("t1");
        def.specimen_definition_ref = Some("spec-1".into());
        catalog.create_definition(def).unwrap();

        let params = SearchParams {
            specimen_type: Some("serum".into()),
            ..Default::default()
        };
        let results = catalog.search(&params).unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.facets["specimen_type"]["serum"], 1);
    }

    #[test]
    fn concurrent_duplicate_creates_keep_store_and_index_consistent() {
        let catalog = Arc::new(catalog());
        let mut first = glucose("t1");
        first.name = "Alphaword".into();
        let mut second = glucose("t1");
        second.name = "Betaword".into();

        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|def| {
                let catalog = Arc::clone(&catalog);
                std::thread::spawn(move || catalog.create_definition(def))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(CatalogError::DuplicateId(_))))
        );

        // Whichever create won, the stored record and the index agree.
        let winner = results.iter().find_map(|r| r.as_ref().ok()).unwrap();
        let stored = catalog.get_definition("t1").unwrap();
        assert_eq!(stored.name, winner.name);
        let found = catalog
            .search(&text_query(&winner.name.to_lowercase()))
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.results[0].id, "t1");
    }

    #[test]
    fn racing_update_and_delete_leave_store_and_index_agreeing() {
        let catalog = Arc::new(catalog());
        catalog.create_definition(glucose("t1")).unwrap();

        let updater = {
            let catalog = Arc::clone(&catalog);
            std::thread::spawn(move || {
                let mut def = glucose("t1");
                def.name = "Serum Sodium".into();
                catalog.update_definition("t1", def)
            })
        };
        let deleter = {
            let catalog = Arc::clone(&catalog);
            std::thread::spawn(move || catalog.delete_definition("t1"))
        };
        let _ = updater.join().unwrap();
        deleter.join().unwrap().unwrap();

        // The delete lands either before or after the update; in both
        // interleavings the record ends up gone from store and index alike.
        assert!(matches!(
            catalog.get_definition("t1"),
            Err(CatalogError::NotFound(_))
        ));
        assert_eq!(catalog.search(&text_query("glucose")).unwrap().total, 0);
        assert_eq!(catalog.search(&text_query("sodium")).unwrap().total, 0);
        assert_eq!(catalog.statistics().unwrap().total, 0);
    }

    #[test]
    fn categories_track_the_live_category_facet() {
        let catalog = catalog();
        assert!(catalog.categories().unwrap().is_empty());

        catalog.create_definition(glucose("t1")).unwrap();
        let mut def = glucose("t2");
        def.category = "hematology".into();
        catalog.create_definition(def).unwrap();
        assert_eq!(catalog.categories().unwrap(), ["chemistry", "hematology"]);

        catalog.delete_definition("t2").unwrap();
        assert_eq!(catalog.categories().unwrap(), ["chemistry"]);
    }

    #[test]
    fn rebuild_restores_the_index_from_persistence() {
        let store = Arc::new(TestStore::new());
        let catalog = Catalog::new(store.clone());
        catalog.create_definition(glucose("t1")).unwrap();
        assert_eq!(store.audit_len(), 1);

        // A fresh catalog over the same store starts empty until rebuilt.
        let restarted = Catalog::new(store);
        assert_eq!(restarted.search(&text_query("glucose")).unwrap().total, 0);
        assert_eq!(restarted.rebuild().unwrap(), 1);
        assert_eq!(restarted.search(&text_query("glucose")).unwrap().total, 1);
    }
}
