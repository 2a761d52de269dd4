//! Inverted index and facet counters over the live definition set.
//!
//! Postings map normalized tokens of a definition's name, description and
//! coding display text to the ids containing them. Facet sets map discrete
//! field values (category, status, specimen type) to ids, so facet counts
//! and filter intersections come from the same structure. An exact code
//! lookup backs the `code` filters.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::CatalogError;
use crate::model::LabTestDefinition;

/// The discrete dimensions facet counts are broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FacetDimension {
    Category,
    Status,
    SpecimenType,
}

impl FacetDimension {
    pub const ALL: [FacetDimension; 3] = [
        FacetDimension::Category,
        FacetDimension::Status,
        FacetDimension::SpecimenType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FacetDimension::Category => "category",
            FacetDimension::Status => "status",
            FacetDimension::SpecimenType => "specimen_type",
        }
    }
}

/// Normalize text into search tokens: lowercased, split on anything that is
/// not alphanumeric. Indexing and querying must use the same function.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Snapshot of everything the index derives from one definition.
///
/// Kept per id so removal can undo exactly what insertion did, independent
/// of the definition's current field values.
#[derive(Debug, Clone)]
pub struct IndexDocument {
    id: String,
    tokens: Vec<String>,
    facets: BTreeMap<FacetDimension, String>,
    codes: BTreeSet<String>,
}

impl IndexDocument {
    /// Derive the index entry for a definition. The specimen type comes from
    /// the resolved SpecimenDefinition, when the definition references one.
    pub fn from_definition(def: &LabTestDefinition, specimen_type: Option<String>) -> Self {
        let mut tokens = tokenize(&def.name);
        tokens.extend(tokenize(&def.description));
        for coding in &def.code.coding {
            if let Some(display) = &coding.display {
                tokens.extend(tokenize(display));
            }
        }

        let mut facets = BTreeMap::new();
        if !def.category.is_empty() {
            facets.insert(FacetDimension::Category, def.category.clone());
        }
        facets.insert(FacetDimension::Status, def.status.as_str().to_string());
        if let Some(st) = specimen_type.filter(|s| !s.is_empty()) {
            facets.insert(FacetDimension::SpecimenType, st);
        }

        let codes = def
            .code
            .coding
            .iter()
            .filter(|c| !c.code.is_empty())
            .map(|c| c.code.clone())
            .collect();

        Self {
            id: def.id.clone(),
            tokens,
            facets,
            codes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Relevance of this document for a tokenized query: the number of token
    /// occurrences matching any query token.
    pub fn score(&self, query_tokens: &[String]) -> usize {
        self.tokens
            .iter()
            .filter(|t| query_tokens.contains(t))
            .count()
    }
}

type IdSet = BTreeSet<String>;

/// In-memory inverted index. One instance is shared process-wide behind a
/// read-write lock owned by the catalog.
#[derive(Debug, Default)]
pub struct Index {
    postings: BTreeMap<String, IdSet>,
    facets: BTreeMap<FacetDimension, BTreeMap<String, IdSet>>,
    codes: BTreeMap<String, IdSet>,
    docs: BTreeMap<String, IndexDocument>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    /// All indexed ids.
    pub fn ids(&self) -> IdSet {
        self.docs.keys().cloned().collect()
    }

    pub fn doc(&self, id: &str) -> Option<&IndexDocument> {
        self.docs.get(id)
    }

    /// Ids whose text contains the token.
    pub fn posting(&self, token: &str) -> Option<&IdSet> {
        self.postings.get(token)
    }

    /// Ids whose stored value for `dim` equals `value`.
    pub fn facet_ids(&self, dim: FacetDimension, value: &str) -> Option<&IdSet> {
        self.facets.get(&dim).and_then(|values| values.get(value))
    }

    /// All live values of a dimension with their id sets.
    pub fn facet_values(&self, dim: FacetDimension) -> impl Iterator<Item = (&String, &IdSet)> {
        self.facets.get(&dim).into_iter().flatten()
    }

    /// Ids carrying the exact code.
    pub fn code_ids(&self, code: &str) -> Option<&IdSet> {
        self.codes.get(code)
    }

    /// Add a new document. Fails when the id is already indexed.
    pub fn insert(&mut self, doc: IndexDocument) -> Result<(), CatalogError> {
        if self.docs.contains_key(doc.id()) {
            return Err(CatalogError::DuplicateId(doc.id().to_string()));
        }
        for token in &doc.tokens {
            self.postings
                .entry(token.clone())
                .or_default()
                .insert(doc.id.clone());
        }
        for (dim, value) in &doc.facets {
            self.facets
                .entry(*dim)
                .or_default()
                .entry(value.clone())
                .or_default()
                .insert(doc.id.clone());
        }
        for code in &doc.codes {
            self.codes
                .entry(code.clone())
                .or_default()
                .insert(doc.id.clone());
        }
        self.docs.insert(doc.id.clone(), doc);
        Ok(())
    }

    /// Remove an id from every posting and facet set it appears in.
    ///
    /// An absent id is reported as `NotIndexed` so callers can detect drift
    /// between persistence and index. A posting that should reference the id
    /// but does not means the index is corrupt and is escalated.
    pub fn delete(&mut self, id: &str) -> Result<(), CatalogError> {
        let doc = self
            .docs
            .remove(id)
            .ok_or_else(|| CatalogError::NotIndexed(id.to_string()))?;

        for token in &doc.tokens {
            Self::remove_member(&mut self.postings, token, id, "posting")?;
        }
        for (dim, value) in &doc.facets {
            let values = self.facets.entry(*dim).or_default();
            Self::remove_member(values, value, id, dim.as_str())?;
        }
        for code in &doc.codes {
            Self::remove_member(&mut self.codes, code, id, "code")?;
        }
        Ok(())
    }

    /// Replace a document in one step, so readers serialized behind the
    /// write lock never observe the id absent or doubly counted.
    pub fn update(&mut self, doc: IndexDocument) -> Result<(), CatalogError> {
        let id = doc.id.clone();
        self.delete(&id)?;
        self.insert(doc)
    }

    fn remove_member(
        map: &mut BTreeMap<String, IdSet>,
        key: &str,
        id: &str,
        what: &str,
    ) -> Result<(), CatalogError> {
        let Some(set) = map.get_mut(key) else {
            return Err(CatalogError::IndexConsistency(format!(
                "{} '{}' missing while removing id '{}'",
                what, key, id
            )));
        };
        if !set.remove(id) {
            return Err(CatalogError::IndexConsistency(format!(
                "{} '{}' did not reference id '{}'",
                what, key, id
            )));
        }
        if set.is_empty() {
            map.remove(key);
        }
        Ok(())
    }
}
