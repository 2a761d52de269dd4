//! Query planning: compiles search parameters into predicate evaluation
//! over the index.
//!
//! All filter dimensions combine by AND. Facet counts are "relaxed": for
//! dimension D they are computed with every active filter except D's own,
//! so users can see what other values of D would yield.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::CatalogError;
use crate::index::{FacetDimension, Index, tokenize};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 200;

/// Result ordering requested via `_sort`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Relevance, descending, with ascending-name tie-break.
    #[default]
    Score,
    /// Lexical name, ascending.
    Name,
    /// Status enum declaration order.
    Status,
}

/// Parsed search parameters.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub specimen_type: Option<String>,
    pub code_in: Vec<String>,
    pub count: usize,
    pub offset: usize,
    pub sort: SortKey,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: None,
            category: None,
            status: None,
            specimen_type: None,
            code_in: Vec::new(),
            count: DEFAULT_PAGE_SIZE,
            offset: 0,
            sort: SortKey::default(),
        }
    }
}

impl SearchParams {
    /// Parse raw name/value pairs as handed over by the transport.
    ///
    /// Unknown parameter names are ignored for forward compatibility;
    /// malformed pagination or sort values fail with `InvalidParameter`.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, CatalogError> {
        let mut params = SearchParams::default();

        for (name, value) in pairs {
            match name.as_str() {
                "query" => params.query = Some(value.clone()),
                "category" => params.category = Some(value.clone()),
                "status" => params.status = Some(value.clone()),
                "specimen_type" => params.specimen_type = Some(value.clone()),
                "code" => params.code_in.push(value.clone()),
                "code:in" => params.code_in.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string),
                ),
                "_count" => {
                    let count: usize = value.parse().map_err(|_| {
                        CatalogError::InvalidParameter(format!("_count '{}' is not a number", value))
                    })?;
                    if count == 0 {
                        return Err(CatalogError::InvalidParameter(
                            "_count must be at least 1".to_string(),
                        ));
                    }
                    params.count = count.min(MAX_PAGE_SIZE);
                }
                "_offset" => {
                    params.offset = value.parse().map_err(|_| {
                        CatalogError::InvalidParameter(format!(
                            "_offset '{}' is not a number",
                            value
                        ))
                    })?;
                }
                "_sort" => {
                    params.sort = match value.as_str() {
                        "name" => SortKey::Name,
                        "status" => SortKey::Status,
                        "_score" => SortKey::Score,
                        other => {
                            return Err(CatalogError::InvalidParameter(format!(
                                "unsupported _sort value '{}'",
                                other
                            )));
                        }
                    };
                }
                // Unknown parameters are ignored, not fatal.
                _ => {}
            }
        }
        Ok(params)
    }
}

/// Candidate set plus per-id scores and relaxed facet counts.
#[derive(Debug)]
pub struct PlanOutput {
    pub candidates: BTreeSet<String>,
    pub scores: BTreeMap<String, usize>,
    pub facets: BTreeMap<String, BTreeMap<String, usize>>,
}

/// Evaluate the parameters against the index. Read-only; the caller holds
/// the read lock.
pub fn execute(index: &Index, params: &SearchParams) -> PlanOutput {
    let tokens = params
        .query
        .as_deref()
        .map(tokenize)
        .unwrap_or_default();

    let candidates = candidate_set(index, params, &tokens, None);

    let scores = candidates
        .iter()
        .map(|id| {
            let score = index.doc(id).map_or(0, |doc| doc.score(&tokens));
            (id.clone(), score)
        })
        .collect();

    let mut facets = BTreeMap::new();
    for dim in FacetDimension::ALL {
        let relaxed = candidate_set(index, params, &tokens, Some(dim));
        let mut counts = BTreeMap::new();
        for (value, ids) in index.facet_values(dim) {
            let n = ids.intersection(&relaxed).count();
            if n > 0 {
                counts.insert(value.clone(), n);
            }
        }
        facets.insert(dim.as_str().to_string(), counts);
    }

    PlanOutput {
        candidates,
        scores,
        facets,
    }
}

/// Apply every active filter except the skipped dimension's own.
fn candidate_set(
    index: &Index,
    params: &SearchParams,
    tokens: &[String],
    skip: Option<FacetDimension>,
) -> BTreeSet<String> {
    let mut set = if tokens.is_empty() {
        index.ids()
    } else {
        let mut acc: Option<BTreeSet<String>> = None;
        for token in tokens {
            let posting = index.posting(token).cloned().unwrap_or_default();
            acc = Some(match acc {
                None => posting,
                Some(prev) => prev.intersection(&posting).cloned().collect(),
            });
            if acc.as_ref().is_some_and(BTreeSet::is_empty) {
                break;
            }
        }
        acc.unwrap_or_default()
    };

    let exact_filters = [
        (FacetDimension::Category, params.category.as_ref()),
        (FacetDimension::Status, params.status.as_ref()),
        (FacetDimension::SpecimenType, params.specimen_type.as_ref()),
    ];
    for (dim, value) in exact_filters {
        if skip == Some(dim) {
            continue;
        }
        if let Some(value) = value {
            let ids = index.facet_ids(dim, value).cloned().unwrap_or_default();
            set = set.intersection(&ids).cloned().collect();
        }
    }

    if !params.code_in.is_empty() {
        let mut union = BTreeSet::new();
        for code in &params.code_in {
            if let Some(ids) = index.code_ids(code) {
                union.extend(ids.iter().cloned());
            }
        }
        set = set.intersection(&union).cloned().collect();
    }

    set
}
