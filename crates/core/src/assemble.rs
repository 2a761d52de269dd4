//! Result assembly: sorting, pagination and response envelopes.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::bundle::{Bundle, BundleEntry};
use crate::model::LabTestDefinition;
use crate::query::{SearchParams, SortKey};

/// Search response envelope.
///
/// `total` is the candidate-set size before pagination, `count` the size of
/// the returned page.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub total: usize,
    pub count: usize,
    pub results: Vec<LabTestDefinition>,
    pub facets: BTreeMap<String, BTreeMap<String, usize>>,
}

/// Sort, paginate and package scored hits.
///
/// Every sort key ends in an id tie-break, so repeated identical queries
/// paginate without omissions or duplicates.
pub fn assemble(
    mut hits: Vec<(LabTestDefinition, usize)>,
    facets: BTreeMap<String, BTreeMap<String, usize>>,
    params: &SearchParams,
) -> SearchResults {
    match params.sort {
        SortKey::Score => hits.sort_by(|(a, sa), (b, sb)| {
            sb.cmp(sa)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        }),
        SortKey::Name => hits.sort_by(|(a, _), (b, _)| {
            a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id))
        }),
        SortKey::Status => hits.sort_by(|(a, _), (b, _)| {
            a.status
                .cmp(&b.status)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        }),
    }

    let total = hits.len();
    let results: Vec<LabTestDefinition> = hits
        .into_iter()
        .map(|(def, _)| def)
        .skip(params.offset)
        .take(params.count)
        .collect();

    SearchResults {
        total,
        count: results.len(),
        results,
        facets,
    }
}

/// Alternate packaging: the same page as a searchset collection, each entry
/// tagged as a match.
pub fn to_bundle(results: &SearchResults) -> Bundle {
    let entries = results
        .results
        .iter()
        .map(|def| {
            // Serializing a plain definition cannot realistically fail.
            let resource = serde_json::to_value(def).unwrap_or(JsonValue::Null);
            BundleEntry::match_entry(format!("LabTestDefinition/{}", def.id), resource)
        })
        .collect();
    Bundle::searchset(results.total as u32, entries)
}
