use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Packaging modes for resource collections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    Searchset,
    Collection,
}

/// Collection envelope wrapping a result page (simplified for search
/// responses).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,

    #[serde(rename = "type")]
    pub bundle_type: BundleType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn searchset(total: u32, entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            bundle_type: BundleType::Searchset,
            total: Some(total),
            entry,
        }
    }

    pub fn collection(entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            bundle_type: BundleType::Collection,
            total: None,
            entry,
        }
    }
}

/// One resource inside a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    pub resource: JsonValue,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<BundleSearch>,
}

/// Search-related entry metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleSearch {
    pub mode: String,
}

impl BundleEntry {
    /// Entry tagged as a search match.
    pub fn match_entry(full_url: impl Into<String>, resource: JsonValue) -> Self {
        Self {
            full_url: Some(full_url.into()),
            resource,
            search: Some(BundleSearch {
                mode: "match".to_string(),
            }),
        }
    }
}
