//! Catalog data model: lab test definitions and their satellite resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication status of a catalog resource.
///
/// Declaration order is the sort order for `_sort=status`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Active,
    Retired,
}

impl Status {
    /// Legal transitions: draft -> active -> retired, retired is terminal.
    /// Keeping the current status is always allowed.
    pub fn can_transition(self, next: Status) -> bool {
        self == next
            || matches!(
                (self, next),
                (Status::Draft, Status::Active) | (Status::Active, Status::Retired)
            )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Active => "active",
            Status::Retired => "retired",
        }
    }
}

/// A single code from a terminology system.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Coding {
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// A concept coded in one or more terminology systems, with optional free text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CodeableConcept {
    #[serde(default)]
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn is_empty(&self) -> bool {
        self.coding.is_empty() && self.text.is_none()
    }
}

/// Population criteria a reference range applies to.
#[derive(
    Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "camelCase")]
pub struct AppliesTo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_low: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_high: Option<u32>,
}

/// A clinically normal interval for a population segment.
///
/// An absent bound is open-ended. Within one definition, ranges sharing
/// identical `applies_to` criteria must not overlap numerically.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub applies_to: AppliesTo,
}

/// A catalog entry for one laboratory test.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabTestDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: CodeableConcept,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_definition_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specimen_definition_ref: Option<String>,
    #[serde(default)]
    pub reference_ranges: Vec<ReferenceRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Satellite record describing the observation a test produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservationDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: CodeableConcept,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permitted_data_type: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Satellite record describing the specimen a test is performed on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecimenDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_collected: Option<CodeableConcept>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patient_preparation: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl SpecimenDefinition {
    /// Discrete specimen-type value used for faceting, derived from the
    /// collected-material concept (free text first, coding display as
    /// fallback), normalized to lowercase.
    pub fn specimen_type(&self) -> Option<String> {
        let collected = self.type_collected.as_ref()?;
        if let Some(text) = collected.text.as_ref().filter(|t| !t.is_empty()) {
            return Some(text.to_lowercase());
        }
        collected
            .coding
            .iter()
            .find_map(|c| c.display.as_ref())
            .map(|d| d.to_lowercase())
    }
}

/// The fixed set of resource kinds the catalog serves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResourceKind {
    LabTestDefinition,
    ObservationDefinition,
    SpecimenDefinition,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::LabTestDefinition => "LabTestDefinition",
            ResourceKind::ObservationDefinition => "ObservationDefinition",
            ResourceKind::SpecimenDefinition => "SpecimenDefinition",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LabTestDefinition" => Some(ResourceKind::LabTestDefinition),
            "ObservationDefinition" => Some(ResourceKind::ObservationDefinition),
            "SpecimenDefinition" => Some(ResourceKind::SpecimenDefinition),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged union over the resource kinds, used at the persistence boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "resourceType")]
pub enum Resource {
    LabTestDefinition(LabTestDefinition),
    ObservationDefinition(ObservationDefinition),
    SpecimenDefinition(SpecimenDefinition),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::LabTestDefinition(_) => ResourceKind::LabTestDefinition,
            Resource::ObservationDefinition(_) => ResourceKind::ObservationDefinition,
            Resource::SpecimenDefinition(_) => ResourceKind::SpecimenDefinition,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Resource::LabTestDefinition(d) => &d.id,
            Resource::ObservationDefinition(d) => &d.id,
            Resource::SpecimenDefinition(d) => &d.id,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Resource::LabTestDefinition(d) => d.status,
            Resource::ObservationDefinition(d) => d.status,
            Resource::SpecimenDefinition(d) => d.status,
        }
    }
}
