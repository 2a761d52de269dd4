//! Schema registry: static field rules driving the validation passes.
//!
//! Descriptors are plain data resolved per resource kind, read-only after
//! process start. Validation logic lives in [`crate::validate`] and operates
//! generically over these rules.

use crate::error::CatalogError;
use crate::model::ResourceKind;

/// How many values a field may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Terminology systems the catalog understands.
///
/// Each maps a canonical URI (plus the bare name accepted on input) to the
/// lexical form its codes must take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownSystem {
    Loinc,
    SnomedCt,
}

impl KnownSystem {
    pub const LOINC_URI: &'static str = "http://loinc.org";
    pub const SNOMED_CT_URI: &'static str = "http://snomed.info/sct";

    /// Recognize a system identifier, accepting both the canonical URI and
    /// the conventional short name.
    pub fn from_system(system: &str) -> Option<Self> {
        match system {
            Self::LOINC_URI | "LOINC" => Some(KnownSystem::Loinc),
            Self::SNOMED_CT_URI | "SNOMED" | "SNOMED-CT" => Some(KnownSystem::SnomedCt),
            _ => None,
        }
    }

    /// Check a code against the system's lexical form.
    ///
    /// LOINC codes are two digit groups joined by a single dash (`33747-0`);
    /// SNOMED CT codes are plain digit strings of 6 to 18 characters.
    pub fn code_is_well_formed(self, code: &str) -> bool {
        fn digits(s: &str) -> bool {
            !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
        }
        match self {
            KnownSystem::Loinc => match code.split_once('-') {
                Some((base, check)) => digits(base) && digits(check),
                None => false,
            },
            KnownSystem::SnomedCt => digits(code) && (6..=18).contains(&code.len()),
        }
    }
}

/// Rule for one field of a resource.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub cardinality: Cardinality,
    /// Non-empty only for coded fields; lists the systems the schema allows.
    pub allowed_systems: &'static [KnownSystem],
}

const fn field(name: &'static str, required: bool, cardinality: Cardinality) -> FieldRule {
    FieldRule {
        name,
        required,
        cardinality,
        allowed_systems: &[],
    }
}

const fn coded_field(
    name: &'static str,
    required: bool,
    allowed_systems: &'static [KnownSystem],
) -> FieldRule {
    FieldRule {
        name,
        required,
        cardinality: Cardinality::One,
        allowed_systems,
    }
}

/// Static description of one resource kind's fields.
#[derive(Debug)]
pub struct SchemaDescriptor {
    pub kind: ResourceKind,
    pub fields: &'static [FieldRule],
}

static LAB_TEST_DEFINITION: SchemaDescriptor = SchemaDescriptor {
    kind: ResourceKind::LabTestDefinition,
    fields: &[
        field("id", true, Cardinality::One),
        field("name", true, Cardinality::One),
        coded_field("code", true, &[KnownSystem::Loinc, KnownSystem::SnomedCt]),
        field("status", true, Cardinality::One),
        field("category", true, Cardinality::One),
        field("description", false, Cardinality::One),
        field("observationDefinitionRef", false, Cardinality::One),
        field("specimenDefinitionRef", false, Cardinality::One),
        field("referenceRanges", false, Cardinality::Many),
    ],
};

static OBSERVATION_DEFINITION: SchemaDescriptor = SchemaDescriptor {
    kind: ResourceKind::ObservationDefinition,
    fields: &[
        field("id", true, Cardinality::One),
        field("name", false, Cardinality::One),
        coded_field("code", true, &[KnownSystem::Loinc, KnownSystem::SnomedCt]),
        field("status", true, Cardinality::One),
        field("permittedDataType", false, Cardinality::Many),
        field("description", false, Cardinality::One),
    ],
};

static SPECIMEN_DEFINITION: SchemaDescriptor = SchemaDescriptor {
    kind: ResourceKind::SpecimenDefinition,
    fields: &[
        field("id", true, Cardinality::One),
        field("name", false, Cardinality::One),
        field("status", true, Cardinality::One),
        coded_field("typeCollected", false, &[KnownSystem::SnomedCt]),
        field("patientPreparation", false, Cardinality::Many),
        field("description", false, Cardinality::One),
    ],
};

/// Resolve the descriptor for a resource kind.
pub fn resolve(kind: ResourceKind) -> &'static SchemaDescriptor {
    match kind {
        ResourceKind::LabTestDefinition => &LAB_TEST_DEFINITION,
        ResourceKind::ObservationDefinition => &OBSERVATION_DEFINITION,
        ResourceKind::SpecimenDefinition => &SPECIMEN_DEFINITION,
    }
}

/// Resolve a descriptor from a resource type name, as received on the wire.
pub fn resolve_name(name: &str) -> Result<&'static SchemaDescriptor, CatalogError> {
    ResourceKind::from_name(name)
        .map(resolve)
        .ok_or_else(|| CatalogError::UnknownResourceType(name.to_string()))
}
