//! Rule-based resource validation.
//!
//! Four passes run in fixed order over a resource instance: structural,
//! terminology, cross-reference, business rule. Issues are ordered by
//! (pass, field path) so identical input always produces identical output,
//! and analysis stops after any pass that produced a fatal issue.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::CatalogError;
use crate::model::{AppliesTo, CodeableConcept, Resource, ResourceKind};
use crate::outcome::{IssueSeverity, IssueType, OperationOutcomeIssue};
use crate::schema::{Cardinality, FieldRule, KnownSystem, SchemaDescriptor};
use crate::store::Store;

/// One validation finding, located by field path.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub code: IssueType,
    pub details: String,
    pub path: String,
    #[serde(skip)]
    pass: u8,
}

impl Issue {
    fn new(
        pass: u8,
        severity: IssueSeverity,
        code: IssueType,
        path: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code,
            details: details.into(),
            path: path.into(),
            pass,
        }
    }
}

impl From<Issue> for OperationOutcomeIssue {
    fn from(issue: Issue) -> Self {
        OperationOutcomeIssue {
            severity: issue.severity,
            code: issue.code,
            details: issue.details,
            path: Some(issue.path),
        }
    }
}

/// True when the list contains an error or fatal issue, i.e. the issues
/// should block a write.
pub fn has_blocking(issues: &[Issue]) -> bool {
    issues
        .iter()
        .any(|i| matches!(i.severity, IssueSeverity::Fatal | IssueSeverity::Error))
}

/// Validate a resource against its schema descriptor.
///
/// Pure apart from reads through the persistence collaborator during the
/// cross-reference pass; callers decide whether blocking issues stop a write.
pub fn validate(
    resource: &Resource,
    schema: &SchemaDescriptor,
    store: &dyn Store,
) -> Result<Vec<Issue>, CatalogError> {
    let mut issues = Vec::new();

    structural(resource, schema, &mut issues);
    if !has_fatal(&issues) {
        terminology(resource, schema, &mut issues);
    }
    if !has_fatal(&issues) {
        cross_reference(resource, store, &mut issues)?;
    }
    if !has_fatal(&issues) {
        business_rules(resource, &mut issues);
    }

    issues.sort_by(|a, b| a.pass.cmp(&b.pass).then_with(|| a.path.cmp(&b.path)));
    Ok(issues)
}

fn has_fatal(issues: &[Issue]) -> bool {
    issues.iter().any(|i| i.severity == IssueSeverity::Fatal)
}

// ---------------------------------------------------------------------------
// Pass 1: structural
// ---------------------------------------------------------------------------

fn structural(resource: &Resource, schema: &SchemaDescriptor, out: &mut Vec<Issue>) {
    for rule in schema.fields {
        let count = field_count(resource, rule.name);

        if rule.required && count == 0 {
            out.push(Issue::new(
                1,
                IssueSeverity::Fatal,
                IssueType::Required,
                rule.name,
                format!("required field '{}' is missing", rule.name),
            ));
            continue;
        }
        if rule.cardinality == Cardinality::One && count > 1 {
            out.push(Issue::new(
                1,
                IssueSeverity::Error,
                IssueType::Invalid,
                rule.name,
                format!("field '{}' allows a single value, found {}", rule.name, count),
            ));
        }

        // (system, code) pairs must be unique within one concept
        if let Some(concept) = coded_concept(resource, rule.name) {
            let mut seen = BTreeSet::new();
            for coding in &concept.coding {
                if !seen.insert((coding.system.as_str(), coding.code.as_str())) {
                    out.push(Issue::new(
                        1,
                        IssueSeverity::Error,
                        IssueType::Invalid,
                        format!("{}.coding", rule.name),
                        format!(
                            "duplicate coding ({}, {})",
                            coding.system, coding.code
                        ),
                    ));
                }
            }
        }
    }
}

/// Number of values a named field currently carries.
fn field_count(resource: &Resource, name: &str) -> usize {
    fn string(s: &str) -> usize {
        usize::from(!s.is_empty())
    }
    fn opt(s: &Option<String>) -> usize {
        s.as_ref().map_or(0, |v| string(v))
    }
    fn concept(c: &CodeableConcept) -> usize {
        usize::from(!c.is_empty())
    }

    match resource {
        Resource::LabTestDefinition(d) => match name {
            "id" => string(&d.id),
            "name" => string(&d.name),
            "code" => concept(&d.code),
            "status" => 1,
            "category" => string(&d.category),
            "description" => string(&d.description),
            "observationDefinitionRef" => opt(&d.observation_definition_ref),
            "specimenDefinitionRef" => opt(&d.specimen_definition_ref),
            "referenceRanges" => d.reference_ranges.len(),
            _ => 0,
        },
        Resource::ObservationDefinition(d) => match name {
            "id" => string(&d.id),
            "name" => string(&d.name),
            "code" => concept(&d.code),
            "status" => 1,
            "permittedDataType" => d.permitted_data_type.len(),
            "description" => string(&d.description),
            _ => 0,
        },
        Resource::SpecimenDefinition(d) => match name {
            "id" => string(&d.id),
            "name" => string(&d.name),
            "status" => 1,
            "typeCollected" => d.type_collected.as_ref().map_or(0, concept),
            "patientPreparation" => d.patient_preparation.len(),
            "description" => string(&d.description),
            _ => 0,
        },
    }
}

/// The concept behind a coded field, when the field carries one.
fn coded_concept<'a>(resource: &'a Resource, name: &str) -> Option<&'a CodeableConcept> {
    match (resource, name) {
        (Resource::LabTestDefinition(d), "code") => Some(&d.code),
        (Resource::ObservationDefinition(d), "code") => Some(&d.code),
        (Resource::SpecimenDefinition(d), "typeCollected") => d.type_collected.as_ref(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Pass 2: terminology
// ---------------------------------------------------------------------------

fn terminology(resource: &Resource, schema: &SchemaDescriptor, out: &mut Vec<Issue>) {
    for rule in schema.fields {
        if rule.allowed_systems.is_empty() {
            continue;
        }
        let Some(concept) = coded_concept(resource, rule.name) else {
            continue;
        };
        for (i, coding) in concept.coding.iter().enumerate() {
            check_coding(rule, i, &coding.system, &coding.code, out);
        }
    }
}

fn check_coding(rule: &FieldRule, i: usize, system: &str, code: &str, out: &mut Vec<Issue>) {
    let Some(known) = KnownSystem::from_system(system) else {
        out.push(Issue::new(
            2,
            IssueSeverity::Warning,
            IssueType::NotSupported,
            format!("{}.coding[{}].system", rule.name, i),
            format!("coding system '{}' is not supported", system),
        ));
        return;
    };
    if !rule.allowed_systems.contains(&known) {
        out.push(Issue::new(
            2,
            IssueSeverity::Warning,
            IssueType::NotSupported,
            format!("{}.coding[{}].system", rule.name, i),
            format!("coding system '{}' is not allowed for '{}'", system, rule.name),
        ));
        return;
    }
    if !known.code_is_well_formed(code) {
        out.push(Issue::new(
            2,
            IssueSeverity::Error,
            IssueType::Invalid,
            format!("{}.coding[{}].code", rule.name, i),
            format!("code '{}' does not match the lexical form of '{}'", code, system),
        ));
    }
}

// ---------------------------------------------------------------------------
// Pass 3: cross-reference
// ---------------------------------------------------------------------------

fn cross_reference(
    resource: &Resource,
    store: &dyn Store,
    out: &mut Vec<Issue>,
) -> Result<(), CatalogError> {
    let Resource::LabTestDefinition(def) = resource else {
        return Ok(());
    };

    let refs = [
        (
            "observationDefinitionRef",
            &def.observation_definition_ref,
            ResourceKind::ObservationDefinition,
        ),
        (
            "specimenDefinitionRef",
            &def.specimen_definition_ref,
            ResourceKind::SpecimenDefinition,
        ),
    ];

    for (path, reference, expected) in refs {
        let Some(id) = reference.as_ref().filter(|r| !r.is_empty()) else {
            continue;
        };
        match store.get(id)? {
            None => out.push(Issue::new(
                3,
                IssueSeverity::Error,
                IssueType::Invalid,
                path,
                format!("reference '{}' does not resolve", id),
            )),
            Some(target) if target.kind() != expected => out.push(Issue::new(
                3,
                IssueSeverity::Error,
                IssueType::Invalid,
                path,
                format!(
                    "reference '{}' resolves to a {}, expected {}",
                    id,
                    target.kind(),
                    expected
                ),
            )),
            Some(_) => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Pass 4: business rules
// ---------------------------------------------------------------------------

fn business_rules(resource: &Resource, out: &mut Vec<Issue>) {
    match resource {
        Resource::LabTestDefinition(def) => {
            if def.status == crate::model::Status::Active {
                if def.code.coding.is_empty() {
                    out.push(Issue::new(
                        4,
                        IssueSeverity::Error,
                        IssueType::BusinessRule,
                        "code.coding",
                        "an active definition must carry at least one coding",
                    ));
                }
                if def.reference_ranges.is_empty() {
                    out.push(Issue::new(
                        4,
                        IssueSeverity::Error,
                        IssueType::BusinessRule,
                        "referenceRanges",
                        "an active definition must carry at least one reference range",
                    ));
                }
            }
            range_rules(def, out);
        }
        Resource::ObservationDefinition(def) => {
            if def.status == crate::model::Status::Active && def.code.coding.is_empty() {
                out.push(Issue::new(
                    4,
                    IssueSeverity::Error,
                    IssueType::BusinessRule,
                    "code.coding",
                    "an active observation definition must carry at least one coding",
                ));
            }
        }
        Resource::SpecimenDefinition(_) => {}
    }
}

fn range_rules(def: &crate::model::LabTestDefinition, out: &mut Vec<Issue>) {
    // Bounds are inclusive; an absent bound is open-ended.
    let mut groups: BTreeMap<&AppliesTo, Vec<(usize, f64, f64)>> = BTreeMap::new();

    for (i, range) in def.reference_ranges.iter().enumerate() {
        let low = range.low.unwrap_or(f64::NEG_INFINITY);
        let high = range.high.unwrap_or(f64::INFINITY);
        if low > high {
            out.push(Issue::new(
                4,
                IssueSeverity::Error,
                IssueType::BusinessRule,
                format!("referenceRanges[{}]", i),
                format!("low bound {} exceeds high bound {}", low, high),
            ));
            continue;
        }
        groups.entry(&range.applies_to).or_default().push((i, low, high));
    }

    for ranges in groups.values_mut() {
        ranges.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        for pair in ranges.windows(2) {
            if pair[1].1 <= pair[0].2 {
                out.push(Issue::new(
                    4,
                    IssueSeverity::Error,
                    IssueType::BusinessRule,
                    "referenceRanges",
                    format!(
                        "ranges {} and {} overlap for identical population criteria",
                        pair[0].0, pair[1].0
                    ),
                ));
            }
        }
    }
}
