//! Clinical resource domain model
//!
//! Typed subset of the FHIR Observation and MedicationAdministration resources
//! produced by the converter. Only fields that are actually populated are
//! modelled; `None` fields are omitted from the JSON representation.

use serde::{Deserialize, Serialize};

/// FHIR `Coding`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    pub system: String,
    pub code: String,
    pub display: String,
}

impl Coding {
    pub fn new(system: &str, code: &str, display: &str) -> Self {
        Self {
            system: system.to_string(),
            code: code.to_string(),
            display: display.to_string(),
        }
    }
}

/// FHIR `CodeableConcept`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeableConcept {
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// FHIR `Quantity` (UCUM coded)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
    pub system: String,
    pub code: String,
}

impl Quantity {
    pub const UCUM: &'static str = "http://unitsofmeasure.org";

    /// UCUM quantity with a display unit that may differ from the code
    pub fn ucum(value: f64, unit: &str, code: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
            system: Self::UCUM.to_string(),
            code: code.to_string(),
        }
    }
}

/// FHIR `Ratio`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: Quantity,
    pub denominator: Quantity,
}

/// FHIR `Period`, rendered in the entry's local offset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub start: String,
    pub end: String,
}

/// FHIR `Reference`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Reference {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    /// Literal reference such as `Patient/123`
    pub fn to(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Default::default()
        }
    }

    /// Display-only reference (used for devices)
    pub fn display(display: impl Into<String>) -> Self {
        Self {
            display: Some(display.into()),
            ..Default::default()
        }
    }

    /// Organization reference used as an identifier assigner
    pub fn organization(url: &str) -> Self {
        Self {
            kind: Some("Organization".to_string()),
            reference: Some(url.to_string()),
            display: None,
        }
    }
}

/// FHIR `Identifier`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    pub system: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigner: Option<Reference>,
}

/// FHIR `Narrative`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub status: String,
    pub div: String,
}

impl Narrative {
    pub fn generated(div: String) -> Self {
        Self {
            status: "generated".to_string(),
            div,
        }
    }
}

/// FHIR `Meta`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,
}

/// FHIR `Dosage` as used by MedicationAdministration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dosage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub dose: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_ratio: Option<Ratio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_quantity: Option<Quantity>,
}

/// Glucose or carbohydrate observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub meta: Meta,
    pub language: String,
    pub text: Narrative,
    pub identifier: Vec<Identifier>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<CodeableConcept>,
    pub code: CodeableConcept,
    pub subject: Reference,
    pub effective_date_time: String,
    pub issued: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performer: Vec<Reference>,
    pub value_quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Reference>,
}

/// Insulin administration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationAdministration {
    pub meta: Meta,
    pub language: String,
    pub text: Narrative,
    pub identifier: Vec<Identifier>,
    pub status: String,
    pub medication_codeable_concept: CodeableConcept,
    pub subject: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_period: Option<Period>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device: Vec<Reference>,
    pub dosage: Dosage,
}

/// Canonical output of the converter
///
/// Serializes with a `resourceType` discriminator so the JSON is a valid FHIR
/// resource body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
pub enum ClinicalResource {
    Observation(Observation),
    MedicationAdministration(MedicationAdministration),
}

impl ClinicalResource {
    /// FHIR resource type name, also the create endpoint path segment
    pub fn resource_type(&self) -> &'static str {
        match self {
            ClinicalResource::Observation(_) => "Observation",
            ClinicalResource::MedicationAdministration(_) => "MedicationAdministration",
        }
    }

    /// All identifiers, primary first
    pub fn identifiers(&self) -> &[Identifier] {
        match self {
            ClinicalResource::Observation(o) => &o.identifier,
            ClinicalResource::MedicationAdministration(m) => &m.identifier,
        }
    }

    /// Value of the deterministic primary identifier (`urn:uuid:...`)
    ///
    /// This is the idempotency key sent in the `If-None-Exist` precondition.
    pub fn identifier(&self) -> &str {
        self.identifiers()
            .first()
            .map(|i| i.value.as_str())
            .unwrap_or_default()
    }

    /// Effective instant, or the start of the effective period
    pub fn effective_start(&self) -> Option<&str> {
        match self {
            ClinicalResource::Observation(o) => Some(o.effective_date_time.as_str()),
            ClinicalResource::MedicationAdministration(m) => m
                .effective_date_time
                .as_deref()
                .or(m.effective_period.as_ref().map(|p| p.start.as_str())),
        }
    }

    /// Language tag of the narrative
    pub fn language(&self) -> &str {
        match self {
            ClinicalResource::Observation(o) => &o.language,
            ClinicalResource::MedicationAdministration(m) => &m.language,
        }
    }
}
