//! Resource-shaping profiles
//!
//! Each profile is a pair of pure builder functions that assemble the final
//! resource from profile-independent parts. The primary identifier value is
//! computed by the caller before shaping, so every profile yields the same
//! idempotency key for the same telemetry.

use super::glucose::{ObservationKind, ObservationParts};
use super::identifier;
use super::insulin::MedicationParts;
use super::l10n::Language;
use super::narrative;
use crate::domain::resource::{
    CodeableConcept, Coding, Meta, MedicationAdministration, Narrative, Observation, Reference,
};
use crate::domain::{BridgeError, DeviceId, Result, SubjectId};
use std::fmt;
use std::str::FromStr;

const BLOOD_GLUCOSE_PROFILE: &str =
    "http://phr.kanta.fi/StructureDefinition/fiphr-bloodglucose-stu3";
const BG_OBSERVATION_PROFILE: &str =
    "http://roche.com/fhir/rdc/StructureDefinition/bg-observation";
const MACRONUTRIENT_PROFILE: &str =
    "http://phr.kanta.fi/StructureDefinition/fiphr-sd-macronutrientintake";
const CARBS_OBSERVATION_PROFILE: &str =
    "http://roche.com/fhir/rdc/StructureDefinition/observation-carbs";
const INSULIN_DOSING_PROFILE: &str =
    "http://phr.kanta.fi/StructureDefinition/fiphr-sd-insulindosing-stu3";
const MEDICATION_ADMINISTRATION_PROFILE: &str =
    "http://roche.com/fhir/rdc/StructureDefinition/medication-administration";

/// Named resource-shaping strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceProfile {
    /// Every supported field, both national and vendor profiles
    #[default]
    Full,
    /// Finnish Kanta PHR: single national profile, no device, no secondary
    /// identifiers
    KantaPhr,
    /// Full shape with SNOMED-only insulin coding
    DiabetesDossier,
}

impl FromStr for ResourceProfile {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "full" => Ok(Self::Full),
            "kanta_phr" | "kanta" => Ok(Self::KantaPhr),
            "diabetes_dossier" | "dossier" => Ok(Self::DiabetesDossier),
            _ => Err(BridgeError::Configuration(format!(
                "Invalid resource profile: {s}. Expected 'full', 'kanta_phr' or 'diabetes_dossier'"
            ))),
        }
    }
}

impl fmt::Display for ResourceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceProfile::Full => "full",
            ResourceProfile::KantaPhr => "kanta_phr",
            ResourceProfile::DiabetesDossier => "diabetes_dossier",
        };
        f.write_str(name)
    }
}

/// Per-entry context shared by every builder
#[derive(Debug, Clone, Copy)]
pub(crate) struct ShapeContext<'a> {
    pub subject: &'a SubjectId,
    pub device: &'a DeviceId,
    pub guid: Option<&'a str>,
    pub language: Language,
    pub converter_name: Option<&'a str>,
    pub identity: &'a str,
}

impl ResourceProfile {
    pub(crate) fn observation(&self, parts: ObservationParts, ctx: ShapeContext<'_>) -> Observation {
        match self {
            ResourceProfile::Full | ResourceProfile::DiabetesDossier => full_observation(parts, ctx),
            ResourceProfile::KantaPhr => kanta_observation(parts, ctx),
        }
    }

    pub(crate) fn medication(
        &self,
        parts: MedicationParts,
        ctx: ShapeContext<'_>,
    ) -> MedicationAdministration {
        match self {
            ResourceProfile::Full => full_medication(parts, ctx),
            ResourceProfile::KantaPhr => kanta_medication(parts, ctx),
            ResourceProfile::DiabetesDossier => dossier_medication(parts, ctx),
        }
    }
}

fn nutrition_category() -> CodeableConcept {
    CodeableConcept {
        coding: vec![Coding::new(
            "http://phr.kanta.fi/CodeSystem/fiphr-cs-observationcategory",
            "nutrition",
            "Ravitsemus",
        )],
        text: None,
    }
}

fn vital_signs_category() -> CodeableConcept {
    CodeableConcept {
        coding: vec![Coding::new(
            "http://hl7.org/fhir/observation-category",
            "vital-signs",
            "Vital Signs",
        )],
        text: None,
    }
}

fn profiles(urls: &[&str]) -> Meta {
    Meta {
        profile: urls.iter().map(|u| u.to_string()).collect(),
    }
}

fn full_identifiers(ctx: &ShapeContext<'_>) -> Vec<crate::domain::resource::Identifier> {
    let mut ids = vec![identifier::official(ctx.identity.to_string())];
    ids.extend(ctx.guid.map(identifier::uploader));
    ids
}

fn observation_text(parts: &ObservationParts, ctx: &ShapeContext<'_>) -> Narrative {
    Narrative::generated(narrative::observation_div(
        parts,
        ctx.device.as_str(),
        ctx.converter_name,
        ctx.language,
    ))
}

fn device_reference(device: &DeviceId) -> Option<Reference> {
    (!device.is_empty()).then(|| Reference::display(device.as_str()))
}

fn full_observation(parts: ObservationParts, ctx: ShapeContext<'_>) -> Observation {
    let (meta, category) = if parts.kind.is_glucose() {
        (profiles(&[BLOOD_GLUCOSE_PROFILE, BG_OBSERVATION_PROFILE]), vec![])
    } else {
        (
            profiles(&[MACRONUTRIENT_PROFILE, CARBS_OBSERVATION_PROFILE]),
            vec![nutrition_category()],
        )
    };

    Observation {
        meta,
        language: ctx.language.as_str().to_string(),
        text: observation_text(&parts, &ctx),
        identifier: full_identifiers(&ctx),
        status: "final".to_string(),
        category,
        code: parts.code,
        subject: Reference::to(ctx.subject.reference()),
        effective_date_time: parts.effective,
        issued: parts.issued,
        performer: vec![Reference::to(ctx.subject.reference())],
        value_quantity: parts.value,
        device: device_reference(ctx.device),
    }
}

fn kanta_observation(parts: ObservationParts, ctx: ShapeContext<'_>) -> Observation {
    let (meta, category) = if parts.kind.is_glucose() {
        (profiles(&[BLOOD_GLUCOSE_PROFILE]), vital_signs_category())
    } else {
        (profiles(&[MACRONUTRIENT_PROFILE]), nutrition_category())
    };

    Observation {
        meta,
        language: ctx.language.as_str().to_string(),
        text: observation_text(&parts, &ctx),
        identifier: vec![identifier::bare(ctx.identity.to_string())],
        status: "final".to_string(),
        category: vec![category],
        code: parts.code,
        subject: Reference::to(ctx.subject.reference()),
        effective_date_time: parts.effective,
        issued: parts.issued,
        performer: vec![Reference::to(ctx.subject.reference())],
        value_quantity: parts.value,
        device: None,
    }
}

fn medication_concept(parts: &MedicationParts, coding: Vec<Coding>, language: Language) -> CodeableConcept {
    CodeableConcept {
        coding,
        text: Some(parts.insulin.phrase().text(language).to_string()),
    }
}

fn medication(
    parts: MedicationParts,
    ctx: ShapeContext<'_>,
    meta: Meta,
    identifier: Vec<crate::domain::resource::Identifier>,
    concept: CodeableConcept,
    device: Vec<Reference>,
) -> MedicationAdministration {
    let div = narrative::medication_div(
        &parts,
        &concept,
        ctx.device.as_str(),
        ctx.converter_name,
        ctx.language,
    );

    MedicationAdministration {
        meta,
        language: ctx.language.as_str().to_string(),
        text: Narrative::generated(div),
        identifier,
        status: "completed".to_string(),
        medication_codeable_concept: concept,
        subject: Reference::to(ctx.subject.reference()),
        effective_date_time: parts.effective_date_time,
        effective_period: parts.effective_period,
        device,
        dosage: parts.dosage,
    }
}

fn full_medication(parts: MedicationParts, ctx: ShapeContext<'_>) -> MedicationAdministration {
    let concept = medication_concept(&parts, parts.insulin.full_coding(), ctx.language);
    medication(
        parts,
        ctx,
        profiles(&[INSULIN_DOSING_PROFILE, MEDICATION_ADMINISTRATION_PROFILE]),
        full_identifiers(&ctx),
        concept,
        device_reference(ctx.device).into_iter().collect(),
    )
}

fn kanta_medication(parts: MedicationParts, ctx: ShapeContext<'_>) -> MedicationAdministration {
    let concept = medication_concept(&parts, parts.insulin.full_coding(), ctx.language);
    medication(
        parts,
        ctx,
        profiles(&[INSULIN_DOSING_PROFILE]),
        vec![identifier::bare(ctx.identity.to_string())],
        concept,
        vec![],
    )
}

fn dossier_medication(parts: MedicationParts, ctx: ShapeContext<'_>) -> MedicationAdministration {
    let concept = medication_concept(&parts, vec![parts.insulin.substance_coding()], ctx.language);
    medication(
        parts,
        ctx,
        profiles(&[INSULIN_DOSING_PROFILE, MEDICATION_ADMINISTRATION_PROFILE]),
        full_identifiers(&ctx),
        concept,
        device_reference(ctx.device).into_iter().collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_str() {
        assert_eq!("full".parse::<ResourceProfile>().unwrap(), ResourceProfile::Full);
        assert_eq!(
            "kanta_phr".parse::<ResourceProfile>().unwrap(),
            ResourceProfile::KantaPhr
        );
        assert_eq!(
            "Diabetes-Dossier".parse::<ResourceProfile>().unwrap(),
            ResourceProfile::DiabetesDossier
        );
        assert!("strict".parse::<ResourceProfile>().is_err());
    }

    #[test]
    fn test_profile_display_round_trip() {
        for profile in [
            ResourceProfile::Full,
            ResourceProfile::KantaPhr,
            ResourceProfile::DiabetesDossier,
        ] {
            assert_eq!(profile.to_string().parse::<ResourceProfile>().unwrap(), profile);
        }
    }
}
