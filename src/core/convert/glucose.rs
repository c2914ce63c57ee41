//! Glucose and carbohydrate observations
//!
//! `cbg`, `smbg` and `wizard` entries become Observations. Glucose values are
//! normalised to the configured target unit; wizard entries carry grams of
//! carbohydrate and bypass unit handling.

use super::l10n::{Language, Phrase};
use super::time::local_time;
use crate::domain::resource::{CodeableConcept, Coding, Quantity};
use crate::domain::{BridgeError, ConversionError, EntryKind, Result, TelemetryEntry};
use std::fmt;
use std::str::FromStr;

/// Molar mass of glucose used for mg/dL <-> mmol/L conversion
pub const GLUCOSE_MOLAR_MASS: f64 = 18.0156;

const LOINC: &str = "http://loinc.org";

/// Glucose concentration unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GlucoseUnit {
    #[default]
    MmolPerLiter,
    MgPerDeciliter,
}

impl GlucoseUnit {
    /// UCUM code
    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseUnit::MmolPerLiter => "mmol/L",
            GlucoseUnit::MgPerDeciliter => "mg/dL",
        }
    }

    /// Quantity with this unit's display and UCUM code
    pub fn quantity(&self, value: f64) -> Quantity {
        match self {
            GlucoseUnit::MmolPerLiter => Quantity::ucum(value, "mmol/l", "mmol/L"),
            GlucoseUnit::MgPerDeciliter => Quantity::ucum(value, "mg/dL", "mg/dL"),
        }
    }

    /// Converts `value` from `self` into `target`
    pub fn convert(&self, value: f64, target: GlucoseUnit) -> f64 {
        match (self, target) {
            (GlucoseUnit::MgPerDeciliter, GlucoseUnit::MmolPerLiter) => mgdl_to_mmoll(value),
            (GlucoseUnit::MmolPerLiter, GlucoseUnit::MgPerDeciliter) => mmoll_to_mgdl(value),
            _ => value,
        }
    }
}

impl FromStr for GlucoseUnit {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mmol/l" => Ok(GlucoseUnit::MmolPerLiter),
            "mg/dl" => Ok(GlucoseUnit::MgPerDeciliter),
            _ => Err(BridgeError::Configuration(format!(
                "Invalid glucose unit: {s}. Expected 'mmol/L' or 'mg/dL'"
            ))),
        }
    }
}

impl fmt::Display for GlucoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// mg/dL to mmol/L, rounded to two decimals
pub fn mgdl_to_mmoll(value: f64) -> f64 {
    round2(value / GLUCOSE_MOLAR_MASS)
}

/// mmol/L to mg/dL, rounded to two decimals
pub fn mmoll_to_mgdl(value: f64) -> f64 {
    round2(value * GLUCOSE_MOLAR_MASS)
}

/// What an observation measures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObservationKind {
    /// Interstitial glucose (CGM, and Libre scans reported as smbg)
    BodyFluidGlucose,
    /// Capillary blood glucose from a meter
    BloodGlucose,
    /// Carbohydrate intake estimated by a bolus wizard
    CarbohydrateIntake,
}

impl ObservationKind {
    pub(crate) fn is_glucose(&self) -> bool {
        !matches!(self, ObservationKind::CarbohydrateIntake)
    }

    fn phrase(&self) -> Phrase {
        match self {
            ObservationKind::BodyFluidGlucose => Phrase::BodyFluidGlucose,
            ObservationKind::BloodGlucose => Phrase::BloodGlucose,
            ObservationKind::CarbohydrateIntake => Phrase::CarbohydrateIntake,
        }
    }

    fn coding(&self, unit: GlucoseUnit) -> Vec<Coding> {
        use GlucoseUnit::*;

        match (self, unit) {
            (ObservationKind::CarbohydrateIntake, _) => vec![Coding::new(
                LOINC,
                "9059-7",
                "Carbohydrate intake Estimated",
            )],
            (ObservationKind::BodyFluidGlucose, MgPerDeciliter) => vec![Coding::new(
                LOINC,
                "2344-0",
                "Glucose [Mass/volume] in Body fluid",
            )],
            (ObservationKind::BodyFluidGlucose, MmolPerLiter) => vec![Coding::new(
                LOINC,
                "14745-4",
                "Glucose [Moles/volume] in Body fluid",
            )],
            (ObservationKind::BloodGlucose, MgPerDeciliter) => vec![
                Coding::new(
                    LOINC,
                    "41653-7",
                    "Glucose [Mass/volume] in Capillary blood by Glucometer",
                ),
                Coding::new(LOINC, "2339-0", "Glucose [Mass/volume] in Blood"),
            ],
            (ObservationKind::BloodGlucose, MmolPerLiter) => vec![
                Coding::new(
                    LOINC,
                    "14743-9",
                    "Glucose [Moles/volume] in Capillary blood by Glucometer",
                ),
                Coding::new(LOINC, "15074-8", "Glucose [Moles/volume] in Blood"),
            ],
        }
    }
}

/// Profile-independent content of an observation
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ObservationParts {
    pub kind: ObservationKind,
    pub code: CodeableConcept,
    pub value: Quantity,
    pub effective: String,
    pub issued: String,
}

/// Builds the observation content for a glucose or wizard entry
pub(crate) fn observation_parts(
    entry: &TelemetryEntry,
    target_unit: GlucoseUnit,
    language: Language,
    issued_at: chrono::DateTime<chrono::Utc>,
) -> std::result::Result<ObservationParts, ConversionError> {
    let missing = |field: &'static str| ConversionError::MissingField {
        kind: entry.kind.to_string(),
        field,
    };

    let time = entry.time.ok_or_else(|| missing("time"))?;

    let (kind, value) = match &entry.kind {
        EntryKind::Wizard => {
            let carbs = entry.carb_input.ok_or_else(|| missing("carbInput"))?;
            (
                ObservationKind::CarbohydrateIntake,
                Quantity::ucum(carbs, "g", "g"),
            )
        }
        EntryKind::Cbg | EntryKind::Smbg => {
            let raw = entry.value.ok_or_else(|| missing("value"))?;
            let units = entry.units.as_deref().ok_or_else(|| missing("units"))?;
            let source: GlucoseUnit = units
                .parse()
                .map_err(|_| ConversionError::UnsupportedUnits(units.to_string()))?;

            let kind = if entry.kind == EntryKind::Smbg && entry.sub_type.as_deref() != Some("scanned")
            {
                ObservationKind::BloodGlucose
            } else {
                ObservationKind::BodyFluidGlucose
            };

            (kind, target_unit.quantity(source.convert(raw, target_unit)))
        }
        other => {
            return Err(ConversionError::UnsupportedObservationType(
                other.to_string(),
            ))
        }
    };

    Ok(ObservationParts {
        kind,
        code: CodeableConcept {
            coding: kind.coding(target_unit),
            text: Some(kind.phrase().text(language).to_string()),
        },
        value,
        effective: local_time(time, entry.timezone_offset)?,
        issued: local_time(issued_at, entry.timezone_offset)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeviceId;
    use chrono::{TimeZone, Utc};

    fn glucose_entry(kind: EntryKind, value: f64, units: &str) -> TelemetryEntry {
        let mut entry = TelemetryEntry::new(
            kind,
            Utc.with_ymd_and_hms(2021, 10, 23, 2, 56, 21).unwrap(),
            DeviceId::new("DexG6_123"),
        );
        entry.value = Some(value);
        entry.units = Some(units.to_string());
        entry.timezone_offset = 180;
        entry
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 10, 24, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(mgdl_to_mmoll(127.0), 7.05);
        assert_eq!(mgdl_to_mmoll(180.0), 9.99);
        assert_eq!(mmoll_to_mgdl(7.0), 126.11);
        assert_eq!(
            GlucoseUnit::MgPerDeciliter.convert(100.0, GlucoseUnit::MgPerDeciliter),
            100.0
        );
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        for tenths in 20..=300 {
            let mmol = tenths as f64 / 10.0;
            let back = mgdl_to_mmoll(mmoll_to_mgdl(mmol));
            assert!((back - mmol).abs() <= 0.01, "{mmol} -> {back}");
        }
    }

    #[test]
    fn test_glucose_unit_from_str() {
        assert_eq!("mmol/L".parse::<GlucoseUnit>().unwrap(), GlucoseUnit::MmolPerLiter);
        assert_eq!("mg/dl".parse::<GlucoseUnit>().unwrap(), GlucoseUnit::MgPerDeciliter);
        assert!("mmol".parse::<GlucoseUnit>().is_err());
    }

    #[test]
    fn test_cbg_mgdl_to_mmol() {
        let entry = glucose_entry(EntryKind::Cbg, 127.0, "mg/dL");
        let parts =
            observation_parts(&entry, GlucoseUnit::MmolPerLiter, Language::English, now()).unwrap();

        assert_eq!(parts.kind, ObservationKind::BodyFluidGlucose);
        assert_eq!(parts.value.value, 7.05);
        assert_eq!(parts.value.unit, "mmol/l");
        assert_eq!(parts.value.code, "mmol/L");
        assert_eq!(parts.code.coding[0].code, "14745-4");
        assert_eq!(parts.code.text.as_deref(), Some("Glucose in body fluid"));
        assert_eq!(parts.effective, "2021-10-23T05:56:21.000+03:00");
        assert_eq!(parts.issued, "2021-10-24T03:00:00.000+03:00");
    }

    #[test]
    fn test_smbg_uses_capillary_codes() {
        let entry = glucose_entry(EntryKind::Smbg, 6.2, "mmol/L");
        let parts =
            observation_parts(&entry, GlucoseUnit::MmolPerLiter, Language::Finnish, now()).unwrap();

        assert_eq!(parts.kind, ObservationKind::BloodGlucose);
        let codes: Vec<_> = parts.code.coding.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["14743-9", "15074-8"]);
        assert_eq!(parts.code.text.as_deref(), Some("Verensokeri"));
    }

    #[test]
    fn test_scanned_smbg_treated_as_cbg() {
        let mut entry = glucose_entry(EntryKind::Smbg, 110.0, "mg/dL");
        entry.sub_type = Some("scanned".to_string());
        let parts =
            observation_parts(&entry, GlucoseUnit::MgPerDeciliter, Language::English, now())
                .unwrap();

        assert_eq!(parts.kind, ObservationKind::BodyFluidGlucose);
        assert_eq!(parts.code.coding[0].code, "2344-0");
        assert_eq!(parts.value.value, 110.0);
        assert_eq!(parts.value.unit, "mg/dL");
    }

    #[test]
    fn test_wizard_carbs_in_grams() {
        let mut entry = TelemetryEntry::new(
            EntryKind::Wizard,
            Utc.with_ymd_and_hms(2021, 10, 23, 12, 0, 0).unwrap(),
            DeviceId::new("pump"),
        );
        entry.carb_input = Some(45.0);
        let parts =
            observation_parts(&entry, GlucoseUnit::MgPerDeciliter, Language::Swedish, now())
                .unwrap();

        assert_eq!(parts.kind, ObservationKind::CarbohydrateIntake);
        assert_eq!(parts.value, Quantity::ucum(45.0, "g", "g"));
        assert_eq!(parts.code.coding[0].code, "9059-7");
    }

    #[test]
    fn test_payload_validation_errors() {
        let mut entry = glucose_entry(EntryKind::Cbg, 5.0, "mmol/L");
        entry.value = None;
        assert!(matches!(
            observation_parts(&entry, GlucoseUnit::MmolPerLiter, Language::English, now()),
            Err(ConversionError::MissingField { field: "value", .. })
        ));

        let entry = glucose_entry(EntryKind::Cbg, 5.0, "mmol/mol");
        assert_eq!(
            observation_parts(&entry, GlucoseUnit::MmolPerLiter, Language::English, now()),
            Err(ConversionError::UnsupportedUnits("mmol/mol".to_string()))
        );

        let entry = TelemetryEntry::new(EntryKind::Wizard, now(), DeviceId::new("pump"));
        assert!(matches!(
            observation_parts(&entry, GlucoseUnit::MmolPerLiter, Language::English, now()),
            Err(ConversionError::MissingField { field: "carbInput", .. })
        ));
    }
}
