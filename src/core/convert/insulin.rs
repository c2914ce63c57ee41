//! Insulin administrations
//!
//! `basal`, `bolus` and `long` entries become MedicationAdministrations.
//! Basal and bolus insulin is short acting; `long` marks a manually logged
//! long-acting injection.

use super::l10n::{Language, Phrase};
use super::time::{local_time, period_end};
use crate::domain::resource::{Coding, Dosage, Period, Quantity, Ratio};
use crate::domain::{ConversionError, EntryKind, TelemetryEntry};

const SNOMED: &str = "http://snomed.info/sct";
const KANTA_INSULIN: &str = "http://phr.kanta.fi/CodeSystem/fiphr-cs-insulincode";

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Insulin class of an administration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsulinType {
    ShortActing,
    LongActing,
}

impl InsulinType {
    /// Classifies an entry kind
    ///
    /// # Errors
    ///
    /// Any kind other than basal, bolus or long.
    pub fn for_kind(kind: &EntryKind) -> Result<Self, ConversionError> {
        match kind {
            EntryKind::Basal | EntryKind::Bolus => Ok(InsulinType::ShortActing),
            EntryKind::Long => Ok(InsulinType::LongActing),
            other => Err(ConversionError::UnsupportedInsulinType(other.to_string())),
        }
    }

    pub(crate) fn phrase(&self) -> Phrase {
        match self {
            InsulinType::ShortActing => Phrase::ShortActingInsulin,
            InsulinType::LongActing => Phrase::LongActingInsulin,
        }
    }

    /// SNOMED substance coding
    pub(crate) fn substance_coding(&self) -> Coding {
        match self {
            InsulinType::ShortActing => {
                Coding::new(SNOMED, "411531001", "Short-acting insulin (substance)")
            }
            InsulinType::LongActing => {
                Coding::new(SNOMED, "25305005", "Long-acting insulin (substance)")
            }
        }
    }

    /// Substance, national insulin class and generic insulin codings
    pub(crate) fn full_coding(&self) -> Vec<Coding> {
        let national = match self {
            InsulinType::ShortActing => {
                Coding::new(KANTA_INSULIN, "ins-short-fast", "Lyhytvaikutteinen insuliini")
            }
            InsulinType::LongActing => Coding::new(
                KANTA_INSULIN,
                "ins-intermediate-long",
                "Pitkävaikutteinen insuliini",
            ),
        };

        vec![
            self.substance_coding(),
            national,
            Coding::new(SNOMED, "67866001", "Insulin (substance)"),
        ]
    }
}

/// Profile-independent content of an insulin administration
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MedicationParts {
    pub insulin: InsulinType,
    pub effective_date_time: Option<String>,
    pub effective_period: Option<Period>,
    pub dosage: Dosage,
}

impl MedicationParts {
    pub(crate) fn effective_start(&self) -> &str {
        self.effective_date_time
            .as_deref()
            .or(self.effective_period.as_ref().map(|p| p.start.as_str()))
            .unwrap_or_default()
    }
}

fn iu(value: f64) -> Quantity {
    Quantity::ucum(value, "IU", "[iU]")
}

/// Total units delivered: the bolus amount, or rate over the duration
pub fn delivered_units(entry: &TelemetryEntry) -> f64 {
    match (entry.normal, entry.duration) {
        (Some(normal), _) => normal,
        (None, Some(duration)) => entry.rate.unwrap_or(0.0) * duration / MS_PER_HOUR,
        (None, None) => 0.0,
    }
}

fn dosage_text(insulin: InsulinType, language: Language, dosage: &Dosage) -> String {
    let mut text = format!(
        "{} {:.2} {}",
        insulin.phrase().text(language),
        dosage.dose.value,
        dosage.dose.unit
    );

    if let Some(ratio) = &dosage.rate_ratio {
        let per = if ratio.denominator.value == 1.0 {
            String::new()
        } else {
            format!("{} ", ratio.denominator.value)
        };
        text.push_str(&format!(
            " ({} {}/{}{})",
            ratio.numerator.value, ratio.numerator.unit, per, ratio.denominator.unit
        ));
    }

    if let Some(rate) = &dosage.rate_quantity {
        text.push_str(&format!(" ({} {})", rate.value, rate.unit));
    }

    text
}

/// Builds the administration content for an insulin entry
pub(crate) fn medication_parts(
    entry: &TelemetryEntry,
    language: Language,
) -> Result<MedicationParts, ConversionError> {
    let insulin = InsulinType::for_kind(&entry.kind)?;
    let time = entry.time.ok_or_else(|| ConversionError::MissingField {
        kind: entry.kind.to_string(),
        field: "time",
    })?;

    let start = local_time(time, entry.timezone_offset)?;
    let (effective_date_time, effective_period) = match entry.duration {
        Some(duration) if duration > 0.0 => {
            let end = local_time(period_end(time, duration)?, entry.timezone_offset)?;
            (None, Some(Period { start, end }))
        }
        _ => (Some(start), None),
    };

    let mut dosage = Dosage {
        text: None,
        dose: iu(delivered_units(entry)),
        rate_ratio: None,
        rate_quantity: None,
    };

    if entry.kind == EntryKind::Basal {
        let rate = entry.rate.unwrap_or(0.0);
        if entry.is_temp_basal() {
            let ratio = entry
                .percent
                .filter(|p| *p != 0.0)
                .or(entry.tbr.filter(|t| *t != 0.0))
                .unwrap_or(1.0);
            dosage.rate_ratio = Some(Ratio {
                numerator: iu(rate),
                denominator: Quantity::ucum(1.0 / ratio, "h", "h"),
            });
        } else {
            dosage.rate_quantity = Some(Quantity::ucum(rate, "[iU]/h", "[iU]/h"));
        }
    }

    dosage.text = Some(dosage_text(insulin, language, &dosage));

    Ok(MedicationParts {
        insulin,
        effective_date_time,
        effective_period,
        dosage,
    })
}
