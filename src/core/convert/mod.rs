//! Telemetry to clinical resource conversion
//!
//! This module turns raw uploader entries into FHIR resources. Conversion is a
//! pure function of the entries and [`ConverterOptions`] (plus the `issued`
//! instant); it performs no I/O.
//!
//! - `cbg`, `smbg`, `wizard` become [`Observation`](crate::domain::Observation)s
//! - `basal`, `bolus`, `long` become
//!   [`MedicationAdministration`](crate::domain::MedicationAdministration)s
//! - every other kind is ignored
//!
//! # Examples
//!
//! ```
//! use glucobridge::core::convert::{convert, ConverterOptions};
//! use glucobridge::domain::{SubjectId, TelemetryEntry};
//!
//! # fn example() -> glucobridge::domain::Result<()> {
//! let entries: Vec<TelemetryEntry> = serde_json::from_str(r#"[
//!     {"type": "cbg", "time": "2021-10-23T02:56:21.000Z", "timezoneOffset": 180,
//!      "value": 127, "units": "mg/dL", "deviceId": "DexG6_123"}
//! ]"#)?;
//!
//! let options = ConverterOptions::new(SubjectId::new("patient-1").unwrap());
//! let conversion = convert(&entries, &options)?;
//!
//! assert_eq!(conversion.records.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod glucose;
pub mod identifier;
pub mod insulin;
pub mod l10n;
mod narrative;
pub mod profile;
pub mod time;

pub use glucose::{mgdl_to_mmoll, mmoll_to_mgdl, GlucoseUnit};
pub use insulin::InsulinType;
pub use l10n::Language;
pub use profile::ResourceProfile;

use crate::config::ConversionConfig;
use crate::domain::resource::Dosage;
use crate::domain::{
    BridgeError, ClinicalResource, ConversionError, DeviceId, EntryKind, Result, SubjectId,
    TelemetryEntry,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// What to do with an entry that cannot be converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionPolicy {
    /// Leave the entry out and count it as rejected
    #[default]
    Skip,
    /// Fail the whole conversion
    Abort,
}

impl FromStr for ConversionPolicy {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            _ => Err(BridgeError::Configuration(format!(
                "Invalid conversion error policy: {s}. Expected 'skip' or 'abort'"
            ))),
        }
    }
}

impl fmt::Display for ConversionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionPolicy::Skip => f.write_str("skip"),
            ConversionPolicy::Abort => f.write_str("abort"),
        }
    }
}

/// Per-device watermark: entries at or before the instant are dropped
pub type Watermarks = HashMap<DeviceId, DateTime<Utc>>;

/// Options for one conversion call
#[derive(Debug, Clone)]
pub struct ConverterOptions {
    /// Patient the resources belong to
    pub subject: SubjectId,
    /// Narrative language
    pub language: Language,
    /// Unit of emitted glucose values
    pub target_unit: GlucoseUnit,
    /// Resource-shaping profile
    pub profile: ResourceProfile,
    /// Handling of unconvertible entries
    pub policy: ConversionPolicy,
    /// Name appended to narrative device lines
    pub converter_name: Option<String>,
    /// Previously delivered watermarks, if incremental sync is enabled
    pub skip_before: Option<Watermarks>,
}

impl ConverterOptions {
    /// Defaults: Finnish, mmol/L, full profile, skip policy, no watermarks
    pub fn new(subject: SubjectId) -> Self {
        Self {
            subject,
            language: Language::default(),
            target_unit: GlucoseUnit::default(),
            profile: ResourceProfile::default(),
            policy: ConversionPolicy::default(),
            converter_name: None,
            skip_before: None,
        }
    }

    /// Builds options from the `[conversion]` configuration section
    pub fn from_config(
        subject: SubjectId,
        config: &ConversionConfig,
        converter_name: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            subject,
            language: config.language.parse()?,
            target_unit: config.target_unit.parse()?,
            profile: config.profile.parse()?,
            policy: config.on_error.parse()?,
            converter_name,
            skip_before: None,
        })
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_target_unit(mut self, unit: GlucoseUnit) -> Self {
        self.target_unit = unit;
        self
    }

    pub fn with_profile(mut self, profile: ResourceProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_policy(mut self, policy: ConversionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_skip_before(mut self, watermarks: Watermarks) -> Self {
        self.skip_before = Some(watermarks);
        self
    }

    fn is_stale(&self, entry: &TelemetryEntry) -> bool {
        match (&self.skip_before, entry.time) {
            (Some(marks), Some(time)) => marks
                .get(&entry.device_id)
                .is_some_and(|mark| time <= *mark),
            _ => false,
        }
    }
}

/// One converted resource with the data the aggregator needs
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedRecord {
    pub resource: ClinicalResource,
    pub device_id: DeviceId,
    /// Effective instant (UTC) of the source entry
    pub effective: DateTime<Utc>,
}

/// An entry that was skipped because it could not be converted
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEntry {
    /// Position in the input array
    pub index: usize,
    pub kind: EntryKind,
    pub error: ConversionError,
}

/// Result of converting one upload
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    pub records: Vec<ConvertedRecord>,
    pub rejected: Vec<RejectedEntry>,
    /// Entries dropped by the watermark filter
    pub stale: usize,
    /// Entries of kinds that are never converted
    pub ignored: usize,
}

/// Converts entries using the current time as `issued`
///
/// # Errors
///
/// With [`ConversionPolicy::Abort`], the first unconvertible entry fails the
/// call with [`BridgeError::Conversion`].
pub fn convert(entries: &[TelemetryEntry], options: &ConverterOptions) -> Result<Conversion> {
    convert_at(entries, options, Utc::now())
}

/// Converts entries with an explicit `issued` instant
pub fn convert_at(
    entries: &[TelemetryEntry],
    options: &ConverterOptions,
    issued_at: DateTime<Utc>,
) -> Result<Conversion> {
    let mut conversion = Conversion::default();

    for (index, entry) in entries.iter().enumerate() {
        if !is_convertible(&entry.kind) {
            conversion.ignored += 1;
            continue;
        }
        conversion.accept(index, entry, options, issued_at)?;
    }

    conversion.log_finished(entries.len());
    Ok(conversion)
}

/// Converts raw uploader JSON using the current time as `issued`
///
/// Uploader exports mix in record kinds (`pumpSettings`, `upload`, ...) whose
/// fields do not follow the telemetry entry layout. Only entries of
/// convertible kinds are deserialized; everything else is counted as ignored
/// untouched. A convertible entry that fails to deserialize is rejected with
/// [`ConversionError::Malformed`] under the configured policy.
///
/// # Errors
///
/// With [`ConversionPolicy::Abort`], the first malformed or unconvertible
/// entry fails the call with [`BridgeError::Conversion`].
pub fn convert_values(values: &[Value], options: &ConverterOptions) -> Result<Conversion> {
    convert_values_at(values, options, Utc::now())
}

/// Converts raw uploader JSON with an explicit `issued` instant
pub fn convert_values_at(
    values: &[Value],
    options: &ConverterOptions,
    issued_at: DateTime<Utc>,
) -> Result<Conversion> {
    let mut conversion = Conversion::default();

    for (index, value) in values.iter().enumerate() {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(|kind| EntryKind::from(kind.to_string()))
            .unwrap_or_else(|| EntryKind::Other(String::new()));

        if !is_convertible(&kind) {
            conversion.ignored += 1;
            continue;
        }

        match TelemetryEntry::deserialize(value) {
            Ok(entry) => conversion.accept(index, &entry, options, issued_at)?,
            Err(e) => conversion.reject(
                index,
                kind,
                ConversionError::Malformed(e.to_string()),
                options.policy,
            )?,
        }
    }

    conversion.log_finished(values.len());
    Ok(conversion)
}

impl Conversion {
    /// Applies the watermark filter and converts one convertible entry
    fn accept(
        &mut self,
        index: usize,
        entry: &TelemetryEntry,
        options: &ConverterOptions,
        issued_at: DateTime<Utc>,
    ) -> Result<()> {
        if options.is_stale(entry) {
            self.stale += 1;
            return Ok(());
        }

        match convert_entry(entry, options, issued_at) {
            Ok(record) => {
                self.records.push(record);
                Ok(())
            }
            Err(error) => self.reject(index, entry.kind.clone(), error, options.policy),
        }
    }

    fn reject(
        &mut self,
        index: usize,
        kind: EntryKind,
        error: ConversionError,
        policy: ConversionPolicy,
    ) -> Result<()> {
        match policy {
            ConversionPolicy::Abort => Err(error.into()),
            ConversionPolicy::Skip => {
                tracing::warn!(
                    index = index,
                    kind = %kind,
                    error = %error,
                    "Skipping unconvertible entry"
                );
                self.rejected.push(RejectedEntry { index, kind, error });
                Ok(())
            }
        }
    }

    fn log_finished(&self, input: usize) {
        tracing::debug!(
            input = input,
            converted = self.records.len(),
            rejected = self.rejected.len(),
            stale = self.stale,
            ignored = self.ignored,
            "Conversion finished"
        );
    }
}

fn is_convertible(kind: &EntryKind) -> bool {
    matches!(
        kind,
        EntryKind::Cbg
            | EntryKind::Smbg
            | EntryKind::Wizard
            | EntryKind::Basal
            | EntryKind::Bolus
            | EntryKind::Long
    )
}

fn identity_anchor(entry: &TelemetryEntry, subject: &SubjectId) -> String {
    if entry.device_id.is_empty() {
        subject.reference()
    } else {
        entry.device_id.as_str().to_string()
    }
}

/// Dosage JSON without the localized text, so the identifier does not
/// change with the narrative language
fn dosage_payload(dosage: &Dosage) -> String {
    let mut bare = dosage.clone();
    bare.text = None;
    serde_json::to_string(&bare).unwrap_or_default()
}

/// Converts a single entry of a convertible kind
pub fn convert_entry(
    entry: &TelemetryEntry,
    options: &ConverterOptions,
    issued_at: DateTime<Utc>,
) -> std::result::Result<ConvertedRecord, ConversionError> {
    let time = entry.time.ok_or_else(|| ConversionError::MissingField {
        kind: entry.kind.to_string(),
        field: "time",
    })?;
    let anchor = identity_anchor(entry, &options.subject);

    let resource = match entry.kind {
        EntryKind::Cbg | EntryKind::Smbg | EntryKind::Wizard => {
            let parts =
                glucose::observation_parts(entry, options.target_unit, options.language, issued_at)?;
            let identity = identifier::identity_value(
                "Observation",
                &anchor,
                &parts.effective,
                &serde_json::to_string(&parts.value).unwrap_or_default(),
            );
            let ctx = shape_context(entry, options, &identity);
            ClinicalResource::Observation(options.profile.observation(parts, ctx))
        }
        _ => {
            let parts = insulin::medication_parts(entry, options.language)?;
            let identity = identifier::identity_value(
                "MedicationAdministration",
                &anchor,
                parts.effective_start(),
                &dosage_payload(&parts.dosage),
            );
            let ctx = shape_context(entry, options, &identity);
            ClinicalResource::MedicationAdministration(options.profile.medication(parts, ctx))
        }
    };

    Ok(ConvertedRecord {
        resource,
        device_id: entry.device_id.clone(),
        effective: time,
    })
}

fn shape_context<'a>(
    entry: &'a TelemetryEntry,
    options: &'a ConverterOptions,
    identity: &'a str,
) -> profile::ShapeContext<'a> {
    profile::ShapeContext {
        subject: &options.subject,
        device: &entry.device_id,
        guid: entry.guid.as_deref(),
        language: options.language,
        converter_name: options.converter_name.as_deref(),
        identity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn subject() -> SubjectId {
        SubjectId::new("patient-1").unwrap()
    }

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 10, 24, 0, 0, 0).unwrap()
    }

    fn cbg(value: f64, minutes: i64) -> TelemetryEntry {
        let mut entry = TelemetryEntry::new(
            EntryKind::Cbg,
            Utc.with_ymd_and_hms(2021, 10, 23, 2, 0, 0).unwrap() + Duration::minutes(minutes),
            DeviceId::new("DexG6_123"),
        );
        entry.value = Some(value);
        entry.units = Some("mg/dL".to_string());
        entry.timezone_offset = 180;
        entry.guid = Some("7c0f8e7a-9d8b-4d0c-8a36-2f5c1c9c7b11".to_string());
        entry
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("skip".parse::<ConversionPolicy>().unwrap(), ConversionPolicy::Skip);
        assert_eq!("ABORT".parse::<ConversionPolicy>().unwrap(), ConversionPolicy::Abort);
        assert!("ignore".parse::<ConversionPolicy>().is_err());
    }

    #[test]
    fn test_options_from_config() {
        let config = ConversionConfig {
            target_unit: "mg/dL".to_string(),
            language: "sv".to_string(),
            profile: "kanta_phr".to_string(),
            on_error: "abort".to_string(),
            skip_old_records: true,
        };
        let options = ConverterOptions::from_config(subject(), &config, None).unwrap();
        assert_eq!(options.target_unit, GlucoseUnit::MgPerDeciliter);
        assert_eq!(options.language, Language::Swedish);
        assert_eq!(options.profile, ResourceProfile::KantaPhr);
        assert_eq!(options.policy, ConversionPolicy::Abort);
    }

    #[test]
    fn test_ignores_unrelated_kinds() {
        let mut event = TelemetryEntry::new(EntryKind::DeviceEvent, issued(), "pump");
        event.sub_type = Some("alarm".to_string());
        let other = TelemetryEntry::new(EntryKind::Other("pumpSettings".into()), issued(), "pump");

        let conversion =
            convert_at(&[event, other, cbg(127.0, 0)], &ConverterOptions::new(subject()), issued())
                .unwrap();
        assert_eq!(conversion.records.len(), 1);
        assert_eq!(conversion.ignored, 2);
        assert!(conversion.rejected.is_empty());
    }

    #[test]
    fn test_full_observation_shape() {
        let options = ConverterOptions::new(subject()).with_language(Language::English);
        let conversion = convert_at(&[cbg(127.0, 0)], &options, issued()).unwrap();
        let record = &conversion.records[0];

        let json = serde_json::to_value(&record.resource).unwrap();
        assert_eq!(json["resourceType"], "Observation");
        assert_eq!(json["status"], "final");
        assert_eq!(json["language"], "en");
        assert_eq!(json["subject"]["reference"], "Patient/patient-1");
        assert_eq!(json["performer"][0]["reference"], "Patient/patient-1");
        assert_eq!(json["device"]["display"], "DexG6_123");
        assert_eq!(json["valueQuantity"]["value"], 7.05);
        assert_eq!(json["valueQuantity"]["unit"], "mmol/l");
        assert_eq!(json["meta"]["profile"].as_array().unwrap().len(), 2);
        assert_eq!(json["identifier"].as_array().unwrap().len(), 2);
        assert_eq!(json["identifier"][0]["use"], "official");
        assert_eq!(json["identifier"][0]["system"], "urn:ietf:rfc:3986");
        assert_eq!(
            json["identifier"][1]["value"],
            "urn:uuid:7c0f8e7a-9d8b-4d0c-8a36-2f5c1c9c7b11"
        );

        let div = json["text"]["div"].as_str().unwrap();
        assert!(div.starts_with(r#"<div lang="en" xml:lang="en""#));
        assert!(div.contains("Code: LOINC 14745-4 (Glucose [Moles/volume] in Body fluid)"));
        assert!(div.contains("<br />Time: 05:00:00"));
        assert!(div.contains("<br />Glucose in body fluid: 7.05 mmol/l"));
        assert!(div.ends_with("<br />Device: DexG6_123</div>"));

        assert_eq!(record.device_id.as_str(), "DexG6_123");
        assert_eq!(
            record.effective,
            Utc.with_ymd_and_hms(2021, 10, 23, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_kanta_observation_shape() {
        let options = ConverterOptions::new(subject()).with_profile(ResourceProfile::KantaPhr);
        let conversion = convert_at(&[cbg(127.0, 0)], &options, issued()).unwrap();
        let json = serde_json::to_value(&conversion.records[0].resource).unwrap();

        assert!(json.get("device").is_none());
        assert_eq!(json["identifier"].as_array().unwrap().len(), 1);
        assert!(json["identifier"][0].get("use").is_none());
        assert!(json["identifier"][0].get("assigner").is_none());
        assert_eq!(json["meta"]["profile"].as_array().unwrap().len(), 1);
        assert_eq!(json["category"][0]["coding"][0]["code"], "vital-signs");
    }

    #[test]
    fn test_identifier_stable_across_profiles_and_issued() {
        let full = convert_at(&[cbg(127.0, 0)], &ConverterOptions::new(subject()), issued()).unwrap();
        let kanta = convert_at(
            &[cbg(127.0, 0)],
            &ConverterOptions::new(subject()).with_profile(ResourceProfile::KantaPhr),
            issued() + Duration::hours(5),
        )
        .unwrap();

        assert_eq!(
            full.records[0].resource.identifier(),
            kanta.records[0].resource.identifier()
        );
    }

    #[test]
    fn test_insulin_identifier_independent_of_language() {
        let mut bolus = TelemetryEntry::new(EntryKind::Bolus, issued(), "pump");
        bolus.normal = Some(3.0);

        let fi = convert_at(&[bolus.clone()], &ConverterOptions::new(subject()), issued()).unwrap();
        let en = convert_at(
            &[bolus],
            &ConverterOptions::new(subject()).with_language(Language::English),
            issued(),
        )
        .unwrap();

        assert_eq!(fi.records[0].resource.identifier(), en.records[0].resource.identifier());
    }

    #[test]
    fn test_dossier_insulin_coding() {
        let mut long = TelemetryEntry::new(EntryKind::Long, issued(), "pen");
        long.normal = Some(20.0);
        let options = ConverterOptions::new(subject()).with_profile(ResourceProfile::DiabetesDossier);

        let conversion = convert_at(&[long], &options, issued()).unwrap();
        match &conversion.records[0].resource {
            ClinicalResource::MedicationAdministration(m) => {
                assert_eq!(m.medication_codeable_concept.coding.len(), 1);
                assert_eq!(m.medication_codeable_concept.coding[0].code, "25305005");
                assert_eq!(m.status, "completed");
                assert_eq!(m.device.len(), 1);
            }
            other => panic!("expected medication administration, got {other:?}"),
        }
    }

    #[test]
    fn test_watermark_filter() {
        let mut marks = Watermarks::new();
        marks.insert(
            DeviceId::new("DexG6_123"),
            Utc.with_ymd_and_hms(2021, 10, 23, 2, 5, 0).unwrap(),
        );
        let options = ConverterOptions::new(subject()).with_skip_before(marks);

        let mut other_device = cbg(100.0, 0);
        other_device.device_id = DeviceId::new("meter");

        let entries = vec![cbg(100.0, 0), cbg(110.0, 5), cbg(120.0, 10), other_device];
        let conversion = convert_at(&entries, &options, issued()).unwrap();

        assert_eq!(conversion.stale, 2);
        assert_eq!(conversion.records.len(), 2);
        assert!(conversion
            .records
            .iter()
            .all(|r| r.device_id.as_str() == "meter"
                || r.effective > Utc.with_ymd_and_hms(2021, 10, 23, 2, 5, 0).unwrap()));
    }

    #[test]
    fn test_skip_policy_counts_rejections() {
        let mut bad = cbg(0.0, 1);
        bad.units = Some("mmol/mol".to_string());

        let conversion =
            convert_at(&[cbg(127.0, 0), bad], &ConverterOptions::new(subject()), issued()).unwrap();
        assert_eq!(conversion.records.len(), 1);
        assert_eq!(conversion.rejected.len(), 1);
        assert_eq!(conversion.rejected[0].index, 1);
        assert_eq!(
            conversion.rejected[0].error,
            ConversionError::UnsupportedUnits("mmol/mol".to_string())
        );
    }

    #[test]
    fn test_abort_policy_fails_call() {
        let mut bad = cbg(0.0, 1);
        bad.value = None;
        let options = ConverterOptions::new(subject()).with_policy(ConversionPolicy::Abort);

        let err = convert_at(&[cbg(127.0, 0), bad], &options, issued()).unwrap_err();
        assert!(matches!(err, BridgeError::Conversion(_)));
    }

    fn mixed_export() -> Vec<Value> {
        serde_json::from_str(
            r#"[
            {"type": "pumpSettings", "time": "2021-10-23T00:00:00.000Z",
             "units": {"carb": "grams", "bg": "mg/dL"}, "deviceId": "pump"},
            {"type": "upload", "time": "2021-10-23T00:00:00.000Z",
             "deviceTags": ["insulin-pump"], "deviceId": "pump"},
            {"type": "cbg", "time": "2021-10-23T02:56:21.000Z", "timezoneOffset": 180,
             "value": 127, "units": "mg/dL", "deviceId": "DexG6_123"},
            {"type": "cbg", "time": "2021-10-23T03:01:21.000Z", "timezoneOffset": 180,
             "value": "high", "units": "mg/dL", "deviceId": "DexG6_123"}
        ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_raw_values_ignore_foreign_record_layouts() {
        let conversion =
            convert_values_at(&mixed_export(), &ConverterOptions::new(subject()), issued())
                .unwrap();

        assert_eq!(conversion.records.len(), 1);
        assert_eq!(conversion.ignored, 2);
        assert_eq!(conversion.rejected.len(), 1);
        assert_eq!(conversion.rejected[0].index, 3);
        assert_eq!(conversion.rejected[0].kind, EntryKind::Cbg);
        assert!(matches!(
            conversion.rejected[0].error,
            ConversionError::Malformed(_)
        ));
    }

    #[test]
    fn test_raw_values_match_typed_conversion() {
        let values = mixed_export()[..3].to_vec();
        let entries: Vec<TelemetryEntry> = values[2..]
            .iter()
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .collect();
        let options = ConverterOptions::new(subject());

        let raw = convert_values_at(&values, &options, issued()).unwrap();
        let typed = convert_at(&entries, &options, issued()).unwrap();
        assert_eq!(raw.records, typed.records);
    }

    #[test]
    fn test_raw_values_abort_on_malformed_entry() {
        let options = ConverterOptions::new(subject()).with_policy(ConversionPolicy::Abort);

        let err = convert_values_at(&mixed_export(), &options, issued()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Conversion(ConversionError::Malformed(_))
        ));
    }

    #[test]
    fn test_raw_values_without_type_are_ignored() {
        let values = vec![serde_json::json!({"value": 5}), serde_json::json!([1, 2])];

        let conversion =
            convert_values_at(&values, &ConverterOptions::new(subject()), issued()).unwrap();
        assert_eq!(conversion.ignored, 2);
        assert!(conversion.records.is_empty());
    }
}
