//! Telemetry entry domain model
//!
//! One raw reading or event as exported by the device uploader. Entries arrive
//! as a JSON array per upload call and are consumed exactly once.

use super::ids::DeviceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a telemetry entry (the uploader's `type` field)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryKind {
    /// Continuous glucose monitor reading
    Cbg,
    /// Self-monitored (fingerstick) blood glucose
    Smbg,
    /// Bolus wizard record carrying carbohydrate input
    Wizard,
    /// Pump basal delivery segment
    Basal,
    /// Pump or pen bolus
    Bolus,
    /// Manually logged long-acting insulin injection
    Long,
    /// Device event (alarms, site changes); never converted
    DeviceEvent,
    /// Anything else the uploader emits
    Other(String),
}

impl EntryKind {
    /// The wire name of the kind
    pub fn as_str(&self) -> &str {
        match self {
            EntryKind::Cbg => "cbg",
            EntryKind::Smbg => "smbg",
            EntryKind::Wizard => "wizard",
            EntryKind::Basal => "basal",
            EntryKind::Bolus => "bolus",
            EntryKind::Long => "long",
            EntryKind::DeviceEvent => "deviceEvent",
            EntryKind::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for EntryKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "cbg" => EntryKind::Cbg,
            "smbg" => EntryKind::Smbg,
            "wizard" => EntryKind::Wizard,
            "basal" => EntryKind::Basal,
            "bolus" => EntryKind::Bolus,
            "long" => EntryKind::Long,
            "deviceEvent" => EntryKind::DeviceEvent,
            _ => EntryKind::Other(s),
        }
    }
}

impl From<EntryKind> for String {
    fn from(kind: EntryKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw device sample
///
/// Only the fields the converter reads are modelled; everything else in the
/// uploader payload is ignored during deserialization.
///
/// # Examples
///
/// ```
/// use glucobridge::domain::telemetry::{EntryKind, TelemetryEntry};
///
/// let entry: TelemetryEntry = serde_json::from_str(r#"{
///     "type": "cbg",
///     "time": "2021-10-23T02:56:21.000Z",
///     "timezoneOffset": 180,
///     "value": 127,
///     "units": "mg/dL",
///     "deviceId": "DexG6MobRec_SM12345678"
/// }"#).unwrap();
///
/// assert_eq!(entry.kind, EntryKind::Cbg);
/// assert_eq!(entry.value, Some(127.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEntry {
    /// Entry kind
    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// Entry subtype (e.g. `scanned` for Libre scans reported as smbg)
    #[serde(default, alias = "subtype", skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,

    /// Measurement instant (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Local offset from UTC in minutes
    #[serde(default)]
    pub timezone_offset: i32,

    /// Glucose value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Glucose units as reported by the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    /// Carbohydrate input in grams (wizard)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carb_input: Option<f64>,

    /// Normal bolus amount in IU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<f64>,

    /// Basal rate in IU/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,

    /// Delivery duration in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Temporary basal percentage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,

    /// Temporary basal ratio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tbr: Option<f64>,

    /// Reporting device
    #[serde(default)]
    pub device_id: DeviceId,

    /// Uploader-assigned unique id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

impl TelemetryEntry {
    /// Creates an entry of the given kind with every payload field empty
    pub fn new(kind: EntryKind, time: DateTime<Utc>, device_id: impl Into<DeviceId>) -> Self {
        Self {
            kind,
            sub_type: None,
            time: Some(time),
            timezone_offset: 0,
            value: None,
            units: None,
            carb_input: None,
            normal: None,
            rate: None,
            duration: None,
            percent: None,
            tbr: None,
            device_id: device_id.into(),
            guid: None,
        }
    }

    /// Whether the entry carries a temporary basal adjustment
    pub fn is_temp_basal(&self) -> bool {
        self.tbr.is_some() || self.percent.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_entry_kind_round_trip_names() {
        for name in ["cbg", "smbg", "wizard", "basal", "bolus", "long", "deviceEvent"] {
            let kind = EntryKind::from(name.to_string());
            assert!(!matches!(kind, EntryKind::Other(_)), "{name} should be known");
            assert_eq!(kind.as_str(), name);
        }
    }

    #[test]
    fn test_entry_kind_unknown_preserved() {
        let kind = EntryKind::from("pumpSettings".to_string());
        assert_eq!(kind, EntryKind::Other("pumpSettings".to_string()));
        assert_eq!(kind.to_string(), "pumpSettings");
    }

    #[test]
    fn test_deserialize_basal_entry() {
        let json = r#"{
            "type": "basal",
            "deliveryType": "temp",
            "time": "2021-10-23T02:00:00.000Z",
            "timezoneOffset": -300,
            "rate": 0.8,
            "duration": 1800000,
            "percent": 0.5,
            "deviceId": "tandem-123",
            "guid": "1f0c8b7e-5d3a-4c2b-9a1e-7f6d5c4b3a29"
        }"#;

        let entry: TelemetryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, EntryKind::Basal);
        assert_eq!(entry.timezone_offset, -300);
        assert_eq!(entry.rate, Some(0.8));
        assert_eq!(entry.duration, Some(1_800_000.0));
        assert!(entry.is_temp_basal());
        assert_eq!(entry.device_id.as_str(), "tandem-123");
        assert_eq!(
            entry.time,
            Some(Utc.with_ymd_and_hms(2021, 10, 23, 2, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_deserialize_minimal_device_event() {
        let entry: TelemetryEntry =
            serde_json::from_str(r#"{"type": "deviceEvent", "subType": "alarm"}"#).unwrap();
        assert_eq!(entry.kind, EntryKind::DeviceEvent);
        assert!(entry.time.is_none());
        assert!(entry.device_id.is_empty());
    }

    #[test]
    fn test_new_entry_defaults() {
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let entry = TelemetryEntry::new(EntryKind::Bolus, time, "pen");
        assert_eq!(entry.time, Some(time));
        assert!(!entry.is_temp_basal());
        assert_eq!(entry.timezone_offset, 0);
    }
}
