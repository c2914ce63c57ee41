//! Deterministic resource identifiers
//!
//! The primary identifier is a name-based UUID over the resource type, the
//! identity anchor (device display, or subject reference when there is no
//! device), the effective start and the JSON of the value payload. The same
//! telemetry therefore always yields the same identifier, which the
//! repository uses to reject duplicate creates.

use crate::domain::resource::{Identifier, Reference};
use uuid::Uuid;

/// URI system for `urn:uuid:` identifiers
pub const URN_SYSTEM: &str = "urn:ietf:rfc:3986";

/// Assigner of the primary identifier
pub const BRIDGE_ASSIGNER: &str = "https://www.sensotrend.com/";

/// Assigner of identifiers carried over from the uploader
pub const UPLOADER_ASSIGNER: &str = "https://www.tidepool.org/";

fn namespace() -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, b"https://www.hl7.org/fhir/")
}

/// `urn:uuid:` value of the primary identifier
pub fn identity_value(
    resource_type: &str,
    anchor: &str,
    effective_start: &str,
    payload_json: &str,
) -> String {
    let name = format!("{resource_type} {anchor} {effective_start} {payload_json}");
    format!("urn:uuid:{}", Uuid::new_v5(&namespace(), name.as_bytes()))
}

/// Primary identifier marked official and assigned by the bridge
pub(crate) fn official(value: String) -> Identifier {
    Identifier {
        usage: Some("official".to_string()),
        system: URN_SYSTEM.to_string(),
        value,
        assigner: Some(Reference::organization(BRIDGE_ASSIGNER)),
    }
}

/// Primary identifier without use or assigner
pub(crate) fn bare(value: String) -> Identifier {
    Identifier {
        usage: None,
        system: URN_SYSTEM.to_string(),
        value,
        assigner: None,
    }
}

/// Secondary identifier built from the uploader's `guid`
pub(crate) fn uploader(guid: &str) -> Identifier {
    Identifier {
        usage: None,
        system: URN_SYSTEM.to_string(),
        value: format!("urn:uuid:{guid}"),
        assigner: Some(Reference::organization(UPLOADER_ASSIGNER)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_value_is_deterministic() {
        let a = identity_value(
            "Observation",
            "DexG6_123",
            "2021-10-23T05:56:21.000+03:00",
            r#"{"value":7.05}"#,
        );
        let b = identity_value(
            "Observation",
            "DexG6_123",
            "2021-10-23T05:56:21.000+03:00",
            r#"{"value":7.05}"#,
        );
        assert_eq!(a, b);
        assert!(a.starts_with("urn:uuid:"));

        let parsed = Uuid::parse_str(a.trim_start_matches("urn:uuid:")).unwrap();
        assert_eq!(parsed.get_version_num(), 5);
    }

    #[test]
    fn test_identity_value_sensitive_to_every_part() {
        let base = identity_value("Observation", "dev", "t", "{}");
        assert_ne!(base, identity_value("MedicationAdministration", "dev", "t", "{}"));
        assert_ne!(base, identity_value("Observation", "other", "t", "{}"));
        assert_ne!(base, identity_value("Observation", "dev", "t2", "{}"));
        assert_ne!(base, identity_value("Observation", "dev", "t", "{\"v\":1}"));
    }

    #[test]
    fn test_identifier_shapes() {
        let id = official("urn:uuid:x".to_string());
        assert_eq!(id.usage.as_deref(), Some("official"));
        assert_eq!(
            id.assigner.unwrap().reference.as_deref(),
            Some(BRIDGE_ASSIGNER)
        );

        let id = bare("urn:uuid:x".to_string());
        assert!(id.usage.is_none() && id.assigner.is_none());

        let id = uploader("abc");
        assert_eq!(id.value, "urn:uuid:abc");
        assert_eq!(id.system, URN_SYSTEM);
    }
}
