//! Integration tests for configuration loading and validation
//!
//! Tests that touch environment variables hold ENV_MUTEX.

use glucobridge::config::{load_config, Environment};
use glucobridge::core::convert::{ConversionPolicy, ConverterOptions, GlucoseUnit, Language};
use glucobridge::core::upload::DeliveryOptions;
use glucobridge::domain::{BridgeError, SubjectId};
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    for key in [
        "GLUCOBRIDGE_APPLICATION_LOG_LEVEL",
        "GLUCOBRIDGE_REPOSITORY_BASE_URL",
        "GLUCOBRIDGE_REPOSITORY_BATCH_ENABLED",
        "GLUCOBRIDGE_DELIVERY_LANES",
        "GLUCOBRIDGE_CONVERSION_LANGUAGE",
        "TEST_FHIR_BASIC_AUTH",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const MINIMAL: &str = r#"
[repository]
base_url = "https://fhir.example.com/baseR4"
"#;

#[test]
fn test_load_complete_config() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
environment = "staging"

[application]
log_level = "debug"

[repository]
base_url = "https://fhir.example.com/baseR4"
timeout_seconds = 15
batch_enabled = true
converter_name = "Glucobridge"

[conversion]
target_unit = "mg/dL"
language = "sv"
profile = "kanta_phr"
on_error = "abort"
skip_old_records = false

[delivery]
lanes = 8
chunk_size = 250

[credentials]
token_endpoint = "https://auth.example.com/token"
private_key_path = "/etc/glucobridge/assertion.pem"
refresh_margin_minutes = 5
retry_backoff_seconds = 45

[state]
path = "/var/lib/glucobridge/state.json"

[logging]
local_enabled = true
local_path = "/var/log/glucobridge"
local_rotation = "hourly"
json_console = true
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.environment, Environment::Staging);
    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.repository.timeout_seconds, 15);
    assert!(config.repository.batch_enabled);
    assert_eq!(config.conversion.profile, "kanta_phr");
    assert!(!config.conversion.skip_old_records);
    assert!(config.credentials.refresh_enabled());
    assert_eq!(config.credentials.refresh_margin_minutes, 5);
    assert_eq!(config.credentials.retry_backoff_seconds, 45);
    assert_eq!(config.state.path, "/var/lib/glucobridge/state.json");
    assert_eq!(config.logging.local_rotation, "hourly");

    let delivery = DeliveryOptions::from_config(&config.delivery, &config.repository);
    assert_eq!(delivery.lanes, 8);
    assert_eq!(delivery.chunk_size, 250);
    assert!(delivery.batch_enabled);

    let options = ConverterOptions::from_config(
        SubjectId::new("patient-1").unwrap(),
        &config.conversion,
        config.repository.converter_name.clone(),
    )
    .unwrap();
    assert_eq!(options.target_unit, GlucoseUnit::MgPerDeciliter);
    assert_eq!(options.language, Language::Swedish);
    assert_eq!(options.policy, ConversionPolicy::Abort);
}

#[test]
fn test_minimal_config_uses_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let config = load_config(write_config(MINIMAL).path()).unwrap();

    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.conversion.target_unit, "mmol/L");
    assert_eq!(config.conversion.language, "fi");
    assert_eq!(config.conversion.on_error, "skip");
    assert_eq!(config.delivery.lanes, 20);
    assert_eq!(config.delivery.chunk_size, 1000);
    assert!(!config.credentials.refresh_enabled());
    assert!(config.repository.tls_verify);
}

#[test]
fn test_env_overrides_take_precedence() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    std::env::set_var("GLUCOBRIDGE_REPOSITORY_BASE_URL", "https://override.example.com/fhir");
    std::env::set_var("GLUCOBRIDGE_REPOSITORY_BATCH_ENABLED", "true");
    std::env::set_var("GLUCOBRIDGE_DELIVERY_LANES", "4");
    std::env::set_var("GLUCOBRIDGE_CONVERSION_LANGUAGE", "en");

    let result = load_config(write_config(MINIMAL).path());
    cleanup_env_vars();
    let config = result.unwrap();

    assert_eq!(config.repository.base_url, "https://override.example.com/fhir");
    assert!(config.repository.batch_enabled);
    assert_eq!(config.delivery.lanes, 4);
    assert_eq!(config.conversion.language, "en");
}

#[test]
fn test_invalid_override_is_rejected_by_validation() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    std::env::set_var("GLUCOBRIDGE_DELIVERY_LANES", "0");
    let result = load_config(write_config(MINIMAL).path());
    cleanup_env_vars();

    let err = result.unwrap_err();
    assert!(matches!(err, BridgeError::Configuration(_)));
    assert!(err.to_string().contains("delivery.lanes"));
}

#[test]
fn test_secret_substitution() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    std::env::set_var("TEST_FHIR_BASIC_AUTH", "bridge:s3cret");
    let result = load_config(
        write_config(
            r#"
[repository]
base_url = "https://fhir.example.com/baseR4"
basic_auth = "${TEST_FHIR_BASIC_AUTH}"
"#,
        )
        .path(),
    );
    cleanup_env_vars();

    let config = result.unwrap();
    let auth = config.repository.basic_auth.unwrap();
    assert_eq!(auth.expose_secret().as_str(), "bridge:s3cret");
    assert!(!format!("{auth:?}").contains("s3cret"));
}

#[test]
fn test_missing_substitution_variable() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let err = load_config(
        write_config(
            r#"
[repository]
base_url = "https://fhir.example.com/baseR4"
basic_auth = "${TEST_FHIR_BASIC_AUTH}"
"#,
        )
        .path(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("TEST_FHIR_BASIC_AUTH"));
}

#[test]
fn test_production_requires_tls_verification() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let err = load_config(
        write_config(
            r#"
environment = "production"

[repository]
base_url = "https://fhir.example.com/baseR4"
tls_verify = false
"#,
        )
        .path(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("TLS"));
}

#[test]
fn test_token_endpoint_requires_private_key() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let err = load_config(
        write_config(
            r#"
[repository]
base_url = "https://fhir.example.com/baseR4"

[credentials]
token_endpoint = "https://auth.example.com/token"
"#,
        )
        .path(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("private_key_path"));
}

#[test]
fn test_unknown_profile_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let err = load_config(
        write_config(
            r#"
[repository]
base_url = "https://fhir.example.com/baseR4"

[conversion]
profile = "kanta"
"#,
        )
        .path(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("conversion.profile"));
}
