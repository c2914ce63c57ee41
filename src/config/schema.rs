//! Configuration schema types
//!
//! This module defines the configuration structure for glucobridge.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Staging => f.write_str("staging"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Main glucobridge configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Remote FHIR repository
    pub repository: RepositoryConfig,

    /// Telemetry to resource conversion
    #[serde(default)]
    pub conversion: ConversionConfig,

    /// Delivery pool and chunking
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Credential refresh
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Local state (tokens and device watermarks)
    #[serde(default)]
    pub state: StateConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.repository.validate(&self.environment)?;
        self.conversion.validate()?;
        self.delivery.validate()?;
        self.credentials.validate()?;
        self.state.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Remote FHIR repository configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Base URL of the FHIR server (e.g. `https://fhir.example.com/baseR4`)
    pub base_url: String,

    /// Per-request timeout in seconds; a timed out record counts as failed
    #[serde(default = "default_request_timeout_seconds")]
    pub timeout_seconds: u64,

    /// TLS certificate verification enabled
    ///
    /// **SECURITY WARNING**: disabling verification is rejected in production.
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Submit chunks with more than one member as a single `batch` bundle
    #[serde(default)]
    pub batch_enabled: bool,

    /// Static HTTP Basic credentials (`user:password`); when set, bearer
    /// tokens are never sent
    #[serde(default)]
    pub basic_auth: Option<SecretString>,

    /// Name shown in narrative device lines (`<device> (via <name>)`)
    #[serde(default)]
    pub converter_name: Option<String>,
}

impl RepositoryConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("repository.base_url cannot be empty".to_string());
        }

        let url = url::Url::parse(&self.base_url)
            .map_err(|e| format!("repository.base_url is not a valid URL: {e}"))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err("repository.base_url must start with http:// or https://".to_string());
        }

        if self.timeout_seconds == 0 || self.timeout_seconds > 300 {
            return Err(format!(
                "repository.timeout_seconds must be between 1 and 300, got {}",
                self.timeout_seconds
            ));
        }

        if *environment == Environment::Production && !self.tls_verify {
            return Err(
                "TLS certificate verification cannot be disabled in production environments"
                    .to_string(),
            );
        }

        Ok(())
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/fhir".to_string(),
            timeout_seconds: default_request_timeout_seconds(),
            tls_verify: true,
            batch_enabled: false,
            basic_auth: None,
            converter_name: None,
        }
    }
}

/// Conversion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Fixed glucose unit for emitted observations (`mmol/L` or `mg/dL`)
    #[serde(default = "default_target_unit")]
    pub target_unit: String,

    /// Default narrative language (fi, en, sv, de)
    #[serde(default = "default_language")]
    pub language: String,

    /// Resource-shaping profile (full, kanta_phr, diabetes_dossier)
    #[serde(default = "default_profile")]
    pub profile: String,

    /// What to do with an unconvertible entry (skip or abort)
    #[serde(default = "default_on_error")]
    pub on_error: String,

    /// Drop entries at or before the stored per-device watermark
    #[serde(default = "default_true")]
    pub skip_old_records: bool,
}

impl ConversionConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_units = ["mmol/L", "mg/dL"];
        if !valid_units.contains(&self.target_unit.as_str()) {
            return Err(format!(
                "Invalid conversion.target_unit '{}'. Must be one of: {}",
                self.target_unit,
                valid_units.join(", ")
            ));
        }

        let valid_languages = ["fi", "en", "sv", "de"];
        if !valid_languages.contains(&self.language.as_str()) {
            return Err(format!(
                "Invalid conversion.language '{}'. Must be one of: {}",
                self.language,
                valid_languages.join(", ")
            ));
        }

        let valid_profiles = ["full", "kanta_phr", "diabetes_dossier"];
        if !valid_profiles.contains(&self.profile.as_str()) {
            return Err(format!(
                "Invalid conversion.profile '{}'. Must be one of: {}",
                self.profile,
                valid_profiles.join(", ")
            ));
        }

        let valid_policies = ["skip", "abort"];
        if !valid_policies.contains(&self.on_error.as_str()) {
            return Err(format!(
                "Invalid conversion.on_error '{}'. Must be one of: {}",
                self.on_error,
                valid_policies.join(", ")
            ));
        }

        Ok(())
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            target_unit: default_target_unit(),
            language: default_language(),
            profile: default_profile(),
            on_error: default_on_error(),
            skip_old_records: true,
        }
    }
}

/// Delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Number of concurrent delivery lanes
    #[serde(default = "default_lanes")]
    pub lanes: usize,

    /// Maximum resources per chunk (and per batch bundle)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl DeliveryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.lanes == 0 || self.lanes > 100 {
            return Err(format!(
                "delivery.lanes must be between 1 and 100, got {}",
                self.lanes
            ));
        }

        if self.chunk_size == 0 || self.chunk_size > 1000 {
            return Err(format!(
                "delivery.chunk_size must be between 1 and 1000, got {}",
                self.chunk_size
            ));
        }

        Ok(())
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            lanes: default_lanes(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Credential refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Token endpoint that exchanges a signed refresh assertion
    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// PEM encoded RSA private key used to sign refresh assertions
    #[serde(default)]
    pub private_key_path: Option<String>,

    /// Refresh when the access token expires within this many minutes
    #[serde(default = "default_refresh_margin_minutes")]
    pub refresh_margin_minutes: i64,

    /// Token endpoint request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Seconds after a failed refresh before the token endpoint is retried
    #[serde(default = "default_retry_backoff_seconds")]
    pub retry_backoff_seconds: i64,
}

impl CredentialsConfig {
    fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = &self.token_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(
                    "credentials.token_endpoint must start with http:// or https://".to_string(),
                );
            }
            if self.private_key_path.is_none() {
                return Err(
                    "credentials.private_key_path is required when token_endpoint is set"
                        .to_string(),
                );
            }
        }

        if self.refresh_margin_minutes < 0 || self.refresh_margin_minutes > 60 {
            return Err(format!(
                "credentials.refresh_margin_minutes must be between 0 and 60, got {}",
                self.refresh_margin_minutes
            ));
        }

        if self.retry_backoff_seconds < 0 || self.retry_backoff_seconds > 3600 {
            return Err(format!(
                "credentials.retry_backoff_seconds must be between 0 and 3600, got {}",
                self.retry_backoff_seconds
            ));
        }

        Ok(())
    }

    /// Whether mid-upload refresh is possible with this configuration
    pub fn refresh_enabled(&self) -> bool {
        self.token_endpoint.is_some() && self.private_key_path.is_some()
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            token_endpoint: None,
            private_key_path: None,
            refresh_margin_minutes: default_refresh_margin_minutes(),
            timeout_seconds: default_request_timeout_seconds(),
            retry_backoff_seconds: default_retry_backoff_seconds(),
        }
    }
}

/// Local state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// JSON file holding stored credentials and device watermarks
    #[serde(default = "default_state_path")]
    pub path: String,
}

impl StateConfig {
    fn validate(&self) -> Result<(), String> {
        if self.path.trim().is_empty() {
            return Err("state.path cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily or hourly)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Emit console logs as JSON instead of human-readable lines
    #[serde(default)]
    pub json_console: bool,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local_enabled".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            json_console: false,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_target_unit() -> String {
    "mmol/L".to_string()
}

fn default_language() -> String {
    "fi".to_string()
}

fn default_profile() -> String {
    "full".to_string()
}

fn default_on_error() -> String {
    "skip".to_string()
}

fn default_lanes() -> usize {
    20
}

fn default_chunk_size() -> usize {
    1000
}

fn default_refresh_margin_minutes() -> i64 {
    10
}

fn default_retry_backoff_seconds() -> i64 {
    30
}

fn default_state_path() -> String {
    "glucobridge-state.json".to_string()
}

fn default_local_path() -> String {
    "/var/log/glucobridge".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
