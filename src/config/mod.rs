//! Configuration management for glucobridge.
//!
//! TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Glucobridge uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `GLUCOBRIDGE_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use glucobridge::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("glucobridge.toml")?;
//!
//! println!("FHIR server: {}", config.repository.base_url);
//! println!("Delivery lanes: {}", config.delivery.lanes);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`RepositoryConfig`] - FHIR server URL, timeout, batch mode, basic auth
//! - [`ConversionConfig`] - Target unit, language, profile, error policy
//! - [`DeliveryConfig`] - Worker lanes and chunk size
//! - [`CredentialsConfig`] - Token endpoint and signing key
//! - [`StateConfig`] - Token and watermark state file
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [repository]
//! base_url = "https://fhir.example.com/baseR4"
//! timeout_seconds = 10
//! batch_enabled = false
//!
//! [conversion]
//! target_unit = "mmol/L"
//! language = "fi"
//! profile = "full"
//!
//! [delivery]
//! lanes = 20
//!
//! [credentials]
//! token_endpoint = "https://auth.example.com/api/token"
//! private_key_path = "${GLUCOBRIDGE_KEY_DIR}/signing.pem"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, BridgeConfig, ConversionConfig, CredentialsConfig, DeliveryConfig,
    Environment, LoggingConfig, RepositoryConfig, StateConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
