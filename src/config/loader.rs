//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::BridgeConfig;
use crate::config::secret_string;
use crate::domain::errors::BridgeError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into BridgeConfig
/// 4. Applies environment variable overrides (GLUCOBRIDGE_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a referenced
/// environment variable is unset, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use glucobridge::config::loader::load_config;
///
/// let config = load_config("glucobridge.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BridgeConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(BridgeError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BridgeError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text, with the same substitution,
/// override and validation steps as [`load_config`]
pub fn parse_config(contents: &str) -> Result<BridgeConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: BridgeConfig = toml::from_str(&contents)
        .map_err(|e| BridgeError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        BridgeError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied through untouched.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BridgeError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for (index, line) in input.lines().enumerate() {
        if index > 0 {
            result.push('\n');
        }

        if line.trim_start().starts_with('#') {
            result.push_str(line);
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(BridgeError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.parse().ok())
}

/// Applies environment variable overrides using GLUCOBRIDGE_* prefix
///
/// Environment variables follow the pattern: GLUCOBRIDGE_<SECTION>_<KEY>,
/// for example GLUCOBRIDGE_REPOSITORY_BASE_URL or GLUCOBRIDGE_DELIVERY_LANES.
/// Values that fail to parse leave the file setting in place.
fn apply_env_overrides(config: &mut BridgeConfig) {
    if let Some(val) = env_var("GLUCOBRIDGE_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Repository
    if let Some(val) = env_var("GLUCOBRIDGE_REPOSITORY_BASE_URL") {
        config.repository.base_url = val;
    }
    if let Some(val) = env_parse("GLUCOBRIDGE_REPOSITORY_TIMEOUT_SECONDS") {
        config.repository.timeout_seconds = val;
    }
    if let Some(val) = env_parse("GLUCOBRIDGE_REPOSITORY_TLS_VERIFY") {
        config.repository.tls_verify = val;
    }
    if let Some(val) = env_parse("GLUCOBRIDGE_REPOSITORY_BATCH_ENABLED") {
        config.repository.batch_enabled = val;
    }
    if let Some(val) = env_var("GLUCOBRIDGE_REPOSITORY_BASIC_AUTH") {
        config.repository.basic_auth = Some(secret_string(val));
    }
    if let Some(val) = env_var("GLUCOBRIDGE_REPOSITORY_CONVERTER_NAME") {
        config.repository.converter_name = Some(val);
    }

    // Conversion
    if let Some(val) = env_var("GLUCOBRIDGE_CONVERSION_TARGET_UNIT") {
        config.conversion.target_unit = val;
    }
    if let Some(val) = env_var("GLUCOBRIDGE_CONVERSION_LANGUAGE") {
        config.conversion.language = val;
    }
    if let Some(val) = env_var("GLUCOBRIDGE_CONVERSION_PROFILE") {
        config.conversion.profile = val;
    }
    if let Some(val) = env_var("GLUCOBRIDGE_CONVERSION_ON_ERROR") {
        config.conversion.on_error = val;
    }
    if let Some(val) = env_parse("GLUCOBRIDGE_CONVERSION_SKIP_OLD_RECORDS") {
        config.conversion.skip_old_records = val;
    }

    // Delivery
    if let Some(val) = env_parse("GLUCOBRIDGE_DELIVERY_LANES") {
        config.delivery.lanes = val;
    }
    if let Some(val) = env_parse("GLUCOBRIDGE_DELIVERY_CHUNK_SIZE") {
        config.delivery.chunk_size = val;
    }

    // Credentials
    if let Some(val) = env_var("GLUCOBRIDGE_CREDENTIALS_TOKEN_ENDPOINT") {
        config.credentials.token_endpoint = Some(val);
    }
    if let Some(val) = env_var("GLUCOBRIDGE_CREDENTIALS_PRIVATE_KEY_PATH") {
        config.credentials.private_key_path = Some(val);
    }
    if let Some(val) = env_parse("GLUCOBRIDGE_CREDENTIALS_REFRESH_MARGIN_MINUTES") {
        config.credentials.refresh_margin_minutes = val;
    }
    if let Some(val) = env_parse("GLUCOBRIDGE_CREDENTIALS_TIMEOUT_SECONDS") {
        config.credentials.timeout_seconds = val;
    }
    if let Some(val) = env_parse("GLUCOBRIDGE_CREDENTIALS_RETRY_BACKOFF_SECONDS") {
        config.credentials.retry_backoff_seconds = val;
    }

    // State
    if let Some(val) = env_var("GLUCOBRIDGE_STATE_PATH") {
        config.state.path = val;
    }

    // Logging
    if let Some(val) = env_parse("GLUCOBRIDGE_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env_var("GLUCOBRIDGE_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Some(val) = env_var("GLUCOBRIDGE_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }
    if let Some(val) = env_parse("GLUCOBRIDGE_LOGGING_JSON_CONSOLE") {
        config.logging.json_console = val;
    }
}
