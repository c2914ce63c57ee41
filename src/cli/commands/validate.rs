//! Validate config command implementation

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");

        // load_config validates after substitution and overrides
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Repository: {}", config.repository.base_url);
        println!(
            "  Authentication: {}",
            if config.repository.basic_auth.is_some() {
                "basic"
            } else {
                "bearer"
            }
        );
        println!("  TLS Verify: {}", config.repository.tls_verify);
        println!(
            "  Delivery: {} (lanes: {}, chunk size: {})",
            if config.repository.batch_enabled {
                "batch"
            } else {
                "lanes"
            },
            config.delivery.lanes,
            config.delivery.chunk_size
        );
        println!(
            "  Conversion: {} / {} / {} profile (on error: {})",
            config.conversion.target_unit,
            config.conversion.language,
            config.conversion.profile,
            config.conversion.on_error
        );
        println!(
            "  Credential Refresh: {}",
            config
                .credentials
                .token_endpoint
                .as_deref()
                .unwrap_or("disabled")
        );
        println!("  State File: {}", config.state.path);

        Ok(0)
    }
}
