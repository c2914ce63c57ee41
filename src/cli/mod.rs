//! CLI interface and argument parsing

pub mod commands;

use clap::{Parser, Subcommand};

/// Glucobridge - diabetes telemetry to FHIR
#[derive(Parser, Debug)]
#[command(name = "glucobridge")]
#[command(version, about, long_about = None)]
#[command(author = "Glucobridge Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "glucobridge.toml", env = "GLUCOBRIDGE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "GLUCOBRIDGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert telemetry and deliver it to the FHIR repository
    Upload(commands::upload::UploadArgs),

    /// Convert telemetry and print the resources without sending them
    Convert(commands::convert::ConvertArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show upload status, credentials and watermarks
    Status(commands::status::StatusArgs),
}
