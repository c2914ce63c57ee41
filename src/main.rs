// Glucobridge - Diabetes telemetry to FHIR bridge
// Copyright (c) 2025 Glucobridge Contributors
// Licensed under the MIT License

use clap::Parser;
use glucobridge::cli::{Cli, Commands};
use glucobridge::config::load_config;
use glucobridge::logging::init_logging;
use std::process;

#[tokio::main]
async fn main() {
    // Optional .env file
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logging comes from the config file when it loads; commands report
    // config errors themselves
    let file_config = load_config(&cli.config).ok();
    let logging_config = file_config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| file_config.map(|c| c.application.log_level))
        .unwrap_or_else(|| "info".to_string());

    let guard = match init_logging(&log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Glucobridge - diabetes telemetry to FHIR"
    );

    let exit_code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e:#}");
            5
        }
    };

    // process::exit skips destructors; flush file logs first
    drop(guard);
    process::exit(exit_code);
}

async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Upload(args) => args.execute(&cli.config).await,
        Commands::Convert(args) => args.execute(&cli.config).await,
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Status(args) => args.execute(&cli.config).await,
    }
}
