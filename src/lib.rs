// Glucobridge - Diabetes telemetry to FHIR bridge
// Copyright (c) 2025 Glucobridge Contributors
// Licensed under the MIT License

//! # Glucobridge - diabetes telemetry to FHIR
//!
//! Glucobridge converts glucose meter, CGM and insulin pump telemetry in the
//! uploader export format into FHIR `Observation` and
//! `MedicationAdministration` resources and delivers them to a FHIR
//! repository.
//!
//! ## Overview
//!
//! - **Converting** entries into resources with deterministic identifiers
//! - **Delivering** them with idempotent creates over a bounded lane pool,
//!   or as batch bundles
//! - **Refreshing** the bearer credential mid-upload with a signed assertion
//! - **Streaming** per-record outcomes and a counts summary as JSON
//! - **Tracking** per-device watermarks for incremental uploads
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Conversion, credential refresh, state and upload orchestration
//! - [`adapters`] - FHIR client, token endpoint, state stores
//! - [`domain`] - Telemetry, resource and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glucobridge::adapters::fhir::FhirClient;
//! use glucobridge::config::load_config;
//! use glucobridge::core::convert::ConverterOptions;
//! use glucobridge::core::upload::{DeliveryOptions, UploadOrchestrator};
//! use glucobridge::domain::{SubjectId, TelemetryEntry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("glucobridge.toml")?;
//!     let entries: Vec<TelemetryEntry> =
//!         serde_json::from_str(&std::fs::read_to_string("entries.json")?)?;
//!
//!     let repository = Arc::new(FhirClient::new(&config.repository)?);
//!     let options = ConverterOptions::from_config(
//!         SubjectId::new("patient-1")?,
//!         &config.conversion,
//!         config.repository.converter_name.clone(),
//!     )?;
//!
//!     let mut orchestrator = UploadOrchestrator::new(
//!         repository,
//!         DeliveryOptions::from_config(&config.delivery, &config.repository),
//!     );
//!     let result = orchestrator.upload(&entries, &options, tokio::io::stdout()).await?;
//!
//!     eprintln!("created {}, skipped {}, errors {}", result.created, result.skipped, result.errors);
//!     Ok(())
//! }
//! ```
//!
//! ## Idempotent Delivery
//!
//! Every resource carries a `urn:uuid` identifier derived from the resource
//! type, the device (or subject), the effective time and the value. Creates
//! send `If-None-Exist: identifier=<value>`, so resubmitting an upload never
//! duplicates data: the repository answers 200 and the record counts as
//! skipped.
//!
//! ## Error Handling
//!
//! Library functions return [`domain::Result`] with [`domain::BridgeError`]:
//!
//! ```rust,no_run
//! use glucobridge::domain::BridgeError;
//!
//! fn example() -> Result<(), BridgeError> {
//!     let config = glucobridge::config::load_config("glucobridge.toml")?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
