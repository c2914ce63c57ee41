//! Core business logic for glucobridge.
//!
//! # Modules
//!
//! - [`convert`] - Telemetry to FHIR resource conversion (pure, no I/O)
//! - [`credential`] - Single-flight bearer credential refresh
//! - [`state`] - Per-subject credentials, watermarks and upload status
//! - [`upload`] - Delivery orchestration, lane pool and summary streaming
//!
//! # Upload Workflow
//!
//! 1. **Load State**: read the stored credential and device watermarks
//! 2. **Convert**: turn entries newer than the watermarks into resources
//! 3. **Deliver**: idempotent creates through N lanes, or batch bundles
//! 4. **Stream**: write each outcome as it completes, then the counts
//! 5. **Checkpoint**: merge the delivered watermarks back into the state
//!
//! # Example
//!
//! ```rust,no_run
//! use glucobridge::adapters::fhir::FhirClient;
//! use glucobridge::config::RepositoryConfig;
//! use glucobridge::core::convert::ConverterOptions;
//! use glucobridge::core::upload::{DeliveryOptions, UploadOrchestrator};
//! use glucobridge::domain::{SubjectId, TelemetryEntry};
//! use std::sync::Arc;
//!
//! # async fn example(entries: Vec<TelemetryEntry>) -> glucobridge::domain::Result<()> {
//! let repository = Arc::new(FhirClient::new(&RepositoryConfig::default())?);
//! let mut orchestrator = UploadOrchestrator::new(repository, DeliveryOptions::default());
//!
//! let options = ConverterOptions::new(SubjectId::new("patient-1").unwrap());
//! let result = orchestrator
//!     .upload(&entries, &options, tokio::io::stdout())
//!     .await?;
//!
//! println!("created {} skipped {} errors {}", result.created, result.skipped, result.errors);
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod credential;
pub mod state;
pub mod upload;
