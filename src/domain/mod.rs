//! Domain models and types for glucobridge.
//!
//! This module contains the core domain models shared by the conversion and
//! delivery pipeline.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`SubjectId`], [`DeviceId`])
//! - **Input model** ([`TelemetryEntry`], [`EntryKind`])
//! - **Output model** ([`ClinicalResource`] and its FHIR building blocks)
//! - **Credentials** ([`Credential`])
//! - **Error types** ([`BridgeError`], [`ConversionError`], [`RemoteError`], [`CredentialError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, BridgeError>`]:
//!
//! ```rust
//! use glucobridge::domain::{BridgeError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = glucobridge::config::load_config("glucobridge.toml")?;
//!     Ok(())
//! }
//! ```

pub mod credential;
pub mod errors;
pub mod ids;
pub mod resource;
pub mod result;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use credential::Credential;
pub use errors::{BridgeError, ConversionError, CredentialError, RemoteError};
pub use ids::{DeviceId, SubjectId};
pub use resource::{ClinicalResource, MedicationAdministration, Observation};
pub use result::Result;
pub use telemetry::{EntryKind, TelemetryEntry};
