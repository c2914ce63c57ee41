//! FHIR repository integration
//!
//! This module provides the remote repository client: idempotent creates,
//! batch bundles, searches and in-place bearer token swaps.

pub mod client;
pub mod models;
pub mod repository;

pub use client::FhirClient;
pub use models::CreateStatus;
pub use repository::{RemoteResult, ResourceRepository};
