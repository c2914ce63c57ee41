//! External system integrations for glucobridge.
//!
//! - [`fhir`] - FHIR repository client (idempotent create, batch, search)
//! - [`auth`] - Refresh assertion signing and the token endpoint
//! - [`store`] - Persisted credentials and device watermarks
//!
//! # Design Pattern
//!
//! Each integration sits behind a trait ([`fhir::ResourceRepository`],
//! [`auth::TokenExchange`], [`auth::AssertionSigner`], [`store::TokenStore`],
//! [`store::WatermarkStore`]) so the orchestrator can run against fakes.
//!
//! ```rust,no_run
//! use glucobridge::adapters::fhir::{FhirClient, ResourceRepository};
//! use glucobridge::config::{secret_string, RepositoryConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RepositoryConfig {
//!     base_url: "https://fhir.example.com/fhir".to_string(),
//!     ..RepositoryConfig::default()
//! };
//!
//! let client = FhirClient::new(&config)?.with_bearer_token(secret_string("token".to_string()));
//! let _patient = client.find_patient_id("urn:oid:1.2.246.21|010101-123N").await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod fhir;
pub mod store;
