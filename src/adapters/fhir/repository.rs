//! Remote repository trait
//!
//! Abstracts the FHIR server behind the operations the pipeline needs so the
//! orchestrator can be exercised against in-memory fakes.

use super::models::{CreateStatus, ResponseBundle};
use crate::config::SecretString;
use crate::domain::{ClinicalResource, RemoteError};
use async_trait::async_trait;
use serde_json::Value;

/// Result type for remote repository calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Operations on the remote clinical data repository
///
/// # Example
///
/// ```no_run
/// use glucobridge::adapters::fhir::{FhirClient, ResourceRepository};
/// use glucobridge::config::RepositoryConfig;
///
/// # async fn example() -> glucobridge::domain::Result<()> {
/// let client = FhirClient::new(&RepositoryConfig::default())?;
/// if let Some(id) = client.find_patient_id("urn:oid:1.2.246.21|010101-123N").await? {
///     println!("patient resource id {id}");
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Idempotent create keyed on the resource's primary identifier
    ///
    /// # Errors
    ///
    /// Any status other than 200/201 is a [`RemoteError::Create`]; timeouts
    /// and connection failures are transport errors.
    async fn create(&self, resource: &ClinicalResource) -> RemoteResult<CreateStatus>;

    /// Submits all resources as one `batch` bundle
    ///
    /// Returns exactly one result per input resource, in input order. A
    /// failure of the whole request fails every member.
    async fn create_batch(&self, resources: &[ClinicalResource]) -> Vec<RemoteResult<CreateStatus>>;

    /// Type-level search
    async fn search(&self, resource_type: &str, params: &[(&str, &str)]) -> RemoteResult<Value>;

    /// Reads one resource by logical id
    async fn read(&self, resource_type: &str, id: &str) -> RemoteResult<Value>;

    /// Replaces the bearer token used by subsequent requests
    async fn set_bearer_token(&self, token: SecretString);

    /// Logical id of the patient carrying `identifier`, if any
    async fn find_patient_id(&self, identifier: &str) -> RemoteResult<Option<String>> {
        tracing::info!(identifier = %identifier, "Querying for patient");

        let result = self.search("Patient", &[("identifier", identifier)]).await?;
        let bundle: ResponseBundle = serde_json::from_value(result)
            .map_err(|e| RemoteError::InvalidResponse(format!("invalid search bundle: {e}")))?;

        Ok(bundle
            .entry
            .into_iter()
            .filter_map(|e| e.resource)
            .find_map(|r| r.get("id").and_then(Value::as_str).map(str::to_string)))
    }
}
