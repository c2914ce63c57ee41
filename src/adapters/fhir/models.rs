//! FHIR REST wire models
//!
//! Request and response structures for the create, batch and search
//! interactions. These are separate from the domain resources and only model
//! what the client reads or writes.

use crate::domain::{ClinicalResource, RemoteError};
use serde::{Deserialize, Serialize};

/// Result of an idempotent create
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateStatus {
    /// The repository stored a new resource (HTTP 201)
    Created { location: Option<String> },
    /// A resource with the same identifier already existed (HTTP 200)
    Skipped,
}

impl CreateStatus {
    /// Classifies an HTTP status code
    ///
    /// # Errors
    ///
    /// Anything other than 200 or 201 is a [`RemoteError::Create`].
    pub fn from_http(
        status: u16,
        location: Option<String>,
        body: impl FnOnce() -> String,
    ) -> Result<Self, RemoteError> {
        match status {
            201 => Ok(CreateStatus::Created { location }),
            200 => Ok(CreateStatus::Skipped),
            _ => Err(RemoteError::Create {
                status,
                body: body(),
            }),
        }
    }
}

/// Conditional-create request of one batch entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub url: String,
    pub method: &'static str,
    pub if_none_exist: String,
}

/// One entry of an outgoing batch bundle
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry<'a> {
    pub resource: &'a ClinicalResource,
    pub request: BatchRequest,
}

/// Outgoing `type: batch` bundle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBundle<'a> {
    pub resource_type: &'static str,
    #[serde(rename = "type")]
    pub bundle_type: &'static str,
    pub entry: Vec<BatchEntry<'a>>,
}

impl<'a> BatchBundle<'a> {
    /// Wraps resources as conditional creates keyed on their identifiers
    pub fn conditional_creates(resources: &'a [ClinicalResource]) -> Self {
        Self {
            resource_type: "Bundle",
            bundle_type: "batch",
            entry: resources
                .iter()
                .map(|resource| BatchEntry {
                    resource,
                    request: BatchRequest {
                        url: format!("{}/", resource.resource_type()),
                        method: "POST",
                        if_none_exist: if_none_exist(resource),
                    },
                })
                .collect(),
        }
    }
}

/// `If-None-Exist` search expression for a resource
pub fn if_none_exist(resource: &ClinicalResource) -> String {
    format!("identifier={}", resource.identifier())
}

/// Response part of a batch-response entry
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EntryResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub outcome: Option<serde_json::Value>,
}

/// Entry of a batch-response or searchset bundle
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponseEntry {
    #[serde(default)]
    pub resource: Option<serde_json::Value>,
    #[serde(default)]
    pub response: Option<EntryResponse>,
}

/// Incoming bundle (batch-response or searchset)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponseBundle {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub entry: Vec<ResponseEntry>,
}

impl ResponseEntry {
    /// Classifies the embedded status (`"201 Created"`, `"200 OK"`, ...)
    pub fn create_status(&self) -> Result<CreateStatus, RemoteError> {
        let response = self.response.as_ref().ok_or_else(|| {
            RemoteError::InvalidResponse("batch entry has no response".to_string())
        })?;
        let status = response.status.as_deref().ok_or_else(|| {
            RemoteError::InvalidResponse("batch entry response has no status".to_string())
        })?;

        if status.starts_with("201") {
            Ok(CreateStatus::Created {
                location: response.location.clone(),
            })
        } else if status.starts_with("200") {
            Ok(CreateStatus::Skipped)
        } else {
            let code = status
                .get(..3)
                .and_then(|c| c.parse().ok())
                .unwrap_or_default();
            Err(RemoteError::Create {
                status: code,
                body: response
                    .outcome
                    .as_ref()
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| status.to_string()),
            })
        }
    }
}
