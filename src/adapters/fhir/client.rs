//! FHIR REST client
//!
//! reqwest-based implementation of [`ResourceRepository`]. The bearer token
//! lives behind a lock so it can be swapped mid-upload without rebuilding the
//! client or its connection pool.

use super::models::{if_none_exist, BatchBundle, CreateStatus, ResponseBundle};
use super::repository::{RemoteResult, ResourceRepository};
use crate::config::{RepositoryConfig, SecretString};
use crate::domain::{BridgeError, ClinicalResource, RemoteError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;

const FHIR_JSON: &str = "application/fhir+json";
const FHIR_JSON_UTF8: &str = "application/fhir+json; charset=UTF-8";

/// FHIR repository client
pub struct FhirClient {
    base_url: String,
    client: Client,
    bearer_token: RwLock<Option<SecretString>>,
    basic_auth: Option<SecretString>,
}

impl FhirClient {
    /// Creates a client for the configured repository
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &RepositoryConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(FHIR_JSON));
        default_headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(default_headers);

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification disabled for FHIR repository");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            BridgeError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        if config.basic_auth.is_some() {
            tracing::info!("Using Basic Authentication for FHIR repository");
        }

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            bearer_token: RwLock::new(None),
            basic_auth: config.basic_auth.clone(),
        })
    }

    /// Sets the initial bearer token
    pub fn with_bearer_token(self, token: SecretString) -> Self {
        Self {
            bearer_token: RwLock::new(Some(token)),
            ..self
        }
    }

    /// Base URL of the repository
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build authorization header value; basic auth wins over bearer tokens
    async fn auth_header_value(&self) -> Option<String> {
        if let Some(basic) = &self.basic_auth {
            let encoded = general_purpose::STANDARD.encode(basic.expose_secret().as_str());
            return Some(format!("Basic {encoded}"));
        }

        self.bearer_token
            .read()
            .await
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret().as_str()))
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_header_value().await {
            Some(auth) => request.header(reqwest::header::AUTHORIZATION, auth),
            None => request,
        }
    }

    fn location(response: &Response) -> Option<String> {
        response
            .headers()
            .get(LOCATION)
            .or_else(|| response.headers().get("Content-Location"))
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    async fn json_or_error(response: Response) -> RemoteResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Request {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<Value>().await?)
    }

    async fn submit_batch(&self, resources: &[ClinicalResource]) -> RemoteResult<ResponseBundle> {
        let bundle = BatchBundle::conditional_creates(resources);
        let request = self
            .client
            .post(&self.base_url)
            .header(CONTENT_TYPE, FHIR_JSON_UTF8)
            .json(&bundle);

        let response = self.authorized(request).await.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Create {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ResponseBundle>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(format!("invalid batch response: {e}")))
    }
}

#[async_trait]
impl ResourceRepository for FhirClient {
    async fn create(&self, resource: &ClinicalResource) -> RemoteResult<CreateStatus> {
        let url = format!("{}/{}", self.base_url, resource.resource_type());
        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, FHIR_JSON_UTF8)
            .header("If-None-Exist", if_none_exist(resource))
            .json(resource);

        let response = self.authorized(request).await.send().await?;
        let status = response.status().as_u16();
        let location = Self::location(&response);

        tracing::debug!(
            identifier = %resource.identifier(),
            status = status,
            "FHIR create response"
        );

        if status == 200 || status == 201 {
            return CreateStatus::from_http(status, location, String::new);
        }

        let body = response.text().await.unwrap_or_default();
        CreateStatus::from_http(status, location, || body)
    }

    async fn create_batch(&self, resources: &[ClinicalResource]) -> Vec<RemoteResult<CreateStatus>> {
        match self.submit_batch(resources).await {
            Ok(bundle) => {
                let mut entries = bundle.entry.into_iter();
                let results: Vec<_> = resources
                    .iter()
                    .map(|_| match entries.next() {
                        Some(entry) => entry.create_status(),
                        None => Err(RemoteError::InvalidResponse(
                            "batch response has fewer entries than the request".to_string(),
                        )),
                    })
                    .collect();

                let errors = results.iter().filter(|r| r.is_err()).count();
                if errors > 0 {
                    tracing::error!(
                        members = resources.len(),
                        errors = errors,
                        "Batch upload completed with errors"
                    );
                }
                results
            }
            Err(e) => {
                tracing::error!(
                    members = resources.len(),
                    error = %e,
                    "Batch upload failed; every member marked as failed"
                );
                resources.iter().map(|_| Err(e.clone())).collect()
            }
        }
    }

    async fn search(&self, resource_type: &str, params: &[(&str, &str)]) -> RemoteResult<Value> {
        tracing::info!(
            resource_type = %resource_type,
            params = ?params,
            "Searching FHIR repository"
        );

        let url = format!("{}/{}", self.base_url, resource_type);
        let request = self.client.get(&url).query(params);
        let response = self.authorized(request).await.send().await?;
        Self::json_or_error(response).await
    }

    async fn read(&self, resource_type: &str, id: &str) -> RemoteResult<Value> {
        let url = format!("{}/{}/{}", self.base_url, resource_type, id);
        let response = self.authorized(self.client.get(&url)).await.send().await?;
        Self::json_or_error(response).await
    }

    async fn set_bearer_token(&self, token: SecretString) {
        if self.basic_auth.is_some() {
            tracing::debug!("Ignoring bearer token update in basic auth mode");
            return;
        }
        *self.bearer_token.write().await = Some(token);
    }
}
