//! Token endpoint client
//!
//! Exchanges a refresh token plus a signed assertion for a new credential.

use crate::config::CredentialsConfig;
use crate::domain::{BridgeError, Credential, CredentialError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    signature: &'a str,
    nonce: &'a str,
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    /// Absent when the endpoint does not rotate refresh tokens
    #[serde(default)]
    refresh_token: Option<String>,
    expires: DateTime<Utc>,
}

/// Exchanges a refresh token and signed assertion for a new credential
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// # Errors
    ///
    /// Non-success statuses, unreachable endpoints and malformed bodies are
    /// reported as [`CredentialError`] variants; nothing is retried here.
    async fn exchange(
        &self,
        refresh_token: &str,
        signature: &str,
        nonce: &str,
    ) -> std::result::Result<Credential, CredentialError>;
}

/// HTTP client for the credential refresh endpoint
#[derive(Debug, Clone)]
pub struct TokenEndpointClient {
    url: String,
    client: Client,
}

impl TokenEndpointClient {
    /// Creates a client for `url` with the given request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                BridgeError::Configuration(format!("Failed to build token endpoint client: {e}"))
            })?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Creates a client from the `[credentials]` section, if refresh is configured
    pub fn from_config(config: &CredentialsConfig) -> Result<Option<Self>> {
        config
            .token_endpoint
            .as_ref()
            .map(|url| Self::new(url.clone(), Duration::from_secs(config.timeout_seconds)))
            .transpose()
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenExchange for TokenEndpointClient {
    async fn exchange(
        &self,
        refresh_token: &str,
        signature: &str,
        nonce: &str,
    ) -> std::result::Result<Credential, CredentialError> {
        let body = RefreshRequest {
            signature,
            nonce,
            refresh: refresh_token,
        };

        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, format!("Bearer {refresh_token}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;

        Ok(Credential::new(
            token.access_token,
            token
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
            token.expires,
        ))
    }
}
