//! Domain error types
//!
//! This module defines the error hierarchy for glucobridge.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main glucobridge error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A telemetry entry could not be converted
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Remote repository errors
    #[error("Remote repository error: {0}")]
    Remote(#[from] RemoteError),

    /// Credential refresh errors
    #[error("Credential refresh error: {0}")]
    Credential(#[from] CredentialError),

    /// Token or watermark store errors
    #[error("State store error: {0}")]
    State(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Errors raised while converting a single telemetry entry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Entry kind the insulin converter does not know how to code
    #[error("Unsupported insulin entry type '{0}'")]
    UnsupportedInsulinType(String),

    /// Entry kind the observation converter does not know how to code
    #[error("Unsupported observation entry type '{0}'")]
    UnsupportedObservationType(String),

    /// Glucose units other than mg/dL and mmol/L
    #[error("Unsupported glucose units '{0}'")]
    UnsupportedUnits(String),

    /// A field the resource cannot be built without
    #[error("Missing field '{field}' on {kind} entry")]
    MissingField { kind: String, field: &'static str },

    /// Timestamp or offset outside the representable range
    #[error("Invalid time: {0}")]
    InvalidTime(String),

    /// A convertible entry whose JSON does not match the entry layout
    #[error("Malformed entry: {0}")]
    Malformed(String),
}

/// Remote repository errors
///
/// Errors that occur when talking to the FHIR repository.
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Non-success status from an idempotent create
    #[error("Create failed with status {status}: {body}")]
    Create { status: u16, body: String },

    /// Timeout or connection failure
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Request timed out on the client side
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Search or read failed with a non-success status
    #[error("Request failed with status {status}: {body}")]
    Request { status: u16, body: String },

    /// Response body could not be interpreted
    #[error("Invalid response from repository: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Whether this failure happened below HTTP (nothing reached the server)
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_) | RemoteError::Timeout(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout(err.to_string())
        } else if err.is_decode() {
            RemoteError::InvalidResponse(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Credential refresh errors
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    /// The refresh assertion could not be signed
    #[error("Failed to sign refresh assertion: {0}")]
    Signing(String),

    /// Token endpoint answered with a non-success status
    #[error("Token endpoint returned status {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    /// Token endpoint could not be reached
    #[error("Token endpoint unreachable: {0}")]
    Transport(String),

    /// Token endpoint response was not a credential
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Refreshed credential could not be persisted
    #[error("Failed to persist refreshed credential: {0}")]
    Store(String),

    /// No credential is stored for the subject
    #[error("No credential stored for subject {0}")]
    NotFound(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Configuration(format!("TOML parse error: {err}"))
    }
}
