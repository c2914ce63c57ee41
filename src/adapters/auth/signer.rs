//! Refresh assertion signing
//!
//! The token endpoint only honours a refresh request when it carries an
//! RSA-SHA256 signature over `Bearer <refresh token> || <nonce>` made with
//! the bridge's private key.

use crate::domain::CredentialError;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey};
use std::path::Path;

/// Signs refresh assertions
pub trait AssertionSigner: Send + Sync {
    /// Raw signature bytes over `payload`
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CredentialError>;

    /// Standard base64 signature as sent to the token endpoint
    fn sign_base64(&self, payload: &[u8]) -> Result<String, CredentialError> {
        self.sign(payload).map(|bytes| STANDARD.encode(bytes))
    }
}

/// Text the refresh signature covers
pub fn assertion_payload(refresh_token: &str, nonce: &str) -> String {
    format!("Bearer {refresh_token} || {nonce}")
}

/// RS256 signer backed by a PEM encoded RSA private key
pub struct PemSigner {
    key: EncodingKey,
}

impl PemSigner {
    /// Parses an RSA private key (PKCS#1 or PKCS#8 PEM)
    pub fn from_pem(pem: &[u8]) -> Result<Self, CredentialError> {
        let key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| CredentialError::Signing(format!("invalid RSA private key: {e}")))?;
        Ok(Self { key })
    }

    /// Reads and parses the key at `path`
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            CredentialError::Signing(format!(
                "failed to read private key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_pem(&pem)
    }
}

impl std::fmt::Debug for PemSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PemSigner").finish_non_exhaustive()
    }
}

impl AssertionSigner for PemSigner {
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, CredentialError> {
        // jsonwebtoken hands back the JWS form (base64url, unpadded)
        let encoded = jsonwebtoken::crypto::sign(payload, &self.key, Algorithm::RS256)
            .map_err(|e| CredentialError::Signing(e.to_string()))?;
        URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| CredentialError::Signing(e.to_string()))
    }
}
