//! Bearer credential domain model

use crate::config::SecretString;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair with the access token's expiry
///
/// Scoped to one upload call: read from the token store at call start,
/// possibly replaced mid-call, and written back when refreshed. Token values
/// are zeroized on drop and redacted from `Debug` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token sent to the repository
    pub access_token: SecretString,

    /// Token exchanged for a new credential at the token endpoint
    pub refresh_token: SecretString,

    /// Expiry of the access token
    pub expires: DateTime<Utc>,
}

impl Credential {
    /// Creates a credential from raw token strings
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: crate::config::secret_string(access_token.into()),
            refresh_token: crate::config::secret_string(refresh_token.into()),
            expires,
        }
    }

    /// Whether `now` falls inside the `margin` before expiry (or past it)
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        now >= self.expires - margin
    }
}
