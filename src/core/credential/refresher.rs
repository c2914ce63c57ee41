//! Credential refresher
//!
//! Holds the upload's active credential in a mutex-protected slot. Lanes call
//! [`CredentialRefresher::ensure_fresh`] before each send; the first lane to
//! find the token stale performs the exchange while holding the slot, and
//! every other lane waits on the lock and then sees the new credential. Only
//! one refresh request is ever in flight.
//!
//! A failed exchange is remembered for the retry back-off window. Lanes
//! arriving inside it get the same error without contacting the token
//! endpoint again.

use crate::adapters::auth::{assertion_payload, AssertionSigner, TokenExchange};
use crate::adapters::fhir::ResourceRepository;
use crate::adapters::store::TokenStore;
use crate::domain::{Credential, CredentialError, SubjectId};
use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Default window before expiry in which a credential is refreshed
pub const DEFAULT_REFRESH_MARGIN_MINUTES: i64 = 10;

/// Default time after a failed exchange before the endpoint is tried again
pub const DEFAULT_RETRY_BACKOFF_SECONDS: i64 = 30;

struct Slot {
    credential: Credential,
    last_failure: Option<(DateTime<Utc>, CredentialError)>,
}

pub struct CredentialRefresher {
    subject: SubjectId,
    margin: Duration,
    retry_backoff: Duration,
    signer: Arc<dyn AssertionSigner>,
    endpoint: Arc<dyn TokenExchange>,
    store: Arc<dyn TokenStore>,
    slot: Mutex<Slot>,
}

impl CredentialRefresher {
    pub fn new(
        subject: SubjectId,
        credential: Credential,
        signer: Arc<dyn AssertionSigner>,
        endpoint: Arc<dyn TokenExchange>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            subject,
            margin: Duration::minutes(DEFAULT_REFRESH_MARGIN_MINUTES),
            retry_backoff: Duration::seconds(DEFAULT_RETRY_BACKOFF_SECONDS),
            signer,
            endpoint,
            store,
            slot: Mutex::new(Slot {
                credential,
                last_failure: None,
            }),
        }
    }

    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Zero disables the back-off; every stale lane then retries
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// True iff `now >= expiry - margin`
    pub fn needs_refresh(&self, credential: &Credential, now: DateTime<Utc>) -> bool {
        credential.expires_within(self.margin, now)
    }

    /// Exchanges `credential` for a new one and persists it
    ///
    /// Does not touch the active slot; see [`Self::ensure_fresh`]. A store
    /// failure is logged and the fresh credential is still returned.
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential, CredentialError> {
        let fresh = self.exchange(credential).await?;
        self.persist(&fresh).await;
        Ok(fresh)
    }

    async fn exchange(&self, credential: &Credential) -> Result<Credential, CredentialError> {
        crate::log_refresh_attempt!(self.subject, credential.expires.to_rfc3339());

        let refresh_token = credential.refresh_token.expose_secret().as_str();
        let nonce = Uuid::new_v4().to_string();
        let payload = assertion_payload(refresh_token, &nonce);
        let signature = self.signer.sign_base64(payload.as_bytes())?;

        let fresh = self
            .endpoint
            .exchange(refresh_token, &signature, &nonce)
            .await?;

        tracing::info!(
            subject = %self.subject,
            expires = %fresh.expires.to_rfc3339(),
            "Bearer credential refreshed"
        );
        Ok(fresh)
    }

    /// Store failures are logged; `fresh` stays in use
    async fn persist(&self, fresh: &Credential) {
        if let Err(e) = self.store.replace(&self.subject, fresh).await {
            let error = CredentialError::Store(e.to_string());
            tracing::error!(
                subject = %self.subject,
                error = %error,
                "Refreshed credential could not be persisted"
            );
        }
    }

    /// Refreshes the active credential if due and pushes it into `repository`
    ///
    /// The fresh credential is installed in the slot and the repository before
    /// it is persisted.
    ///
    /// # Errors
    ///
    /// A failed exchange leaves the stale credential in place. Callers within
    /// the retry back-off get the same error; the first caller after it tries
    /// again.
    pub async fn ensure_fresh(
        &self,
        repository: &dyn ResourceRepository,
        now: DateTime<Utc>,
    ) -> Result<(), CredentialError> {
        let mut slot = self.slot.lock().await;
        if !self.needs_refresh(&slot.credential, now) {
            return Ok(());
        }

        if let Some((failed_at, error)) = &slot.last_failure {
            if now < *failed_at + self.retry_backoff {
                tracing::debug!(
                    subject = %self.subject,
                    failed_at = %failed_at.to_rfc3339(),
                    "Credential refresh backing off"
                );
                return Err(error.clone());
            }
        }

        let exchanged = self.exchange(&slot.credential).await;
        let fresh = match exchanged {
            Ok(fresh) => fresh,
            Err(e) => {
                slot.last_failure = Some((now, e.clone()));
                return Err(e);
            }
        };

        repository
            .set_bearer_token(fresh.access_token.clone())
            .await;
        slot.credential = fresh;
        slot.last_failure = None;
        self.persist(&slot.credential).await;
        Ok(())
    }

    /// Snapshot of the active credential
    pub async fn current(&self) -> Credential {
        self.slot.lock().await.credential.clone()
    }

    /// Hands the active credential back once the upload is over
    pub fn into_credential(self) -> Credential {
        self.slot.into_inner().credential
    }
}
