//! State manager for credentials and delivery watermarks
//!
//! Thin facade over a [`StateStorage`] backend that adds the upload status
//! bookkeeping around each run.

use crate::adapters::store::{StateStorage, TokenStore, WatermarkStore};
use crate::core::convert::Watermarks;
use crate::core::state::subject_state::SubjectState;
use crate::domain::{Credential, Result, SubjectId};
use std::sync::Arc;

/// Loads and saves per-subject state
#[derive(Clone)]
pub struct StateManager {
    storage: Arc<dyn StateStorage>,
}

impl StateManager {
    pub fn new_with_storage(storage: Arc<dyn StateStorage>) -> Self {
        Self { storage }
    }

    /// Token store view of the backend
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        Arc::new(TokenView(Arc::clone(&self.storage)))
    }

    pub async fn load_credential(&self, subject: &SubjectId) -> Result<Option<Credential>> {
        self.storage.find_by_subject(subject).await
    }

    /// Watermarks to pass as `skip_before` on the next conversion
    pub async fn latest_dates(&self, subject: &SubjectId) -> Result<Watermarks> {
        self.storage.get_latest_dates(subject).await
    }

    /// Marks an upload as started
    ///
    /// Returns the previous status so callers can warn about an interrupted run.
    pub async fn begin_upload(&self, subject: &SubjectId) -> Result<SubjectState> {
        let mut state = self
            .storage
            .load_state(subject)
            .await?
            .unwrap_or_else(|| SubjectState::new(subject.clone()));

        if state.is_in_progress() {
            tracing::warn!(
                subject = %subject,
                started_at = ?state.last_upload_started_at,
                "Previous upload did not finish"
            );
        }

        let previous = state.clone();
        state.mark_started();
        self.storage.save_state(&state).await?;
        Ok(previous)
    }

    /// Checkpoints a finished upload: merges the watermarks and records the status
    pub async fn finish_upload(
        &self,
        subject: &SubjectId,
        latest_seen: &Watermarks,
        all_delivered: bool,
    ) -> Result<()> {
        tracing::info!(
            subject = %subject,
            devices = latest_seen.len(),
            all_delivered,
            "Checkpointing upload"
        );

        // The credential may have been replaced mid-upload; reload before writing
        let mut state = self
            .storage
            .load_state(subject)
            .await?
            .unwrap_or_else(|| SubjectState::new(subject.clone()));
        state.merge_latest_dates(latest_seen);
        state.mark_completed(all_delivered);
        self.storage.save_state(&state).await
    }

    pub async fn fail_upload(&self, subject: &SubjectId) -> Result<()> {
        let mut state = self
            .storage
            .load_state(subject)
            .await?
            .unwrap_or_else(|| SubjectState::new(subject.clone()));
        state.mark_failed();
        self.storage.save_state(&state).await
    }

    pub async fn subject_state(&self, subject: &SubjectId) -> Result<Option<SubjectState>> {
        self.storage.load_state(subject).await
    }

    pub async fn all_states(&self) -> Result<Vec<SubjectState>> {
        self.storage.all_states().await
    }
}

// Narrows the storage handle to the token store trait object
struct TokenView(Arc<dyn StateStorage>);

#[async_trait::async_trait]
impl TokenStore for TokenView {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Credential>> {
        self.0.find_by_subject(subject).await
    }

    async fn replace(&self, subject: &SubjectId, credential: &Credential) -> Result<()> {
        self.0.replace(subject, credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::InMemoryStateStore;
    use crate::core::state::UploadStatus;
    use crate::domain::DeviceId;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_upload_lifecycle() {
        let manager = StateManager::new_with_storage(Arc::new(InMemoryStateStore::new()));
        let subject = SubjectId::new("p1").unwrap();
        let seen = Utc.with_ymd_and_hms(2024, 2, 2, 2, 2, 2).unwrap();

        let previous = manager.begin_upload(&subject).await.unwrap();
        assert_eq!(previous.last_upload_status, UploadStatus::NotStarted);

        manager
            .finish_upload(&subject, &Watermarks::from([(DeviceId::new("cgm"), seen)]), true)
            .await
            .unwrap();

        let state = manager.subject_state(&subject).await.unwrap().unwrap();
        assert_eq!(state.last_upload_status, UploadStatus::Completed);
        assert_eq!(manager.latest_dates(&subject).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finish_keeps_credential_replaced_during_upload() {
        let manager = StateManager::new_with_storage(Arc::new(InMemoryStateStore::new()));
        let subject = SubjectId::new("p1").unwrap();

        manager.begin_upload(&subject).await.unwrap();
        manager
            .token_store()
            .replace(&subject, &Credential::new("new", "new-r", Utc::now()))
            .await
            .unwrap();
        manager
            .finish_upload(&subject, &Watermarks::new(), false)
            .await
            .unwrap();

        assert!(manager.load_credential(&subject).await.unwrap().is_some());
        let state = manager.subject_state(&subject).await.unwrap().unwrap();
        assert_eq!(state.last_upload_status, UploadStatus::Partial);
    }
}
