//! In-memory state store
//!
//! Used by tests and by `--no-state` runs. Nothing survives the process.

use super::traits::{StateStorage, TokenStore, WatermarkStore};
use crate::core::convert::Watermarks;
use crate::core::state::SubjectState;
use crate::domain::{Credential, Result, SubjectId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: Mutex<HashMap<SubjectId, SubjectState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a credential, replacing any existing one
    pub async fn with_credential(self, subject: &SubjectId, credential: Credential) -> Self {
        {
            let mut states = self.states.lock().await;
            states
                .entry(subject.clone())
                .or_insert_with(|| SubjectState::new(subject.clone()))
                .credential = Some(credential);
        }
        self
    }
}

#[async_trait]
impl TokenStore for InMemoryStateStore {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Credential>> {
        let states = self.states.lock().await;
        Ok(states.get(subject).and_then(|s| s.credential.clone()))
    }

    async fn replace(&self, subject: &SubjectId, credential: &Credential) -> Result<()> {
        let mut states = self.states.lock().await;
        states
            .entry(subject.clone())
            .or_insert_with(|| SubjectState::new(subject.clone()))
            .credential = Some(credential.clone());
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for InMemoryStateStore {
    async fn get_latest_dates(&self, subject: &SubjectId) -> Result<Watermarks> {
        let states = self.states.lock().await;
        Ok(states
            .get(subject)
            .map(|s| s.latest_dates.clone())
            .unwrap_or_default())
    }

    async fn update_latest_dates(&self, subject: &SubjectId, dates: &Watermarks) -> Result<()> {
        let mut states = self.states.lock().await;
        states
            .entry(subject.clone())
            .or_insert_with(|| SubjectState::new(subject.clone()))
            .merge_latest_dates(dates);
        Ok(())
    }
}

#[async_trait]
impl StateStorage for InMemoryStateStore {
    async fn load_state(&self, subject: &SubjectId) -> Result<Option<SubjectState>> {
        Ok(self.states.lock().await.get(subject).cloned())
    }

    async fn save_state(&self, state: &SubjectState) -> Result<()> {
        self.states
            .lock()
            .await
            .insert(state.subject.clone(), state.clone());
        Ok(())
    }

    async fn all_states(&self) -> Result<Vec<SubjectState>> {
        Ok(self.states.lock().await.values().cloned().collect())
    }
}
