//! JSON file state store
//!
//! Keeps every subject's state in one JSON document. Each mutation reads the
//! file, applies the change and writes it back through a temporary file and
//! a rename, so a crash never leaves a half-written document behind.

use super::traits::{StateStorage, TokenStore, WatermarkStore};
use crate::core::convert::Watermarks;
use crate::core::state::SubjectState;
use crate::domain::{BridgeError, Credential, Result, SubjectId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    #[serde(default)]
    subjects: BTreeMap<String, SubjectState>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            subjects: BTreeMap::new(),
        }
    }
}

/// File-backed implementation of the token and watermark stores
#[derive(Debug)]
pub struct JsonFileStateStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<StateDocument> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StateDocument::default())
            }
            Err(e) => {
                return Err(BridgeError::State(format!(
                    "Failed to read state file {}: {e}",
                    self.path.display()
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(StateDocument::default());
        }

        let document: StateDocument = serde_json::from_str(&content).map_err(|e| {
            BridgeError::State(format!(
                "State file {} is not valid: {e}",
                self.path.display()
            ))
        })?;

        if document.version != FORMAT_VERSION {
            return Err(BridgeError::State(format!(
                "Unsupported state file version {} (expected {FORMAT_VERSION})",
                document.version
            )));
        }

        Ok(document)
    }

    async fn write_document(&self, document: &StateDocument) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Applies `f` to the subject's state, creating it when absent
    async fn update<F>(&self, subject: &SubjectId, f: F) -> Result<()>
    where
        F: FnOnce(&mut SubjectState) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        let state = document
            .subjects
            .entry(subject.as_str().to_string())
            .or_insert_with(|| SubjectState::new(subject.clone()));
        f(state);
        self.write_document(&document).await
    }

    async fn get(&self, subject: &SubjectId) -> Result<Option<SubjectState>> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        Ok(document.subjects.remove(subject.as_str()))
    }
}

#[async_trait]
impl TokenStore for JsonFileStateStore {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Credential>> {
        Ok(self.get(subject).await?.and_then(|s| s.credential))
    }

    async fn replace(&self, subject: &SubjectId, credential: &Credential) -> Result<()> {
        tracing::debug!(subject = %subject, path = %self.path.display(), "Persisting credential");
        let credential = credential.clone();
        self.update(subject, move |state| state.credential = Some(credential))
            .await
    }
}

#[async_trait]
impl WatermarkStore for JsonFileStateStore {
    async fn get_latest_dates(&self, subject: &SubjectId) -> Result<Watermarks> {
        Ok(self
            .get(subject)
            .await?
            .map(|s| s.latest_dates)
            .unwrap_or_default())
    }

    async fn update_latest_dates(&self, subject: &SubjectId, dates: &Watermarks) -> Result<()> {
        if dates.is_empty() {
            return Ok(());
        }
        self.update(subject, |state| state.merge_latest_dates(dates))
            .await
    }
}

#[async_trait]
impl StateStorage for JsonFileStateStore {
    async fn load_state(&self, subject: &SubjectId) -> Result<Option<SubjectState>> {
        self.get(subject).await
    }

    async fn save_state(&self, state: &SubjectState) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        document
            .subjects
            .insert(state.subject.as_str().to_string(), state.clone());
        self.write_document(&document).await
    }

    async fn all_states(&self) -> Result<Vec<SubjectState>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.subjects.into_values().collect())
    }
}
