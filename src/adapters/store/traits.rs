//! State storage traits
//!
//! The pipeline only needs two narrow views of persisted state: the token
//! store and the device watermark tracker. [`StateStorage`] is the
//! record-level interface both file and memory backends implement.

use crate::core::convert::Watermarks;
use crate::core::state::SubjectState;
use crate::domain::{Credential, Result, SubjectId};
use async_trait::async_trait;

/// Persisted bearer credentials, keyed by subject
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Stored credential for `subject`, if any
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<Credential>>;

    /// Replaces the stored credential for `subject`
    async fn replace(&self, subject: &SubjectId, credential: &Credential) -> Result<()>;
}

/// Per-device delivery watermarks, keyed by subject
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Latest delivered effective time per device; empty when unknown
    async fn get_latest_dates(&self, subject: &SubjectId) -> Result<Watermarks>;

    /// Merges `dates` into the stored watermarks, keeping the later instant
    async fn update_latest_dates(&self, subject: &SubjectId, dates: &Watermarks) -> Result<()>;
}

/// Whole-record access to per-subject state
#[async_trait]
pub trait StateStorage: TokenStore + WatermarkStore {
    async fn load_state(&self, subject: &SubjectId) -> Result<Option<SubjectState>>;

    async fn save_state(&self, state: &SubjectState) -> Result<()>;

    async fn all_states(&self) -> Result<Vec<SubjectState>>;
}
