//! Persisted per-subject state
//!
//! One record per subject: the stored bearer credential, the per-device
//! delivery watermarks and the status of the most recent upload.

use crate::core::convert::Watermarks;
use crate::domain::{Credential, SubjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the most recent upload for a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    InProgress,
    Completed,
    /// Finished, but at least one record failed
    Partial,
    Failed,
    #[default]
    NotStarted,
}

/// Everything persisted for one subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectState {
    pub subject: SubjectId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,

    /// Latest successfully delivered effective time per device
    #[serde(default)]
    pub latest_dates: Watermarks,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upload_started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upload_completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_upload_status: UploadStatus,
}

impl SubjectState {
    /// Empty state for a subject that has never uploaded
    pub fn new(subject: SubjectId) -> Self {
        Self {
            subject,
            credential: None,
            latest_dates: Watermarks::new(),
            last_upload_started_at: None,
            last_upload_completed_at: None,
            last_upload_status: UploadStatus::NotStarted,
        }
    }

    /// Folds `dates` into the stored watermarks, never moving one backwards
    pub fn merge_latest_dates(&mut self, dates: &Watermarks) {
        for (device, time) in dates {
            self.latest_dates
                .entry(device.clone())
                .and_modify(|current| {
                    if *time > *current {
                        *current = *time;
                    }
                })
                .or_insert(*time);
        }
    }

    pub fn mark_started(&mut self) {
        self.last_upload_started_at = Some(Utc::now());
        self.last_upload_completed_at = None;
        self.last_upload_status = UploadStatus::InProgress;
    }

    /// Records a finished upload; `all_delivered` is false when any record failed
    pub fn mark_completed(&mut self, all_delivered: bool) {
        self.last_upload_completed_at = Some(Utc::now());
        self.last_upload_status = if all_delivered {
            UploadStatus::Completed
        } else {
            UploadStatus::Partial
        };
    }

    pub fn mark_failed(&mut self) {
        self.last_upload_completed_at = Some(Utc::now());
        self.last_upload_status = UploadStatus::Failed;
    }

    pub fn is_in_progress(&self) -> bool {
        self.last_upload_status == UploadStatus::InProgress
    }

    /// Duration of the last finished upload
    pub fn last_upload_duration(&self) -> Option<chrono::Duration> {
        match (self.last_upload_started_at, self.last_upload_completed_at) {
            (Some(started), Some(completed)) => Some(completed - started),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeviceId;
    use chrono::TimeZone;

    fn subject() -> SubjectId {
        SubjectId::new("patient-1").unwrap()
    }

    #[test]
    fn test_merge_latest_dates_keeps_maximum() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap();

        let mut state = SubjectState::new(subject());
        state.latest_dates.insert(DeviceId::new("pump"), late);

        let mut update = Watermarks::new();
        update.insert(DeviceId::new("pump"), early);
        update.insert(DeviceId::new("cgm"), early);
        state.merge_latest_dates(&update);

        assert_eq!(state.latest_dates[&DeviceId::new("pump")], late);
        assert_eq!(state.latest_dates[&DeviceId::new("cgm")], early);
    }

    #[test]
    fn test_status_transitions() {
        let mut state = SubjectState::new(subject());
        assert_eq!(state.last_upload_status, UploadStatus::NotStarted);

        state.mark_started();
        assert!(state.is_in_progress());
        assert!(state.last_upload_duration().is_none());

        state.mark_completed(false);
        assert_eq!(state.last_upload_status, UploadStatus::Partial);
        assert!(state.last_upload_duration().is_some());

        state.mark_started();
        state.mark_failed();
        assert_eq!(state.last_upload_status, UploadStatus::Failed);
    }

    #[test]
    fn test_serde_round_trip_without_credential() {
        let mut state = SubjectState::new(subject());
        state
            .latest_dates
            .insert(DeviceId::new("DexG6_1"), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("credential").is_none());
        assert_eq!(json["latest_dates"]["DexG6_1"], "2024-03-01T00:00:00Z");
        assert_eq!(json["last_upload_status"], "not_started");

        let back: SubjectState = serde_json::from_value(json).unwrap();
        assert_eq!(back.latest_dates.len(), 1);
    }
}
