//! Upload outcomes and aggregation
//!
//! Every delivered resource produces exactly one [`DeliveryOutcome`]. The
//! [`ResultAggregator`] folds them into counts, the ordered outcome list and
//! the per-device watermark for the next incremental upload.

use crate::adapters::fhir::{CreateStatus, RemoteResult};
use crate::core::convert::{RejectedEntry, Watermarks};
use crate::domain::DeviceId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Result of delivering one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Created {
        identifier: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    Skipped {
        identifier: String,
    },
    Failed {
        identifier: String,
        error: String,
    },
}

impl DeliveryOutcome {
    /// Classifies a repository response for the resource with `identifier`
    pub fn from_result(identifier: impl Into<String>, result: RemoteResult<CreateStatus>) -> Self {
        let identifier = identifier.into();
        match result {
            Ok(CreateStatus::Created { location }) => Self::Created {
                identifier,
                location,
            },
            Ok(CreateStatus::Skipped) => Self::Skipped { identifier },
            Err(e) => Self::Failed {
                identifier,
                error: e.to_string(),
            },
        }
    }

    pub fn failed(identifier: impl Into<String>, error: impl ToString) -> Self {
        Self::Failed {
            identifier: identifier.into(),
            error: error.to_string(),
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Self::Created { identifier, .. }
            | Self::Skipped { identifier }
            | Self::Failed { identifier, .. } => identifier,
        }
    }

    /// Created or already present on the repository
    pub fn is_delivered(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Aggregate of one upload call
#[derive(Debug, Clone, Default)]
pub struct UploadResult {
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,

    /// Outcomes in completion order
    pub records: Vec<DeliveryOutcome>,

    /// Maximum effective time among delivered records, per device
    pub latest_seen_dates: Watermarks,

    /// Entries left out by the conversion skip policy
    pub rejected: Vec<RejectedEntry>,

    /// Entries dropped by the watermark filter
    pub stale: usize,

    /// Entries of kinds that are never converted
    pub ignored: usize,

    pub duration: Duration,
}

impl UploadResult {
    /// Number of resources that reached delivery
    pub fn total(&self) -> usize {
        self.created + self.skipped + self.errors
    }

    /// True when no delivery failed
    pub fn success(&self) -> bool {
        self.errors == 0
    }

    pub fn log_summary(&self) {
        crate::log_upload_complete!(self.created, self.skipped, self.errors, self.duration);

        if !self.rejected.is_empty() || self.stale > 0 {
            tracing::info!(
                rejected = self.rejected.len(),
                stale = self.stale,
                ignored = self.ignored,
                "Entries left out before delivery"
            );
        }

        if self.errors > 0 {
            tracing::warn!(errors = self.errors, "Upload completed with errors");
            for outcome in self.records.iter().filter(|o| !o.is_delivered()) {
                if let DeliveryOutcome::Failed { identifier, error } = outcome {
                    tracing::warn!(identifier = %identifier, error = %error, "Delivery failed");
                }
            }
        }
    }
}

/// Accumulates outcomes for one upload call
#[derive(Debug, Default)]
pub struct ResultAggregator {
    result: UploadResult,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one outcome for a record from `device_id` effective at `effective`
    pub fn record(&mut self, outcome: DeliveryOutcome, device_id: &DeviceId, effective: DateTime<Utc>) {
        match outcome {
            DeliveryOutcome::Created { .. } => self.result.created += 1,
            DeliveryOutcome::Skipped { .. } => self.result.skipped += 1,
            DeliveryOutcome::Failed { .. } => self.result.errors += 1,
        }

        if outcome.is_delivered() {
            self.result
                .latest_seen_dates
                .entry(device_id.clone())
                .and_modify(|latest| {
                    if effective > *latest {
                        *latest = effective;
                    }
                })
                .or_insert(effective);
        }

        self.result.records.push(outcome);
    }

    /// Current counts (created, skipped, errors)
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.result.created, self.result.skipped, self.result.errors)
    }

    pub fn finish(
        self,
        rejected: Vec<RejectedEntry>,
        stale: usize,
        ignored: usize,
        duration: Duration,
    ) -> UploadResult {
        UploadResult {
            rejected,
            stale,
            ignored,
            duration,
            ..self.result
        }
    }
}
