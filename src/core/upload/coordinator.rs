//! Upload orchestrator
//!
//! Drives one upload call through its phases:
//!
//! ```text
//! Init -> Converting -> Delivering -> Finalizing -> Done
//!   \________\______________________________________-> Failed
//! ```
//!
//! `Failed` is only reachable before the first output byte; once streaming
//! has begun every resource gets an outcome and the summary tail is written.

use super::pool::{Delivered, DeliveryPool};
use super::stream::SummaryWriter;
use super::summary::{DeliveryOutcome, ResultAggregator, UploadResult};
use crate::adapters::fhir::ResourceRepository;
use crate::config::{DeliveryConfig, RepositoryConfig};
use crate::core::convert::{self, Conversion, ConvertedRecord, ConverterOptions};
use crate::core::credential::CredentialRefresher;
use crate::domain::{ClinicalResource, Result, TelemetryEntry};
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

/// Largest chunk (and batch bundle) the repository accepts
pub const MAX_CHUNK_SIZE: usize = 1000;

/// Phase of an upload call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Init,
    Converting,
    Delivering,
    Finalizing,
    Done,
    Failed,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadPhase::Init => "init",
            UploadPhase::Converting => "converting",
            UploadPhase::Delivering => "delivering",
            UploadPhase::Finalizing => "finalizing",
            UploadPhase::Done => "done",
            UploadPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Delivery tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub lanes: usize,
    pub chunk_size: usize,
    pub batch_enabled: bool,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            lanes: 20,
            chunk_size: MAX_CHUNK_SIZE,
            batch_enabled: false,
        }
    }
}

impl DeliveryOptions {
    pub fn from_config(delivery: &DeliveryConfig, repository: &RepositoryConfig) -> Self {
        Self {
            lanes: delivery.lanes.max(1),
            chunk_size: delivery.chunk_size.clamp(1, MAX_CHUNK_SIZE),
            batch_enabled: repository.batch_enabled,
        }
    }
}

/// Converts and delivers one subject's telemetry
pub struct UploadOrchestrator {
    repository: Arc<dyn ResourceRepository>,
    options: DeliveryOptions,
    refresher: Option<Arc<CredentialRefresher>>,
    phase: UploadPhase,
}

impl UploadOrchestrator {
    pub fn new(repository: Arc<dyn ResourceRepository>, options: DeliveryOptions) -> Self {
        Self {
            repository,
            options,
            refresher: None,
            phase: UploadPhase::Init,
        }
    }

    /// Checks the bearer credential before every send
    pub fn with_refresher(mut self, refresher: Arc<CredentialRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    fn transition(&mut self, to: UploadPhase) {
        tracing::debug!(from = %self.phase, to = %to, "Upload phase transition");
        self.phase = to;
    }

    /// Runs a full upload, streaming the JSON summary into `out`
    ///
    /// # Errors
    ///
    /// Errors before streaming starts (an aborted conversion) leave `out`
    /// untouched. After that only a failing writer returns an error;
    /// delivery failures are reported as outcomes.
    pub async fn upload<W>(
        &mut self,
        entries: &[TelemetryEntry],
        converter: &ConverterOptions,
        out: W,
    ) -> Result<UploadResult>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.run(
            entries.len(),
            converter,
            || convert::convert(entries, converter),
            out,
        )
        .await
    }

    /// Same as [`Self::upload`] for raw uploader JSON
    ///
    /// See [`convert::convert_values`] for how foreign record kinds and
    /// malformed entries are handled.
    pub async fn upload_values<W>(
        &mut self,
        values: &[Value],
        converter: &ConverterOptions,
        out: W,
    ) -> Result<UploadResult>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.run(
            values.len(),
            converter,
            || convert::convert_values(values, converter),
            out,
        )
        .await
    }

    async fn run<W, F>(
        &mut self,
        input_len: usize,
        converter: &ConverterOptions,
        convert_input: F,
        out: W,
    ) -> Result<UploadResult>
    where
        W: AsyncWrite + Unpin + Send,
        F: FnOnce() -> Result<Conversion>,
    {
        let started = Instant::now();
        self.phase = UploadPhase::Init;
        crate::log_upload_start!(converter.subject, input_len);

        let mut writer = SummaryWriter::new(out);

        let conversion = if input_len == 0 {
            Conversion::default()
        } else {
            self.transition(UploadPhase::Converting);
            match convert_input() {
                Ok(conversion) => conversion,
                Err(e) => {
                    self.transition(UploadPhase::Failed);
                    crate::log_error_with_context!(e, "Conversion aborted before delivery");
                    return Err(e);
                }
            }
        };

        let Conversion {
            records,
            rejected,
            stale,
            ignored,
        } = conversion;

        if let Err(e) = writer.begin().await {
            self.transition(UploadPhase::Failed);
            return Err(e);
        }

        let mut aggregator = ResultAggregator::new();
        if !records.is_empty() {
            self.transition(UploadPhase::Delivering);
            self.deliver(records, &mut aggregator, &mut writer).await?;
        }

        self.transition(UploadPhase::Finalizing);
        let result = aggregator.finish(rejected, stale, ignored, started.elapsed());
        writer.finish(&result).await?;
        result.log_summary();

        self.transition(UploadPhase::Done);
        Ok(result)
    }

    /// Delivers converted records chunk by chunk
    pub async fn deliver<W>(
        &self,
        mut records: Vec<ConvertedRecord>,
        aggregator: &mut ResultAggregator,
        writer: &mut SummaryWriter<W>,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let total = records.len();
        let chunk_size = self.options.chunk_size.clamp(1, MAX_CHUNK_SIZE);
        let mut chunk_index = 0;

        while !records.is_empty() {
            let rest = records.split_off(chunk_size.min(records.len()));
            let chunk = std::mem::replace(&mut records, rest);
            chunk_index += 1;

            tracing::debug!(
                chunk = chunk_index,
                size = chunk.len(),
                remaining = records.len(),
                total,
                "Delivering chunk"
            );

            if self.options.batch_enabled && chunk.len() > 1 {
                self.deliver_batch(chunk, aggregator, writer).await?;
            } else {
                self.deliver_lanes(chunk, aggregator, writer).await?;
            }
        }

        Ok(())
    }

    async fn deliver_batch<W>(
        &self,
        chunk: Vec<ConvertedRecord>,
        aggregator: &mut ResultAggregator,
        writer: &mut SummaryWriter<W>,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let refresh = match &self.refresher {
            Some(refresher) => refresher
                .ensure_fresh(self.repository.as_ref(), Utc::now())
                .await
                .err(),
            None => None,
        };

        let outcomes: Vec<DeliveryOutcome> = match refresh {
            Some(e) => {
                tracing::warn!(error = %e, size = chunk.len(), "Credential refresh failed; failing batch");
                chunk
                    .iter()
                    .map(|r| DeliveryOutcome::failed(r.resource.identifier(), &e))
                    .collect()
            }
            None => {
                let resources: Vec<ClinicalResource> =
                    chunk.iter().map(|r| r.resource.clone()).collect();
                let mut results = self.repository.create_batch(&resources).await.into_iter();
                chunk
                    .iter()
                    .map(|r| match results.next() {
                        Some(result) => DeliveryOutcome::from_result(r.resource.identifier(), result),
                        None => DeliveryOutcome::failed(
                            r.resource.identifier(),
                            "batch response has no entry for this resource",
                        ),
                    })
                    .collect()
            }
        };

        for (record, outcome) in chunk.into_iter().zip(outcomes) {
            writer.write_record(&outcome).await?;
            aggregator.record(outcome, &record.device_id, record.effective);
        }
        Ok(())
    }

    async fn deliver_lanes<W>(
        &self,
        chunk: Vec<ConvertedRecord>,
        aggregator: &mut ResultAggregator,
        writer: &mut SummaryWriter<W>,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let (tx, mut rx) = mpsc::channel::<Delivered>(self.options.lanes.max(1));
        let pool = DeliveryPool::spawn(
            chunk,
            self.options.lanes,
            Arc::clone(&self.repository),
            self.refresher.clone(),
            tx,
        );

        while let Some(delivered) = rx.recv().await {
            writer.write_record(&delivered.outcome).await?;
            aggregator.record(delivered.outcome, &delivered.device_id, delivered.effective);
        }

        pool.join().await;
        Ok(())
    }
}
