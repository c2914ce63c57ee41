//! Bounded delivery pool
//!
//! A fixed number of lanes pull records from one shared queue. Each lane
//! checks the credential, sends the record, reports the outcome and claims
//! the next record until the queue is empty. Outcomes flow to a single
//! consumer over a channel, so aggregation and streaming need no locking.

use super::summary::DeliveryOutcome;
use crate::adapters::fhir::ResourceRepository;
use crate::core::convert::ConvertedRecord;
use crate::core::credential::CredentialRefresher;
use crate::domain::DeviceId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

/// One finished delivery, tagged with what the aggregator needs
#[derive(Debug)]
pub struct Delivered {
    pub lane: usize,
    pub device_id: DeviceId,
    pub effective: DateTime<Utc>,
    pub outcome: DeliveryOutcome,
}

type WorkQueue = Arc<Mutex<mpsc::Receiver<ConvertedRecord>>>;

/// Lanes delivering a set of records
pub struct DeliveryPool {
    tasks: JoinSet<()>,
}

impl DeliveryPool {
    /// Starts `lanes` workers over `records`, reporting into `outcomes`
    ///
    /// Fewer lanes are started when there are fewer records.
    pub fn spawn(
        records: Vec<ConvertedRecord>,
        lanes: usize,
        repository: Arc<dyn ResourceRepository>,
        refresher: Option<Arc<CredentialRefresher>>,
        outcomes: mpsc::Sender<Delivered>,
    ) -> Self {
        let lanes = lanes.clamp(1, records.len().max(1));
        let (queue_tx, queue_rx) = mpsc::channel(records.len().max(1));

        for record in records {
            // Capacity equals the record count, so this never fails
            if let Err(e) = queue_tx.try_send(record) {
                tracing::error!(error = %e, "Delivery queue rejected a record");
            }
        }
        drop(queue_tx);

        let queue: WorkQueue = Arc::new(Mutex::new(queue_rx));
        let mut tasks = JoinSet::new();
        for lane in 0..lanes {
            tasks.spawn(run_lane(
                lane,
                Arc::clone(&queue),
                Arc::clone(&repository),
                refresher.clone(),
                outcomes.clone(),
            ));
        }

        tracing::debug!(lanes, "Delivery lanes started");
        Self { tasks }
    }

    /// Waits for every lane to exit
    pub async fn join(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Delivery lane terminated abnormally");
            }
        }
    }
}

async fn run_lane(
    lane: usize,
    queue: WorkQueue,
    repository: Arc<dyn ResourceRepository>,
    refresher: Option<Arc<CredentialRefresher>>,
    outcomes: mpsc::Sender<Delivered>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(record) = next else {
            break;
        };

        let identifier = record.resource.identifier().to_string();
        let outcome = match &refresher {
            Some(refresher) => match refresher.ensure_fresh(repository.as_ref(), Utc::now()).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(lane, identifier = %identifier, error = %e, "Credential refresh failed");
                    Some(DeliveryOutcome::failed(identifier.clone(), e))
                }
            },
            None => None,
        };

        let outcome = match outcome {
            Some(failed) => failed,
            None => DeliveryOutcome::from_result(
                identifier,
                repository.create(&record.resource).await,
            ),
        };
        crate::log_lane_outcome!(lane, outcome.identifier(), outcome.status());

        let delivered = Delivered {
            lane,
            device_id: record.device_id,
            effective: record.effective,
            outcome,
        };
        if outcomes.send(delivered).await.is_err() {
            // Consumer is gone; nothing left to report to
            break;
        }
    }
}
