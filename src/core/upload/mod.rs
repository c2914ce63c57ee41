//! Upload orchestration
//!
//! Converts one subject's telemetry, delivers the resources through a
//! bounded lane pool (or batch bundles) and streams a JSON summary.

pub mod coordinator;
pub mod pool;
pub mod stream;
pub mod summary;

pub use coordinator::{DeliveryOptions, UploadOrchestrator, UploadPhase, MAX_CHUNK_SIZE};
pub use stream::SummaryWriter;
pub use summary::{DeliveryOutcome, ResultAggregator, UploadResult};
