//! Logging and observability
//!
//! Structured logging through `tracing`:
//! - human-readable or JSON console output
//! - configurable log levels
//! - local JSON file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use glucobridge::logging::init_logging;
//! use glucobridge::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Bridge started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of an upload
///
/// # Example
///
/// ```no_run
/// use glucobridge::log_upload_start;
/// use glucobridge::domain::SubjectId;
///
/// let subject = SubjectId::new("patient-1").unwrap();
/// log_upload_start!(&subject, 128);
/// ```
#[macro_export]
macro_rules! log_upload_start {
    ($subject:expr, $entries:expr) => {
        tracing::info!(
            subject = %$subject,
            entries = $entries,
            "Starting upload"
        );
    };
}

/// Log the completion of an upload
#[macro_export]
macro_rules! log_upload_complete {
    ($created:expr, $skipped:expr, $errors:expr, $duration:expr) => {
        tracing::info!(
            created = $created,
            skipped = $skipped,
            errors = $errors,
            duration_ms = $duration.as_millis() as u64,
            "Upload completed"
        );
    };
}

/// Log one delivery outcome from a lane
#[macro_export]
macro_rules! log_lane_outcome {
    ($lane:expr, $identifier:expr, $status:expr) => {
        tracing::debug!(
            lane = $lane,
            identifier = %$identifier,
            status = $status,
            "Record delivered"
        );
    };
}

/// Log a credential refresh attempt
///
/// # Example
///
/// ```no_run
/// use glucobridge::log_refresh_attempt;
///
/// log_refresh_attempt!("patient-1", "2024-05-01T12:00:00Z");
/// ```
#[macro_export]
macro_rules! log_refresh_attempt {
    ($subject:expr, $expires:expr) => {
        tracing::info!(
            subject = %$subject,
            expires = %$expires,
            "Refreshing bearer credential"
        );
    };
}

/// Log an error with context
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
