//! Local time rendering
//!
//! Device timestamps are UTC instants plus the uploader's offset in minutes.
//! Clinical resources carry them as local wall-clock times with an explicit
//! `+HH:MM` suffix and millisecond precision.

use super::l10n::Language;
use crate::domain::ConversionError;
use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Utc};

/// Renders `time` in the local offset given in minutes east of UTC
///
/// # Errors
///
/// Returns [`ConversionError::InvalidTime`] for offsets beyond +-24h.
pub fn local_time(time: DateTime<Utc>, offset_minutes: i32) -> Result<String, ConversionError> {
    let offset = offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            ConversionError::InvalidTime(format!("timezone offset {offset_minutes} out of range"))
        })?;

    Ok(time
        .with_timezone(&offset)
        .to_rfc3339_opts(SecondsFormat::Millis, false))
}

/// End of a delivery period of `duration_ms` starting at `time`
pub fn period_end(time: DateTime<Utc>, duration_ms: f64) -> Result<DateTime<Utc>, ConversionError> {
    if !duration_ms.is_finite() || duration_ms < 0.0 {
        return Err(ConversionError::InvalidTime(format!(
            "invalid duration {duration_ms}"
        )));
    }

    time.checked_add_signed(Duration::milliseconds(duration_ms.round() as i64))
        .ok_or_else(|| ConversionError::InvalidTime(format!("duration {duration_ms} overflows")))
}

/// Narrative clock time (`HH:MM:SS`, or `HH.MM:SS` for fi/sv) of a rendered
/// local timestamp
pub(crate) fn clock_time(rendered: &str, language: Language) -> String {
    let clock = rendered.get(11..19).unwrap_or(rendered);
    clock.replacen(':', &language.clock_separator().to_string(), 1)
}
