// External crates
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

// Internal modules
use crate::constants::CANONICAL_TIME_FMT;
use crate::error::PipelineError;

/// Converts a datetime-styled string into a UTC timestamp by trying each
/// candidate strptime format in order. Format order is significant: day-first
/// patterns are listed before month-first ones, so an ambiguous date resolves
/// day-before-month.
///
/// Date-only formats parse to UTC midnight.
///
/// # Arguments
///
/// * `value` - The string to convert
/// * `formats` - Ordered list of strptime formats to try
///
/// # Returns
///
/// Returns the first successful parse, or an error naming the value and every
/// attempted format.
pub fn str_to_datetime(value: &str, formats: &[&str]) -> Result<DateTime<Utc>, PipelineError> {
    for fmt in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(dt.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(date.and_time(NaiveTime::MIN).and_utc());
        }
    }
    Err(PipelineError::TimestampParse {
        value: value.to_string(),
        formats: formats.iter().map(|f| f.to_string()).collect(),
    })
}

/// Formats an epoch-second timestamp in the pipeline's canonical UTC format.
pub fn format_utc(epoch_secs: i64) -> Result<String, PipelineError> {
    DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.format(CANONICAL_TIME_FMT).to_string())
        .ok_or(PipelineError::TimestampOutOfRange(epoch_secs))
}
