//! `Retry-After` header handling.

use std::time::Duration;

use tracing::debug;

/// Parse a `Retry-After` value as a plain number of seconds.
///
/// Only the numeric form is honored; HTTP-date values (and anything else
/// unparseable, including negative numbers) are ignored so the caller
/// falls back to the computed delay.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    let raw = value?.trim();
    match raw.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Some(Duration::from_secs_f64(secs)),
        _ => {
            debug!("Ignoring unparseable Retry-After value {:?}", raw);
            None
        }
    }
}
