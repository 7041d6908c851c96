//! Local clock readings
//!
//! The offset math works on plain `f64` seconds since the Unix epoch. The
//! local clock only carries microsecond precision, which is all the offset
//! formula needs.

use chrono::{DateTime, TimeZone, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time as seconds since the Unix epoch
pub fn now_secs() -> f64 {
    system_time_to_secs(SystemTime::now())
}

/// Converts a `SystemTime` into seconds since the Unix epoch.
///
/// Times before 1970 come out negative.
pub fn system_time_to_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Converts seconds since the Unix epoch back into a `SystemTime`
pub fn secs_to_system_time(secs: f64) -> SystemTime {
    if secs >= 0.0 {
        UNIX_EPOCH + Duration::from_secs_f64(secs)
    } else {
        UNIX_EPOCH - Duration::from_secs_f64(-secs)
    }
}

/// Renders Unix seconds as a UTC date for diagnostics
pub fn secs_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}
