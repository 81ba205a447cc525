use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time as fractional seconds. This is the timestamp
/// format both transports put on the wire; clients subtract it from
/// their own clock to estimate one-way delay.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Human-readable server time for JSON responses.
pub fn server_time_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
