//! Time helpers
//!
//! Repositories and handlers exchange `i64` Unix millis only.

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whole days as milliseconds
pub fn days_to_millis(days: i64) -> i64 {
    days * 24 * 60 * 60 * 1000
}
