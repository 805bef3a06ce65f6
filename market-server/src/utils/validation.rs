//! Input validation helpers
//!
//! Monetary amount and timestamp checks shared by the offer and listing
//! handlers. Text lengths are enforced per request type with `validator`.

use crate::utils::AppError;

/// Maximum allowed monetary amount per transaction
pub const MAX_AMOUNT: f64 = 1_000_000.0;

/// Validate that an amount is finite, positive and within bounds.
pub fn validate_amount(value: f64, field: &str) -> Result<(), AppError> {
    if !value.is_finite() {
        return Err(AppError::validation(format!(
            "{field} must be a finite number, got {value}"
        )));
    }
    if value <= 0.0 {
        return Err(AppError::validation(format!(
            "{field} must be positive, got {value}"
        )));
    }
    if value > MAX_AMOUNT {
        return Err(AppError::validation(format!(
            "{field} exceeds maximum allowed ({MAX_AMOUNT}), got {value}"
        )));
    }
    Ok(())
}

/// Validate an optional future timestamp (Unix millis).
pub fn validate_future_millis(value: Option<i64>, now: i64, field: &str) -> Result<(), AppError> {
    if let Some(ts) = value
        && ts <= now
    {
        return Err(AppError::validation(format!(
            "{field} must be in the future"
        )));
    }
    Ok(())
}
