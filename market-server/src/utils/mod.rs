//! Common utilities
//!
//! - [`AppError`] / [`AppResult`] - application error type
//! - Logging setup, time helpers, input validation

pub mod error;
pub mod logger;
pub mod time;
pub mod validation;

pub use error::{AppError, AppResponse, AppResult};
pub use error::{ok, ok_with_message};
