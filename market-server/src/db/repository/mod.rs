//! Repository Module
//!
//! Data access for SQLite tables. All functions take `&SqlitePool` and
//! return [`RepoResult`]; multi-statement writes run inside a transaction.

// Accounts
pub mod user;

// Marketplace domain
pub mod listing;
pub mod offer;
pub mod order;
pub mod payout;
pub mod review;

// Platform
pub mod policy;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
