//! Tamper-evident audit trail
//!
//! ```text
//! handler ──► AuditService::log ──► mpsc ──► AuditWorker ──► AuditStorage
//!                                                                │
//!                                                     append-only SQLite table
//!                                                     linked by SHA256 hashes
//! ```
//!
//! Writes flow through a single worker so the chain is extended in order;
//! queries and verification read the table directly. Startup and shutdown
//! entries use `log_sync` because the worker is not running yet (or
//! anymore) at those points.

pub mod service;
pub mod storage;
pub mod types;
pub mod worker;

pub use service::{AuditLogRequest, AuditService};
pub use storage::{AuditStorage, AuditStorageError, AuditStorageResult};
pub use types::{
    AuditAction, AuditChainBreak, AuditChainVerification, AuditEntry, AuditListResponse,
    AuditQuery,
};
pub use worker::AuditWorker;
