//! Audit log types
//!
//! Core data structures for the tamper-evident audit trail.
//! Entries are immutable and never deleted; a SHA256 hash chain links
//! every record to its predecessor.

use serde::{Deserialize, Serialize};

/// Audited action types (enum, not free text)
///
/// Grouped by domain so every sensitive operation has a stable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AuditAction {
    // System lifecycle
    /// Server started
    SystemStartup,
    /// Server shut down cleanly
    SystemShutdown,

    // Authentication
    /// Account registered
    UserRegistered,
    /// Login succeeded
    LoginSuccess,
    /// Login failed
    LoginFailed,
    /// Multi-factor enrollment confirmed
    MfaEnrolled,
    /// Recovery code burned during login
    MfaRecoveryCodeUsed,

    // Marketplace
    /// Offer accepted, order opened
    OfferAccepted,
    /// Offer countered with a new amount
    OfferCountered,
    /// Offer rejected by the seller
    OfferRejected,
    /// Offer expired (endpoint or scheduler)
    OfferExpired,
    /// Shipment status changed
    ShipmentUpdated,
    /// Escrow released to seller
    PayoutReleased,

    // Moderation and policies
    /// Account suspended by an administrator
    UserSuspended,
    /// Account reinstated by an administrator
    UserReinstated,
    /// Listing removed by an administrator
    ListingRemoved,
    /// Policy version published
    PolicyPublished,
    /// Policy version accepted by a user
    PolicyAccepted,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Audit log entry (immutable)
///
/// Every record carries the SHA256 hash chain:
/// - `prev_hash`: hash of the previous record
/// - `curr_hash`: hash of this record (covers prev_hash + all fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Globally increasing sequence number
    pub id: u64,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    /// Action type
    pub action: AuditAction,
    /// Resource type ("offer", "order", "user", "system", ...)
    pub resource_type: String,
    /// Resource ID
    pub resource_id: String,
    /// Operator ID (None for system events)
    pub operator_id: Option<String>,
    /// Operator name
    pub operator_name: Option<String>,
    /// Structured details (JSON)
    pub details: serde_json::Value,
    /// Hash of the previous entry
    pub prev_hash: String,
    /// Hash of this entry (SHA256)
    pub curr_hash: String,
}

/// Audit log query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct AuditQuery {
    /// Start time (Unix millis, inclusive)
    pub from: Option<i64>,
    /// End time (Unix millis, inclusive)
    pub to: Option<i64>,
    /// Filter by action
    pub action: Option<AuditAction>,
    /// Filter by operator
    pub operator_id: Option<String>,
    /// Filter by resource type
    pub resource_type: Option<String>,
    /// Page offset
    #[serde(default)]
    pub offset: usize,
    /// Page size (default 50)
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Audit log list response
#[derive(Debug, Serialize)]
pub struct AuditListResponse {
    pub items: Vec<AuditEntry>,
    pub total: u64,
}

/// Chain verification result
#[derive(Debug, Serialize)]
pub struct AuditChainVerification {
    /// Number of entries verified
    pub total_entries: u64,
    /// Whether the chain is intact
    pub chain_intact: bool,
    /// Detected breaks
    pub breaks: Vec<AuditChainBreak>,
}

/// A detected break in the hash chain
#[derive(Debug, Serialize)]
pub struct AuditChainBreak {
    /// Sequence number of the broken entry
    pub sequence: u64,
    /// "link" = prev_hash mismatch, "content" = entry hash mismatch,
    /// "gap" = missing sequence number
    pub kind: String,
    pub expected: String,
    pub actual: String,
}
