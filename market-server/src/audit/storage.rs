//! Audit log storage
//!
//! Append-only SQLite table with a SHA256 hash chain. Appends are
//! serialized through a mutex so sequence numbers and hash links are
//! assigned without races; reads go straight to the pool.

use super::types::{AuditAction, AuditChainBreak, AuditChainVerification, AuditEntry, AuditQuery};
use crate::utils::error::AppError;
use crate::utils::time::now_millis;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;

/// prev_hash of the very first entry
const GENESIS_HASH: &str = "genesis";

#[derive(Debug, thiserror::Error)]
pub enum AuditStorageError {
    #[error("Audit database error: {0}")]
    Database(String),

    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for AuditStorageError {
    fn from(err: sqlx::Error) -> Self {
        AuditStorageError::Database(err.to_string())
    }
}

impl From<AuditStorageError> for AppError {
    fn from(err: AuditStorageError) -> Self {
        AppError::internal(err.to_string())
    }
}

pub type AuditStorageResult<T> = Result<T, AuditStorageError>;

/// Raw row as stored. `details` stays TEXT here so hashes can be
/// recomputed over the exact bytes that were written.
#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    sequence: i64,
    timestamp: i64,
    action: AuditAction,
    resource_type: String,
    resource_id: String,
    operator_id: Option<String>,
    operator_name: Option<String>,
    details: String,
    prev_hash: String,
    curr_hash: String,
}

impl AuditRow {
    fn into_entry(self) -> AuditEntry {
        let details =
            serde_json::from_str(&self.details).unwrap_or(serde_json::Value::Null);
        AuditEntry {
            id: self.sequence as u64,
            timestamp: self.timestamp,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            operator_id: self.operator_id,
            operator_name: self.operator_name,
            details,
            prev_hash: self.prev_hash,
            curr_hash: self.curr_hash,
        }
    }
}

const AUDIT_COLUMNS: &str = "sequence, timestamp, action, resource_type, resource_id, \
     operator_id, operator_name, details, prev_hash, curr_hash";

/// Audit storage backed by the shared SQLite pool
#[derive(Clone)]
pub struct AuditStorage {
    pool: SqlitePool,
    /// Serializes appends; sequence assignment and hash linking depend on
    /// reading the previous row before inserting the next.
    append_lock: Arc<Mutex<()>>,
}

impl AuditStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Append an entry, linking it to the current chain head
    pub async fn append(
        &self,
        action: AuditAction,
        resource_type: &str,
        resource_id: &str,
        operator_id: Option<&str>,
        operator_name: Option<&str>,
        details: &serde_json::Value,
    ) -> AuditStorageResult<AuditEntry> {
        let _guard = self.append_lock.lock().await;

        let head: Option<(i64, String)> = sqlx::query_as(
            "SELECT sequence, curr_hash FROM audit_log ORDER BY sequence DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let (sequence, prev_hash) = match head {
            Some((seq, hash)) => (seq + 1, hash),
            None => (1, GENESIS_HASH.to_string()),
        };

        let timestamp = now_millis();
        // The stored TEXT is the hashed representation; parsing it back
        // yields the same bytes on verification.
        let details_json = serde_json::to_string(details)?;
        let curr_hash = compute_audit_hash(
            &prev_hash,
            sequence as u64,
            timestamp,
            &action,
            resource_type,
            resource_id,
            operator_id,
            operator_name,
            &details_json,
        )?;

        sqlx::query(
            "INSERT INTO audit_log (sequence, timestamp, action, resource_type, resource_id, \
             operator_id, operator_name, details, prev_hash, curr_hash) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(sequence)
        .bind(timestamp)
        .bind(action)
        .bind(resource_type)
        .bind(resource_id)
        .bind(operator_id)
        .bind(operator_name)
        .bind(&details_json)
        .bind(&prev_hash)
        .bind(&curr_hash)
        .execute(&self.pool)
        .await?;

        Ok(AuditEntry {
            id: sequence as u64,
            timestamp,
            action,
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            operator_id: operator_id.map(str::to_string),
            operator_name: operator_name.map(str::to_string),
            details: details.clone(),
            prev_hash,
            curr_hash,
        })
    }

    /// Query entries, newest first, with a total count for paging
    pub async fn query(&self, query: &AuditQuery) -> AuditStorageResult<(Vec<AuditEntry>, u64)> {
        let mut conditions: Vec<&str> = Vec::new();
        if query.from.is_some() {
            conditions.push("timestamp >= ?");
        }
        if query.to.is_some() {
            conditions.push("timestamp <= ?");
        }
        if query.action.is_some() {
            conditions.push("action = ?");
        }
        if query.operator_id.is_some() {
            conditions.push("operator_id = ?");
        }
        if query.resource_type.is_some() {
            conditions.push("resource_type = ?");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM audit_log{where_clause}");
        let select_sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_log{where_clause} \
             ORDER BY sequence DESC LIMIT ? OFFSET ?"
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut select_query = sqlx::query_as::<_, AuditRow>(&select_sql);

        if let Some(from) = query.from {
            count_query = count_query.bind(from);
            select_query = select_query.bind(from);
        }
        if let Some(to) = query.to {
            count_query = count_query.bind(to);
            select_query = select_query.bind(to);
        }
        if let Some(action) = query.action {
            count_query = count_query.bind(action);
            select_query = select_query.bind(action);
        }
        if let Some(operator_id) = &query.operator_id {
            count_query = count_query.bind(operator_id);
            select_query = select_query.bind(operator_id);
        }
        if let Some(resource_type) = &query.resource_type {
            count_query = count_query.bind(resource_type);
            select_query = select_query.bind(resource_type);
        }

        let total = count_query.fetch_one(&self.pool).await?;
        let rows = select_query
            .bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok((
            rows.into_iter().map(AuditRow::into_entry).collect(),
            total as u64,
        ))
    }

    /// Most recent entries (startup diagnostics, admin dashboard)
    pub async fn query_last(&self, count: usize) -> AuditStorageResult<Vec<AuditEntry>> {
        let sql =
            format!("SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY sequence DESC LIMIT ?");
        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(count as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(AuditRow::into_entry).collect())
    }

    /// Walk the whole chain and recompute every hash.
    ///
    /// Three kinds of break are reported:
    /// - "gap": a sequence number is missing
    /// - "link": an entry's prev_hash does not match its predecessor
    /// - "content": an entry's stored fields no longer produce curr_hash
    pub async fn verify_chain(&self) -> AuditStorageResult<AuditChainVerification> {
        let sql = format!("SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY sequence ASC");
        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let mut breaks = Vec::new();
        let mut head: Option<(i64, String)> = None;

        for row in &rows {
            match &head {
                None => {
                    if row.sequence != 1 {
                        breaks.push(AuditChainBreak {
                            sequence: row.sequence as u64,
                            kind: "gap".to_string(),
                            expected: "1".to_string(),
                            actual: row.sequence.to_string(),
                        });
                    } else if row.prev_hash != GENESIS_HASH {
                        breaks.push(AuditChainBreak {
                            sequence: row.sequence as u64,
                            kind: "link".to_string(),
                            expected: GENESIS_HASH.to_string(),
                            actual: row.prev_hash.clone(),
                        });
                    }
                }
                Some((prev_seq, prev_hash)) => {
                    if row.sequence != prev_seq + 1 {
                        breaks.push(AuditChainBreak {
                            sequence: row.sequence as u64,
                            kind: "gap".to_string(),
                            expected: (prev_seq + 1).to_string(),
                            actual: row.sequence.to_string(),
                        });
                    } else if row.prev_hash != *prev_hash {
                        breaks.push(AuditChainBreak {
                            sequence: row.sequence as u64,
                            kind: "link".to_string(),
                            expected: prev_hash.clone(),
                            actual: row.prev_hash.clone(),
                        });
                    }
                }
            }

            let recomputed = compute_audit_hash(
                &row.prev_hash,
                row.sequence as u64,
                row.timestamp,
                &row.action,
                &row.resource_type,
                &row.resource_id,
                row.operator_id.as_deref(),
                row.operator_name.as_deref(),
                &row.details,
            )?;
            if recomputed != row.curr_hash {
                breaks.push(AuditChainBreak {
                    sequence: row.sequence as u64,
                    kind: "content".to_string(),
                    expected: recomputed,
                    actual: row.curr_hash.clone(),
                });
            }

            head = Some((row.sequence, row.curr_hash.clone()));
        }

        Ok(AuditChainVerification {
            total_entries: rows.len() as u64,
            chain_intact: breaks.is_empty(),
            breaks,
        })
    }
}

/// SHA256 over all entry fields plus the previous hash.
///
/// Fields are fed in a fixed order with NUL separators; integers as
/// little-endian fixed width so the representation is unambiguous.
#[allow(clippy::too_many_arguments)]
fn compute_audit_hash(
    prev_hash: &str,
    sequence: u64,
    timestamp: i64,
    action: &AuditAction,
    resource_type: &str,
    resource_id: &str,
    operator_id: Option<&str>,
    operator_name: Option<&str>,
    details_json: &str,
) -> Result<String, serde_json::Error> {
    let mut hasher = Sha256::new();

    hasher.update(prev_hash.as_bytes());
    hasher.update([0u8]);
    hasher.update(sequence.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(timestamp.to_le_bytes());
    hasher.update([0u8]);

    let action_str = serde_json::to_string(action)?;
    hasher.update(action_str.as_bytes());
    hasher.update([0u8]);

    hasher.update(resource_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(resource_id.as_bytes());
    hasher.update([0u8]);

    hash_optional(&mut hasher, operator_id);
    hash_optional(&mut hasher, operator_name);

    hasher.update(details_json.as_bytes());

    Ok(hex::encode(hasher.finalize()))
}

/// Option fields get a presence tag so None and Some("") hash differently
fn hash_optional(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            hasher.update(v.as_bytes());
        }
        None => hasher.update([0u8]),
    }
    hasher.update([0u8]);
}
