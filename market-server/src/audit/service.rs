//! Audit service
//!
//! Producer side of the audit pipeline. Handlers call [`AuditService::log`],
//! which queues the entry on a bounded channel; the worker owns the writes
//! so request handling never waits on the chain lock. `log_sync` bypasses
//! the channel for lifecycle entries written before the worker starts or
//! after it stops.

use super::storage::{AuditStorage, AuditStorageResult};
use super::types::{
    AuditAction, AuditChainVerification, AuditEntry, AuditListResponse, AuditQuery,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Queued write, moved through the channel to the worker
#[derive(Debug)]
pub struct AuditLogRequest {
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: String,
    pub operator_id: Option<String>,
    pub operator_name: Option<String>,
    pub details: serde_json::Value,
}

pub struct AuditService {
    storage: AuditStorage,
    tx: mpsc::Sender<AuditLogRequest>,
}

impl AuditService {
    /// Create the service plus the receiver the worker will consume
    pub fn new(
        pool: SqlitePool,
        buffer_size: usize,
    ) -> (Arc<Self>, mpsc::Receiver<AuditLogRequest>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        let service = Arc::new(Self {
            storage: AuditStorage::new(pool),
            tx,
        });
        (service, rx)
    }

    pub fn storage(&self) -> &AuditStorage {
        &self.storage
    }

    /// Queue an audit entry.
    ///
    /// Blocks when the channel is full instead of dropping entries. A send
    /// error means the worker is gone; the entry is reported and lost.
    pub async fn log(
        &self,
        action: AuditAction,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        operator_id: Option<String>,
        operator_name: Option<String>,
        details: serde_json::Value,
    ) {
        let request = AuditLogRequest {
            action,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            operator_id,
            operator_name,
            details,
        };

        if let Err(err) = self.tx.send(request).await {
            tracing::error!("Audit worker unavailable, entry dropped: {}", err.0.action);
        }
    }

    /// Write an entry directly, skipping the channel
    pub async fn log_sync(
        &self,
        action: AuditAction,
        resource_type: &str,
        resource_id: &str,
        operator_id: Option<&str>,
        operator_name: Option<&str>,
        details: &serde_json::Value,
    ) -> AuditStorageResult<AuditEntry> {
        self.storage
            .append(
                action,
                resource_type,
                resource_id,
                operator_id,
                operator_name,
                details,
            )
            .await
    }

    /// Record server startup
    pub async fn on_startup(&self) -> AuditStorageResult<()> {
        self.log_sync(
            AuditAction::SystemStartup,
            "system",
            "server",
            None,
            None,
            &serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }),
        )
        .await?;
        Ok(())
    }

    /// Record clean shutdown
    pub async fn on_shutdown(&self) -> AuditStorageResult<()> {
        self.log_sync(
            AuditAction::SystemShutdown,
            "system",
            "server",
            None,
            None,
            &serde_json::json!({}),
        )
        .await?;
        Ok(())
    }

    pub async fn query(&self, query: &AuditQuery) -> AuditStorageResult<AuditListResponse> {
        let (items, total) = self.storage.query(query).await?;
        Ok(AuditListResponse { items, total })
    }

    pub async fn query_last(&self, count: usize) -> AuditStorageResult<Vec<AuditEntry>> {
        self.storage.query_last(count).await
    }

    pub async fn verify_chain(&self) -> AuditStorageResult<AuditChainVerification> {
        self.storage.verify_chain().await
    }
}
