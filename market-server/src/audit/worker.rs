//! Audit worker
//!
//! Single consumer of the audit channel. Runs until the channel closes or
//! shutdown is signalled; on shutdown the channel is closed and drained
//! first, so queued entries are never lost to a graceful stop.

use super::service::AuditLogRequest;
use super::storage::AuditStorage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct AuditWorker {
    storage: AuditStorage,
}

impl AuditWorker {
    pub fn new(storage: AuditStorage) -> Self {
        Self { storage }
    }

    pub async fn run(self, mut rx: mpsc::Receiver<AuditLogRequest>, shutdown: CancellationToken) {
        info!("Audit worker started");

        loop {
            tokio::select! {
                request = rx.recv() => {
                    match request {
                        Some(request) => self.write(request).await,
                        None => break,
                    }
                }
                _ = shutdown.cancelled() => {
                    // Refuse new sends, then drain what is buffered
                    rx.close();
                    while let Some(request) = rx.recv().await {
                        self.write(request).await;
                    }
                    break;
                }
            }
        }

        info!("Audit worker stopped");
    }

    async fn write(&self, request: AuditLogRequest) {
        let result = self
            .storage
            .append(
                request.action,
                &request.resource_type,
                &request.resource_id,
                request.operator_id.as_deref(),
                request.operator_name.as_deref(),
                &request.details,
            )
            .await;

        match result {
            Ok(entry) => {
                debug!(
                    sequence = entry.id,
                    action = %entry.action,
                    resource = %format!("{}:{}", entry.resource_type, entry.resource_id),
                    "Audit entry written"
                );
            }
            Err(err) => {
                error!("Failed to write audit entry: {}", err);
            }
        }
    }
}
