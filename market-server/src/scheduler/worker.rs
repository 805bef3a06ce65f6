//! Scheduler worker
//!
//! Polls the job table and dispatches due jobs. Jobs are claimed with a
//! status-guarded UPDATE before dispatch, so a job fires at most once
//! even if dispatch itself fails; offer expiry is idempotent anyway.

use super::JobScheduler;
use crate::audit::{AuditAction, AuditService};
use crate::db::repository::{self, offer::ExpireOutcome, RepoResult};
use crate::utils::time::now_millis;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Jobs processed per poll pass
const DUE_BATCH_LIMIT: i64 = 100;

pub struct SchedulerWorker {
    pool: SqlitePool,
    audit: Arc<AuditService>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl SchedulerWorker {
    pub fn new(
        pool: SqlitePool,
        audit: Arc<AuditService>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pool,
            audit,
            poll_interval,
            shutdown,
        }
    }

    /// Poll loop. The first interval tick fires immediately, which doubles
    /// as the startup catch-up for jobs that came due while the server was
    /// down.
    pub async fn run(self) {
        info!(
            "Scheduler worker started (poll every {}s)",
            self.poll_interval.as_secs()
        );

        let mut poll = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    match run_due_jobs(&self.pool, &self.audit, now_millis()).await {
                        Ok(0) => {}
                        Ok(n) => debug!("Dispatched {} scheduled job(s)", n),
                        Err(e) => error!("Scheduled job pass failed: {}", e),
                    }
                }
                _ = self.shutdown.cancelled() => {
                    info!("Scheduler worker received shutdown signal");
                    break;
                }
            }
        }

        info!("Scheduler worker stopped");
    }
}

/// Claim and dispatch every due job. Returns the number claimed.
pub async fn run_due_jobs(pool: &SqlitePool, audit: &AuditService, now: i64) -> RepoResult<usize> {
    let scheduler = JobScheduler::new(pool.clone());
    let due = scheduler.due_jobs(now, DUE_BATCH_LIMIT).await?;

    let mut dispatched = 0;
    for job in due {
        // Lost claim means another pass got there first
        if !scheduler.claim(&job.id, now).await? {
            continue;
        }
        dispatched += 1;

        match job.kind.as_str() {
            "offer_expiry" => dispatch_offer_expiry(pool, audit, &job.entity_id).await,
            "review_reminder" => dispatch_review_reminder(pool, &job.entity_id).await,
            other => {
                warn!(job_id = %job.id, "Unknown scheduled job kind: {}", other);
            }
        }
    }

    Ok(dispatched)
}

async fn dispatch_offer_expiry(pool: &SqlitePool, audit: &AuditService, offer_id: &str) {
    match repository::offer::expire(pool, offer_id).await {
        Ok(ExpireOutcome::Expired(offer)) => {
            info!(offer_id = %offer.id, listing_id = %offer.listing_id, "Offer expired");
            audit
                .log(
                    AuditAction::OfferExpired,
                    "offer",
                    offer.id.clone(),
                    None,
                    None,
                    serde_json::json!({
                        "listing_id": offer.listing_id,
                        "deadline": offer.expires_at,
                    }),
                )
                .await;
        }
        Ok(ExpireOutcome::AlreadyExpired(_)) => {}
        Ok(ExpireOutcome::NotDue(offer)) => {
            debug!(offer_id = %offer.id, expires_at = ?offer.expires_at, "Deadline moved, stale expiry check skipped");
        }
        Ok(ExpireOutcome::NotExpirable(offer)) => {
            debug!(offer_id = %offer.id, status = %offer.status, "Offer already resolved, expiry skipped");
        }
        Err(e) => {
            error!(offer_id = %offer_id, "Failed to expire offer: {}", e);
        }
    }
}

/// No mail subsystem; the reminder surface is a structured log line that
/// downstream notification tooling tails.
async fn dispatch_review_reminder(pool: &SqlitePool, order_id: &str) {
    match repository::review::find_by_order(pool, order_id).await {
        Ok(Some(_)) => {
            debug!(order_id = %order_id, "Order already reviewed, reminder skipped");
            return;
        }
        Ok(None) => {}
        Err(e) => {
            error!(order_id = %order_id, "Failed to check review state: {}", e);
            return;
        }
    }

    match repository::order::find_by_id(pool, order_id).await {
        Ok(Some(order)) => {
            info!(
                target: "notifications",
                order_id = %order.id,
                buyer_id = %order.buyer_id,
                listing_id = %order.listing_id,
                "Review reminder due"
            );
        }
        Ok(None) => {
            warn!(order_id = %order_id, "Review reminder for unknown order");
        }
        Err(e) => {
            error!(order_id = %order_id, "Failed to load order for reminder: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE scheduled_job (
                id         TEXT PRIMARY KEY,
                kind       TEXT NOT NULL,
                entity_id  TEXT NOT NULL,
                fire_at    INTEGER NOT NULL,
                status     TEXT NOT NULL DEFAULT 'PENDING',
                created_at INTEGER NOT NULL,
                fired_at   INTEGER
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE offer (
                id         TEXT PRIMARY KEY,
                listing_id TEXT NOT NULL,
                buyer_id   TEXT NOT NULL,
                seller_id  TEXT NOT NULL,
                amount     REAL NOT NULL,
                status     TEXT NOT NULL DEFAULT 'OPEN',
                expires_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE market_order (
                id                     TEXT PRIMARY KEY,
                offer_id               TEXT NOT NULL UNIQUE,
                listing_id             TEXT NOT NULL,
                buyer_id               TEXT NOT NULL,
                seller_id              TEXT NOT NULL,
                amount                 REAL NOT NULL,
                application_fee_amount REAL NOT NULL,
                tax_amount             REAL NOT NULL,
                escrow_amount          REAL NOT NULL,
                status                 TEXT NOT NULL DEFAULT 'ACTIVE',
                shipment_status        TEXT NOT NULL DEFAULT 'AWAITING_SHIPMENT',
                created_at             INTEGER NOT NULL,
                updated_at             INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE review (
                id          TEXT PRIMARY KEY,
                order_id    TEXT NOT NULL UNIQUE,
                reviewer_id TEXT NOT NULL,
                rating      INTEGER NOT NULL,
                comment     TEXT,
                created_at  INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    async fn seed_offer(pool: &SqlitePool, id: &str, status: &str, expires_at: Option<i64>) {
        sqlx::query(
            "INSERT INTO offer (id, listing_id, buyer_id, seller_id, amount, status, expires_at, created_at, updated_at) \
             VALUES (?1, 'l-1', 'b-1', 's-1', 50.0, ?2, ?3, 100, 100)",
        )
        .bind(id)
        .bind(status)
        .bind(expires_at)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn offer_status(pool: &SqlitePool, id: &str) -> String {
        sqlx::query_scalar("SELECT status FROM offer WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_due_expiry_job_expires_open_offer() {
        let pool = test_pool().await;
        seed_offer(&pool, "of-1", "OPEN", Some(1000)).await;
        let (audit, _audit_rx) = AuditService::new(pool.clone(), 16);

        let scheduler = JobScheduler::new(pool.clone());
        scheduler.schedule_offer_expiry("of-1", 1000).await.unwrap();

        let dispatched = run_due_jobs(&pool, &audit, 2000).await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(offer_status(&pool, "of-1").await, "EXPIRED");

        let fired_at: Option<i64> = sqlx::query_scalar(
            "SELECT fired_at FROM scheduled_job WHERE id = 'offer_expiry:offer:of-1:1000'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(fired_at, Some(2000));

        // Claimed jobs never fire twice
        let dispatched = run_due_jobs(&pool, &audit, 3000).await.unwrap();
        assert_eq!(dispatched, 0);
    }

    #[tokio::test]
    async fn test_expiry_job_leaves_resolved_offer_alone() {
        let pool = test_pool().await;
        seed_offer(&pool, "of-1", "ACCEPTED", Some(1000)).await;
        let (audit, _audit_rx) = AuditService::new(pool.clone(), 16);

        let scheduler = JobScheduler::new(pool.clone());
        scheduler.schedule_offer_expiry("of-1", 1000).await.unwrap();

        let dispatched = run_due_jobs(&pool, &audit, 2000).await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(offer_status(&pool, "of-1").await, "ACCEPTED");
    }

    #[tokio::test]
    async fn test_stale_expiry_check_spares_extended_offer() {
        let pool = test_pool().await;
        // Countered after the first check was scheduled: deadline now 9000
        seed_offer(&pool, "of-1", "COUNTERED", Some(9000)).await;
        let (audit, _audit_rx) = AuditService::new(pool.clone(), 16);

        let scheduler = JobScheduler::new(pool.clone());
        scheduler.schedule_offer_expiry("of-1", 1000).await.unwrap();

        let dispatched = run_due_jobs(&pool, &audit, 2000).await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(offer_status(&pool, "of-1").await, "COUNTERED");
    }

    #[tokio::test]
    async fn test_future_jobs_do_not_fire() {
        let pool = test_pool().await;
        seed_offer(&pool, "of-1", "OPEN", Some(9000)).await;
        let (audit, _audit_rx) = AuditService::new(pool.clone(), 16);

        let scheduler = JobScheduler::new(pool.clone());
        scheduler.schedule_offer_expiry("of-1", 9000).await.unwrap();

        let dispatched = run_due_jobs(&pool, &audit, 2000).await.unwrap();
        assert_eq!(dispatched, 0);
        assert_eq!(offer_status(&pool, "of-1").await, "OPEN");
    }

    #[tokio::test]
    async fn test_review_reminder_claims_job() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO market_order (id, offer_id, listing_id, buyer_id, seller_id, amount, \
             application_fee_amount, tax_amount, escrow_amount, status, shipment_status, created_at, updated_at) \
             VALUES ('ord-1', 'of-1', 'l-1', 'b-1', 's-1', 50.0, 5.0, 2.5, 38.25, 'COMPLETED', 'DELIVERED', 100, 100)",
        )
        .execute(&pool)
        .await
        .unwrap();
        let (audit, _audit_rx) = AuditService::new(pool.clone(), 16);

        let scheduler = JobScheduler::new(pool.clone());
        scheduler
            .schedule_review_reminder("ord-1", 1000)
            .await
            .unwrap();

        let dispatched = run_due_jobs(&pool, &audit, 2000).await.unwrap();
        assert_eq!(dispatched, 1);

        let status: String = sqlx::query_scalar(
            "SELECT status FROM scheduled_job WHERE id = 'review_reminder:order:ord-1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, "DONE");
    }
}
