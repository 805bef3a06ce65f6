//! Deferred follow-up jobs
//!
//! Durable one-shot jobs persisted in the `scheduled_job` table: offer
//! expiries and review reminders. Job IDs are deterministic, so
//! re-scheduling the same follow-up is a no-op, and rows survive
//! restarts. [`worker::SchedulerWorker`] polls for due jobs and
//! dispatches them.

pub mod worker;

pub use worker::SchedulerWorker;

use crate::db::repository::RepoResult;
use crate::utils::time::now_millis;
use sqlx::SqlitePool;

/// Job kinds the worker knows how to dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    OfferExpiry,
    ReviewReminder,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::OfferExpiry => "offer_expiry",
            JobKind::ReviewReminder => "review_reminder",
        }
    }
}

/// Persisted job row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduledJob {
    pub id: String,
    /// 'offer_expiry' | 'review_reminder'
    pub kind: String,
    /// Offer or order ID, depending on kind
    pub entity_id: String,
    /// When the job becomes due (Unix millis)
    pub fire_at: i64,
    /// 'PENDING' | 'DONE'
    pub status: String,
    pub created_at: i64,
    pub fired_at: Option<i64>,
}

/// Enqueue side of the job table, shared with handlers through the state
#[derive(Clone)]
pub struct JobScheduler {
    pool: SqlitePool,
}

impl JobScheduler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Schedule an expiry check for an offer. The deadline is part of the
    /// job ID, so countering with a new deadline schedules a new check
    /// while re-scheduling the same one is a no-op.
    pub async fn schedule_offer_expiry(&self, offer_id: &str, fire_at: i64) -> RepoResult<bool> {
        let id = format!("offer_expiry:offer:{offer_id}:{fire_at}");
        self.schedule(JobKind::OfferExpiry, id, offer_id, fire_at)
            .await
    }

    /// Schedule a review reminder for an order. Returns false if the
    /// reminder was already scheduled, whatever its fire time.
    pub async fn schedule_review_reminder(
        &self,
        order_id: &str,
        fire_at: i64,
    ) -> RepoResult<bool> {
        let id = format!("review_reminder:order:{order_id}");
        self.schedule(JobKind::ReviewReminder, id, order_id, fire_at)
            .await
    }

    async fn schedule(
        &self,
        kind: JobKind,
        id: String,
        entity_id: &str,
        fire_at: i64,
    ) -> RepoResult<bool> {
        // Deterministic ID makes INSERT OR IGNORE the dedupe mechanism
        let rows = sqlx::query(
            "INSERT OR IGNORE INTO scheduled_job (id, kind, entity_id, fire_at, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5)",
        )
        .bind(&id)
        .bind(kind.as_str())
        .bind(entity_id)
        .bind(fire_at)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(rows.rows_affected() > 0)
    }

    /// Pending jobs whose fire time has passed, oldest first
    pub async fn due_jobs(&self, now: i64, limit: i64) -> RepoResult<Vec<ScheduledJob>> {
        let jobs = sqlx::query_as::<_, ScheduledJob>(
            "SELECT id, kind, entity_id, fire_at, status, created_at, fired_at \
             FROM scheduled_job WHERE status = 'PENDING' AND fire_at <= ?1 \
             ORDER BY fire_at ASC LIMIT ?2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    /// Mark a job DONE. Returns false if another pass already claimed it.
    pub async fn claim(&self, job_id: &str, now: i64) -> RepoResult<bool> {
        let rows = sqlx::query(
            "UPDATE scheduled_job SET status = 'DONE', fired_at = ?1 \
             WHERE id = ?2 AND status = 'PENDING'",
        )
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(rows.rows_affected() > 0)
    }
}
