//! Server state
//!
//! Shared handle cloned into every handler. All resources are owned here
//! and injected through axum state; nothing is process-global, so tests
//! can build isolated states side by side.

use std::sync::{Arc, Mutex};

use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::audit::{AuditLogRequest, AuditService, AuditWorker};
use crate::auth::JwtService;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::Config;
use crate::db::models::User;
use crate::db::repository;
use crate::db::DbService;
use crate::scheduler::{JobScheduler, SchedulerWorker};
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub jwt_service: Arc<JwtService>,
    pub audit_service: Arc<AuditService>,
    pub scheduler: JobScheduler,
    /// Receiver parked here between initialize() and start_background_tasks()
    audit_rx: Arc<Mutex<Option<mpsc::Receiver<AuditLogRequest>>>>,
}

impl ServerState {
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        // 1. Database (runs migrations)
        let db_service = DbService::new(&config.db_path()).await?;
        let pool = db_service.pool;

        // 2. Services
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));
        let (audit_service, audit_rx) =
            AuditService::new(pool.clone(), config.audit_buffer_size);
        let scheduler = JobScheduler::new(pool.clone());

        // 3. Bootstrap admin account
        let password_hash = User::hash_password(&config.admin_password)
            .map_err(|e| AppError::internal(format!("Failed to hash admin password: {e}")))?;
        repository::user::ensure_admin(&pool, &config.admin_username, &password_hash).await?;

        Ok(Self {
            config: Arc::new(config.clone()),
            pool,
            jwt_service,
            audit_service,
            scheduler,
            audit_rx: Arc::new(Mutex::new(Some(audit_rx))),
        })
    }

    /// Register the audit writer and job scheduler. Idempotent: the audit
    /// receiver can only be taken once.
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let audit_rx = self.audit_rx.lock().ok().and_then(|mut slot| slot.take());
        match audit_rx {
            Some(rx) => {
                let worker = AuditWorker::new(self.audit_service.storage().clone());
                tasks.spawn(
                    "audit_worker",
                    TaskKind::Worker,
                    worker.run(rx, tasks.shutdown_token()),
                );
            }
            None => {
                tracing::warn!("Audit worker already started, skipping");
            }
        }

        let scheduler_worker = SchedulerWorker::new(
            self.pool.clone(),
            self.audit_service.clone(),
            std::time::Duration::from_secs(self.config.scheduler_poll_secs),
            tasks.shutdown_token(),
        );
        tasks.spawn(
            "job_scheduler",
            TaskKind::Periodic,
            scheduler_worker.run(),
        );
    }

    pub fn get_jwt_service(&self) -> Arc<JwtService> {
        self.jwt_service.clone()
    }
}
