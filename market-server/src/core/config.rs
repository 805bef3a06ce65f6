//! Server configuration
//!
//! Everything comes from environment variables with development-friendly
//! defaults. `JwtConfig` handles its own secret loading.

use crate::auth::JwtConfig;
use crate::pricing::BreakdownConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the database file and logs
    pub work_dir: String,
    pub http_port: u16,
    pub environment: String,
    pub jwt: JwtConfig,

    /// Fee/tax/escrow percentages applied when an offer is accepted
    pub breakdown: BreakdownConfig,

    /// Days after delivery before the review reminder fires
    pub review_reminder_days: i64,
    /// Scheduler poll cadence in seconds
    pub scheduler_poll_secs: u64,
    /// Audit channel capacity
    pub audit_buffer_size: usize,

    /// Bootstrap admin account, created on startup if missing
    pub admin_username: String,
    pub admin_password: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            jwt: JwtConfig::default(),

            breakdown: BreakdownConfig {
                fee_percent: percent_env("FEE_PERCENT", 10.0),
                tax_percent: percent_env("TAX_PERCENT", 5.0),
                // Absent means the whole post-fee-tax remainder is escrowed
                escrow_percent: std::env::var("ESCROW_PERCENT")
                    .ok()
                    .and_then(|p| p.parse::<f64>().ok())
                    .filter(|p| (0.0..=100.0).contains(p)),
            },

            review_reminder_days: std::env::var("REVIEW_REMINDER_DAYS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(7),
            scheduler_poll_secs: std::env::var("SCHEDULER_POLL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30),
            audit_buffer_size: std::env::var("AUDIT_BUFFER_SIZE")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(256),

            admin_username: std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".into()),
            admin_password: std::env::var("ADMIN_PASSWORD")
                .unwrap_or_else(|_| "admin-change-me".into()),
        }
    }

    /// Config with test-friendly overrides
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// Database file path under the work directory
    pub fn db_path(&self) -> String {
        format!("{}/market.db", self.work_dir)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Percentage env var, clamped to valid range by falling back to the default
fn percent_env(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|p| p.parse::<f64>().ok())
        .filter(|p| (0.0..=100.0).contains(p))
        .unwrap_or(default)
}
