//! Market Server - marketplace backend for offer negotiation and escrow payouts
//!
//! # Architecture
//!
//! ```text
//! market-server/src/
//! ├── core/          # Config, state, server bootstrap
//! ├── auth/          # JWT authentication, TOTP MFA, middleware
//! ├── api/           # HTTP routes and handlers
//! ├── db/            # SQLite pool, models, repositories
//! ├── pricing/       # Financial breakdown calculator
//! ├── audit/         # Tamper-evident audit trail
//! ├── scheduler/     # Deferred follow-up jobs (reminders, expiries)
//! └── utils/         # Errors, logging, validation
//! ```

pub mod api;
pub mod audit;
pub mod auth;
pub mod core;
pub mod db;
pub mod pricing;
pub mod scheduler;
pub mod utils;

// Re-export common types
pub use auth::{CurrentUser, JwtService};
pub use crate::core::{Config, Server, ServerState, setup_environment};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Record an audit entry through the state's audit service.
///
/// Expands to an `.await`ed send on the audit channel; the write itself is
/// best-effort and never fails the calling handler.
#[macro_export]
macro_rules! audit_log {
    ($service:expr, $action:expr, $rtype:expr, $rid:expr, operator_id = $oid:expr, operator_name = $oname:expr, details = $details:expr) => {
        $service
            .log($action, $rtype, $rid, $oid, $oname, $details)
            .await
    };
}

// Security logging macro - supports tracing format specifiers
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

pub fn print_banner() {
    println!(
        r#"
   __  ___           __       __
  /  |/  /___ ______/ /_____ / /_
 / /|_/ / __ `/ ___/ //_/ _ \/ __/
/ /  / / /_/ / /  / ,< /  __/ /_
/_/  /_/\__,_/_/  /_/|_|\___/\__/
   _____
  / ___/___  ______   _____  _____
  \__ \/ _ \/ ___/ | / / _ \/ ___/
 ___/ /  __/ /   | |/ /  __/ /
/____/\___/_/    |___/\___/_/
    "#
    );
}
