//! Core server assembly
//!
//! Configuration, shared state, the HTTP server lifecycle, and background
//! task management.

pub mod config;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};

use crate::utils::logger::init_logger_with_file;

/// One-time process setup: load `.env`, create the working directories,
/// and initialize logging. Call before anything that logs.
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into());
    std::fs::create_dir_all(&work_dir)?;

    let log_dir = std::env::var("LOG_DIR").ok();
    if let Some(dir) = &log_dir {
        std::fs::create_dir_all(dir)?;
    }

    init_logger_with_file(None, log_dir.as_deref());

    Ok(())
}
