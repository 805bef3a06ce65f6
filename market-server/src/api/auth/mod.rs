//! Auth API module (registration, login, MFA enrollment)

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/auth", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/register", post(handler::register))
        .route("/login", post(handler::login))
        .route("/me", get(handler::me))
        .route("/mfa/enroll", post(handler::enroll_mfa))
        .route("/mfa/confirm", post(handler::confirm_mfa))
}
