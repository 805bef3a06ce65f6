//! Admin API module (moderation, policy publishing, audit log)

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/admin", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/policies", post(handler::publish_policy))
        .route("/users/{id}/suspend", post(handler::suspend_user))
        .route("/users/{id}/reinstate", post(handler::reinstate_user))
        .route("/listings/{id}/remove", post(handler::remove_listing))
        .route("/audit-log", get(handler::list_audit_log))
        .route("/audit-log/verify", get(handler::verify_audit_chain))
        .route_layer(middleware::from_fn(require_admin))
}
