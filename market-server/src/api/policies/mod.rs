//! Policies API module (published policies and user consent)

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/policies", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/acceptances", get(handler::my_acceptances))
        .route("/{id}/accept", post(handler::accept))
}
