//! Offers API module (price negotiation)

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/offers", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/accept", post(handler::accept))
        .route("/{id}/counter", post(handler::counter))
        .route("/{id}/expire", post(handler::expire))
        .route("/{id}/reject", post(handler::reject))
}
