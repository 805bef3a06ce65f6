//! Reviews API module (buyer reviews of delivered orders)

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::require_role;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/reviews", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/pending", get(handler::pending))
        .route_layer(middleware::from_fn(require_role("buyer")))
}
