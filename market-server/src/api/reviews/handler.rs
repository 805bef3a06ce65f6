//! Reviews API Handlers

use axum::{
    Json,
    extract::{Extension, State},
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Order, Review, ReviewCreate, ShipmentStatus};
use crate::db::repository::{order, review};
use crate::utils::{AppError, AppResponse, AppResult, ok};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub order_id: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be 1-5"))]
    pub rating: i64,
    #[validate(length(max = 500, message = "Comment must be at most 500 characters"))]
    pub comment: Option<String>,
}

/// GET /api/reviews/pending - delivered orders awaiting my review
pub async fn pending(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<AppResponse<Vec<Order>>>> {
    let orders = order::pending_reviews(&state.pool, &current_user.id).await?;
    Ok(ok(orders))
}

/// POST /api/reviews - review a delivered order (one per order)
pub async fn create(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<Json<AppResponse<Review>>> {
    payload.validate()?;

    let order = order::find_by_id(&state.pool, &payload.order_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {} not found", payload.order_id)))?;

    if order.buyer_id != current_user.id {
        return Err(AppError::forbidden("Only the buyer can review this order"));
    }
    if order.shipment_status != ShipmentStatus::Delivered.as_str() {
        return Err(AppError::business_rule(
            "Order has not been delivered yet",
        ));
    }

    let review = review::create(
        &state.pool,
        ReviewCreate {
            order_id: order.id,
            reviewer_id: current_user.id,
            rating: payload.rating,
            comment: payload.comment,
        },
    )
    .await?;

    Ok(ok(review))
}
