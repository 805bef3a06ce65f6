//! Listings API Handlers

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
};
use serde::Deserialize;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Listing, ListingCreate};
use crate::db::repository::listing;
use crate::utils::validation::validate_amount;
use crate::utils::{AppError, AppResponse, AppResult, ok};

/// Query params for browsing the catalog
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i32,
    #[serde(default)]
    pub offset: i32,
}

fn default_limit() -> i32 {
    20
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateListingRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    pub price: f64,
}

/// GET /api/listings - browse active listings
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<AppResponse<Vec<Listing>>>> {
    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    let listings = listing::find_active(&state.pool, limit, offset).await?;

    Ok(ok(listings))
}

/// GET /api/listings/{id} - single listing
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Listing>>> {
    let listing = listing::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Listing {id} not found")))?;

    Ok(ok(listing))
}

/// POST /api/listings - publish a listing (seller)
pub async fn create(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreateListingRequest>,
) -> AppResult<Json<AppResponse<Listing>>> {
    if !current_user.is_seller() && !current_user.is_admin() {
        return Err(AppError::forbidden("Requires seller role"));
    }

    payload.validate()?;
    validate_amount(payload.price, "price")?;

    let listing = listing::create(
        &state.pool,
        ListingCreate {
            seller_id: current_user.id,
            title: payload.title,
            description: payload.description,
            price: payload.price,
        },
    )
    .await?;

    Ok(ok(listing))
}
