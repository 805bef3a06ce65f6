//! Offers API Handlers

use axum::{
    Json,
    extract::{Extension, Path, State},
};
use serde::{Deserialize, Serialize};

use crate::audit::AuditAction;
use crate::audit_log;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Offer, OfferCreate, Order};
use crate::db::repository::offer::ExpireOutcome;
use crate::db::repository::{listing, offer};
use crate::pricing::calculate_breakdown;
use crate::utils::time::{days_to_millis, now_millis};
use crate::utils::validation::{validate_amount, validate_future_millis};
use crate::utils::{AppError, AppResponse, AppResult, ok, ok_with_message};

#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub listing_id: String,
    pub amount: f64,
    /// Unix millis; omit for an offer without a deadline
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CounterOfferRequest {
    pub amount: f64,
    /// New deadline; omit to keep the current one
    pub expires_at: Option<i64>,
}

/// Acceptance opens the order; both come back together
#[derive(Serialize)]
pub struct AcceptOfferResponse {
    pub offer: Offer,
    pub order: Order,
}

/// POST /api/offers - make an offer on an active listing (buyer)
pub async fn create(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreateOfferRequest>,
) -> AppResult<Json<AppResponse<Offer>>> {
    if !current_user.is_buyer() && !current_user.is_admin() {
        return Err(AppError::forbidden("Requires buyer role"));
    }

    validate_amount(payload.amount, "amount")?;
    validate_future_millis(payload.expires_at, now_millis(), "expires_at")?;

    let listing = listing::find_by_id(&state.pool, &payload.listing_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Listing {} not found", payload.listing_id)))?;

    if !listing.is_active() {
        return Err(AppError::business_rule("Listing is not active"));
    }
    if listing.seller_id == current_user.id {
        return Err(AppError::business_rule(
            "Cannot make an offer on your own listing",
        ));
    }

    let offer = offer::create(
        &state.pool,
        OfferCreate {
            listing_id: listing.id,
            buyer_id: current_user.id,
            seller_id: listing.seller_id,
            amount: payload.amount,
            expires_at: payload.expires_at,
        },
    )
    .await?;

    Ok(ok(offer))
}

/// GET /api/offers/{id} - single offer, visible to its parties
pub async fn get_by_id(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Offer>>> {
    let offer = find_for_party(&state, &id, &current_user).await?;
    Ok(ok(offer))
}

/// POST /api/offers/{id}/accept - accept at the current amount (seller)
///
/// Opens the order with the financial breakdown computed from the accepted
/// amount, and schedules the review reminder.
pub async fn accept(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<AcceptOfferResponse>>> {
    let existing = find_for_party(&state, &id, &current_user).await?;
    require_seller_party(&existing, &current_user, "accept")?;

    let now = now_millis();
    if existing.is_negotiable() && existing.is_past_expiry(now) {
        lazy_expire(&state, &existing, &current_user).await?;
        return Err(AppError::business_rule("Offer has expired"));
    }
    if !existing.is_negotiable() {
        return Err(AppError::business_rule(format!(
            "Offer is {}, no longer negotiable",
            existing.status
        )));
    }

    let breakdown = calculate_breakdown(existing.amount, &state.config.breakdown);
    let (offer, order) = offer::accept(&state.pool, &id, existing.amount, &breakdown).await?;

    // Review reminder fires a fixed number of days after acceptance
    let fire_at = now + days_to_millis(state.config.review_reminder_days);
    state
        .scheduler
        .schedule_review_reminder(&order.id, fire_at)
        .await?;

    audit_log!(
        state.audit_service,
        AuditAction::OfferAccepted,
        "offer", &offer.id,
        operator_id = Some(current_user.id.clone()),
        operator_name = Some(current_user.username.clone()),
        details = serde_json::json!({
            "order_id": order.id,
            "amount": order.amount,
            "application_fee_amount": order.application_fee_amount,
            "tax_amount": order.tax_amount,
            "escrow_amount": order.escrow_amount,
        })
    );

    Ok(ok(AcceptOfferResponse { offer, order }))
}

/// POST /api/offers/{id}/counter - counter an open offer (seller)
pub async fn counter(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<CounterOfferRequest>,
) -> AppResult<Json<AppResponse<Offer>>> {
    let existing = find_for_party(&state, &id, &current_user).await?;
    require_seller_party(&existing, &current_user, "counter")?;

    let now = now_millis();
    validate_amount(payload.amount, "amount")?;
    validate_future_millis(payload.expires_at, now, "expires_at")?;

    if existing.is_negotiable() && existing.is_past_expiry(now) {
        lazy_expire(&state, &existing, &current_user).await?;
        return Err(AppError::business_rule("Offer has expired"));
    }
    // A countered offer awaits the buyer; only OPEN can be countered
    if existing.status != "OPEN" {
        return Err(AppError::business_rule(format!(
            "Offer is {}, only an open offer can be countered",
            existing.status
        )));
    }

    let offer = offer::counter(&state.pool, &id, payload.amount, payload.expires_at).await?;

    // The deadline is part of the job ID: countering to a new deadline
    // schedules a fresh check and the stale one becomes a no-op.
    if let Some(deadline) = offer.expires_at {
        state.scheduler.schedule_offer_expiry(&offer.id, deadline).await?;
    }

    audit_log!(
        state.audit_service,
        AuditAction::OfferCountered,
        "offer", &offer.id,
        operator_id = Some(current_user.id.clone()),
        operator_name = Some(current_user.username.clone()),
        details = serde_json::json!({
            "amount": offer.amount,
            "expires_at": offer.expires_at,
        })
    );

    Ok(ok(offer))
}

/// POST /api/offers/{id}/reject - reject a negotiable offer (seller)
pub async fn reject(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Offer>>> {
    let existing = find_for_party(&state, &id, &current_user).await?;
    require_seller_party(&existing, &current_user, "reject")?;

    let now = now_millis();
    if existing.is_negotiable() && existing.is_past_expiry(now) {
        lazy_expire(&state, &existing, &current_user).await?;
        return Err(AppError::business_rule("Offer has expired"));
    }
    if !existing.is_negotiable() {
        return Err(AppError::business_rule(format!(
            "Offer is {}, no longer negotiable",
            existing.status
        )));
    }

    let offer = offer::reject(&state.pool, &id).await?;

    audit_log!(
        state.audit_service,
        AuditAction::OfferRejected,
        "offer", &offer.id,
        operator_id = Some(current_user.id.clone()),
        operator_name = Some(current_user.username.clone()),
        details = serde_json::json!({ "listing_id": offer.listing_id })
    );

    Ok(ok(offer))
}

/// POST /api/offers/{id}/expire - expire a lapsed offer (either party)
///
/// Idempotent: expiring an already-expired offer succeeds without effect.
pub async fn expire(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Offer>>> {
    // Party check happens before any transition
    find_for_party(&state, &id, &current_user).await?;

    match offer::expire(&state.pool, &id).await? {
        ExpireOutcome::Expired(offer) => {
            audit_log!(
                state.audit_service,
                AuditAction::OfferExpired,
                "offer", &offer.id,
                operator_id = Some(current_user.id.clone()),
                operator_name = Some(current_user.username.clone()),
                details = serde_json::json!({
                    "listing_id": offer.listing_id,
                    "deadline": offer.expires_at,
                })
            );
            Ok(ok_with_message(offer, "Offer expired"))
        }
        ExpireOutcome::AlreadyExpired(offer) => {
            Ok(ok_with_message(offer, "Offer was already expired"))
        }
        ExpireOutcome::NotDue(_) => {
            Err(AppError::business_rule("Offer deadline has not passed"))
        }
        ExpireOutcome::NotExpirable(offer) => Err(AppError::business_rule(format!(
            "Offer is {}, cannot expire",
            offer.status
        ))),
    }
}

/// Load an offer and check the caller is the buyer, the seller, or admin
async fn find_for_party(
    state: &ServerState,
    offer_id: &str,
    user: &CurrentUser,
) -> AppResult<Offer> {
    let offer = offer::find_by_id(&state.pool, offer_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Offer {offer_id} not found")))?;

    if offer.buyer_id != user.id && offer.seller_id != user.id && !user.is_admin() {
        return Err(AppError::forbidden("Not a party to this offer"));
    }

    Ok(offer)
}

/// Accept, counter and reject belong to the selling side
fn require_seller_party(offer: &Offer, user: &CurrentUser, action: &str) -> AppResult<()> {
    if offer.seller_id != user.id && !user.is_admin() {
        return Err(AppError::forbidden(format!(
            "Only the seller can {action} an offer"
        )));
    }
    Ok(())
}

/// Expire an offer found lapsed while handling another action
async fn lazy_expire(
    state: &ServerState,
    offer: &Offer,
    operator: &CurrentUser,
) -> AppResult<()> {
    if let ExpireOutcome::Expired(expired) = offer::expire(&state.pool, &offer.id).await? {
        audit_log!(
            state.audit_service,
            AuditAction::OfferExpired,
            "offer", &expired.id,
            operator_id = Some(operator.id.clone()),
            operator_name = Some(operator.username.clone()),
            details = serde_json::json!({
                "listing_id": expired.listing_id,
                "deadline": expired.expires_at,
            })
        );
    }
    Ok(())
}
