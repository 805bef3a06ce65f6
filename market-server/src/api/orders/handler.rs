//! Orders API Handlers

use axum::{
    Json,
    extract::{Extension, Path, State},
};
use serde::{Deserialize, Serialize};

use crate::audit::AuditAction;
use crate::audit_log;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Order, OrderWithTimeline, Payout, ShipmentStatus};
use crate::db::repository::payout::ReleaseOutcome;
use crate::db::repository::{order, payout};
use crate::utils::{AppError, AppResponse, AppResult, ok};

#[derive(Debug, Deserialize)]
pub struct ShipmentUpdateRequest {
    pub shipment_status: ShipmentStatus,
}

/// Shipment update result; `payout` is present once the order is delivered
#[derive(Serialize)]
pub struct ShipmentUpdateResponse {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<Payout>,
}

/// GET /api/orders/{id} - order with its timeline, visible to its parties
pub async fn get_by_id(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<OrderWithTimeline>>> {
    let order = find_for_party(&state, &id, &current_user).await?;
    let timeline = order::find_events(&state.pool, &order.id).await?;

    Ok(ok(OrderWithTimeline { order, timeline }))
}

/// POST /api/orders/{id}/shipment - record a shipment status change (seller)
///
/// The transition itself is unconditional; carrier webhooks are trusted to
/// deliver statuses in order. Reaching DELIVERED releases the escrow payout,
/// and the release is idempotent, so a duplicate DELIVERED notification
/// cannot pay the seller twice.
pub async fn update_shipment(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<ShipmentUpdateRequest>,
) -> AppResult<Json<AppResponse<ShipmentUpdateResponse>>> {
    let existing = find_for_party(&state, &id, &current_user).await?;
    if existing.seller_id != current_user.id && !current_user.is_admin() {
        return Err(AppError::forbidden(
            "Only the seller can update the shipment",
        ));
    }

    let order = order::update_shipment(&state.pool, &id, payload.shipment_status).await?;

    audit_log!(
        state.audit_service,
        AuditAction::ShipmentUpdated,
        "order", &order.id,
        operator_id = Some(current_user.id.clone()),
        operator_name = Some(current_user.username.clone()),
        details = serde_json::json!({ "shipment_status": order.shipment_status })
    );

    let payout = if payload.shipment_status == ShipmentStatus::Delivered {
        match payout::release(&state.pool, &order.id).await? {
            ReleaseOutcome::Released(payout) => {
                audit_log!(
                    state.audit_service,
                    AuditAction::PayoutReleased,
                    "payout", &payout.order_id,
                    operator_id = Some(current_user.id.clone()),
                    operator_name = Some(current_user.username.clone()),
                    details = serde_json::json!({
                        "transfer_id": payout.transfer_id,
                        "amount": payout.amount,
                    })
                );
                Some(payout)
            }
            ReleaseOutcome::AlreadyReleased(payout) => Some(payout),
        }
    } else {
        None
    };

    // The release completed the order; reflect that in the response
    let order = if payout.is_some() {
        order::find_by_id(&state.pool, &id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?
    } else {
        order
    };

    Ok(ok(ShipmentUpdateResponse { order, payout }))
}

/// Load an order and check the caller is the buyer, the seller, or admin
async fn find_for_party(
    state: &ServerState,
    order_id: &str,
    user: &CurrentUser,
) -> AppResult<Order> {
    let order = order::find_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

    if order.buyer_id != user.id && order.seller_id != user.id && !user.is_admin() {
        return Err(AppError::forbidden("Not a party to this order"));
    }

    Ok(order)
}
