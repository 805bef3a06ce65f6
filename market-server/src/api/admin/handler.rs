//! Admin API Handlers

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::audit::{AuditAction, AuditChainVerification, AuditListResponse, AuditQuery};
use crate::audit_log;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Listing, Policy, PolicyCreate, UserPublic, UserStatus};
use crate::db::repository::{listing, policy, user};
use crate::utils::{AppError, AppResponse, AppResult, ok};

#[derive(Debug, Deserialize, Validate)]
pub struct PublishPolicyRequest {
    #[validate(length(min = 1, max = 64, message = "Slug must be 1-64 characters"))]
    pub slug: String,
    #[validate(range(min = 1, message = "Version must be at least 1"))]
    pub version: i64,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Body must not be empty"))]
    pub body: String,
}

/// Removal response; counts the open offers that died with the listing
#[derive(Serialize)]
pub struct RemoveListingResponse {
    pub listing: Listing,
    pub expired_offers: u64,
}

/// POST /api/admin/policies - publish a policy version
///
/// Versions per slug must strictly increase; publishing an old version is
/// rejected.
pub async fn publish_policy(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<PublishPolicyRequest>,
) -> AppResult<Json<AppResponse<Policy>>> {
    payload.validate()?;

    let policy = policy::publish(
        &state.pool,
        PolicyCreate {
            slug: payload.slug,
            version: payload.version,
            title: payload.title,
            body: payload.body,
        },
    )
    .await?;

    audit_log!(
        state.audit_service,
        AuditAction::PolicyPublished,
        "policy", &policy.id,
        operator_id = Some(current_user.id.clone()),
        operator_name = Some(current_user.username.clone()),
        details = serde_json::json!({
            "slug": policy.slug,
            "version": policy.version,
        })
    );

    Ok(ok(policy))
}

/// POST /api/admin/users/{id}/suspend - lock an account out
pub async fn suspend_user(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<UserPublic>>> {
    let target = user::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;

    if target.role == "admin" {
        return Err(AppError::business_rule("Cannot suspend an admin"));
    }

    let user = user::set_status(&state.pool, &id, UserStatus::Suspended).await?;

    audit_log!(
        state.audit_service,
        AuditAction::UserSuspended,
        "user", &user.id,
        operator_id = Some(current_user.id.clone()),
        operator_name = Some(current_user.username.clone()),
        details = serde_json::json!({ "username": user.username })
    );

    Ok(ok(UserPublic::from(user)))
}

/// POST /api/admin/users/{id}/reinstate - lift a suspension
pub async fn reinstate_user(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<UserPublic>>> {
    let user = user::set_status(&state.pool, &id, UserStatus::Active).await?;

    audit_log!(
        state.audit_service,
        AuditAction::UserReinstated,
        "user", &user.id,
        operator_id = Some(current_user.id.clone()),
        operator_name = Some(current_user.username.clone()),
        details = serde_json::json!({ "username": user.username })
    );

    Ok(ok(UserPublic::from(user)))
}

/// POST /api/admin/listings/{id}/remove - take a listing down
///
/// Open offers on the listing expire with it.
pub async fn remove_listing(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<RemoveListingResponse>>> {
    let (listing, expired_offers) = listing::remove(&state.pool, &id).await?;

    audit_log!(
        state.audit_service,
        AuditAction::ListingRemoved,
        "listing", &listing.id,
        operator_id = Some(current_user.id.clone()),
        operator_name = Some(current_user.username.clone()),
        details = serde_json::json!({
            "title": listing.title,
            "expired_offers": expired_offers,
        })
    );

    Ok(ok(RemoveListingResponse {
        listing,
        expired_offers,
    }))
}

/// GET /api/admin/audit-log - query audit entries
pub async fn list_audit_log(
    State(state): State<ServerState>,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<AppResponse<AuditListResponse>>> {
    let result = state.audit_service.query(&query).await?;
    Ok(ok(result))
}

/// GET /api/admin/audit-log/verify - walk the hash chain end to end
pub async fn verify_audit_chain(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<AuditChainVerification>>> {
    let verification = state.audit_service.verify_chain().await?;
    Ok(ok(verification))
}
