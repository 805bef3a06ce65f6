//! Policies API Handlers

use axum::{
    Json,
    extract::{Extension, Path, State},
};

use crate::audit::AuditAction;
use crate::audit_log;
use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{Policy, PolicyAcceptance};
use crate::db::repository::policy;
use crate::utils::{AppResponse, AppResult, ok, ok_with_message};

/// GET /api/policies - latest published version of every policy
pub async fn list(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<Vec<Policy>>>> {
    let policies = policy::list_latest(&state.pool).await?;
    Ok(ok(policies))
}

/// POST /api/policies/{id}/accept - record consent (idempotent)
pub async fn accept(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<()>>> {
    let newly_accepted = policy::accept(&state.pool, &current_user.id, &id).await?;

    if newly_accepted {
        audit_log!(
            state.audit_service,
            AuditAction::PolicyAccepted,
            "policy", &id,
            operator_id = Some(current_user.id.clone()),
            operator_name = Some(current_user.username.clone()),
            details = serde_json::json!({})
        );
        Ok(ok_with_message((), "Policy accepted"))
    } else {
        Ok(ok_with_message((), "Policy was already accepted"))
    }
}

/// GET /api/policies/acceptances - the caller's recorded acceptances
pub async fn my_acceptances(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<AppResponse<Vec<PolicyAcceptance>>>> {
    let acceptances = policy::acceptances_for_user(&state.pool, &current_user.id).await?;
    Ok(ok(acceptances))
}
