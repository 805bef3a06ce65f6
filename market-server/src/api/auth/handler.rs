//! Auth API Handlers

use axum::{
    Json,
    extract::{Extension, State},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::audit::AuditAction;
use crate::audit_log;
use crate::auth::CurrentUser;
use crate::auth::roles;
use crate::auth::totp;
use crate::core::ServerState;
use crate::db::models::{User, UserCreate, UserPublic};
use crate::db::repository::user;
use crate::security_log;
use crate::utils::time::now_millis;
use crate::utils::{AppError, AppResponse, AppResult, ok, ok_with_message};

/// Every failed login responds after this minimum delay, whatever the cause
const LOGIN_FAILURE_DELAY: std::time::Duration = std::time::Duration::from_millis(500);

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Current TOTP code, required once MFA is enabled
    pub mfa_code: Option<String>,
    /// One-shot fallback when the authenticator is unavailable
    pub recovery_code: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserPublic,
}

#[derive(Serialize)]
pub struct MfaEnrollResponse {
    /// Hex-encoded TOTP secret
    pub secret: String,
    /// otpauth:// URI for authenticator apps
    pub otpauth_uri: String,
}

#[derive(Serialize)]
pub struct MfaConfirmResponse {
    pub recovery_codes: Vec<String>,
}

/// POST /api/auth/register - create a buyer or seller account
pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<AppResponse<UserPublic>>> {
    payload.validate()?;
    if !roles::can_self_register(&payload.role) {
        return Err(AppError::validation("Role must be buyer or seller"));
    }

    let password_hash = User::hash_password(&payload.password)
        .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))?;

    let user = user::create(
        &state.pool,
        UserCreate {
            username: payload.username,
            password_hash,
            role: payload.role,
        },
    )
    .await?;

    audit_log!(
        state.audit_service,
        AuditAction::UserRegistered,
        "user", &user.id,
        operator_id = Some(user.id.clone()),
        operator_name = Some(user.username.clone()),
        details = serde_json::json!({ "role": user.role })
    );

    Ok(ok(UserPublic::from(user)))
}

/// POST /api/auth/login - authenticate and issue a JWT
///
/// Unknown usernames and wrong passwords produce the same error after the
/// same minimum delay. Suspended accounts are told so explicitly; they hold
/// valid credentials and learn nothing new from the distinction.
pub async fn login(
    State(state): State<ServerState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AppResponse<LoginResponse>>> {
    let user = match user::find_by_username(&state.pool, &payload.username).await? {
        Some(user) => user,
        None => return Err(failed_login(&state, &payload.username, "unknown_user").await),
    };

    let password_ok = user
        .verify_password(&payload.password)
        .map_err(|e| AppError::internal(format!("Password verification failed: {e}")))?;
    if !password_ok {
        return Err(failed_login(&state, &payload.username, "bad_password").await);
    }

    if user.is_suspended() {
        security_log!(
            "WARN",
            "login_suspended",
            username = payload.username.clone()
        );
        audit_log!(
            state.audit_service,
            AuditAction::LoginFailed,
            "user", &user.id,
            operator_id = None,
            operator_name = None,
            details = serde_json::json!({ "reason": "suspended" })
        );
        return Err(AppError::forbidden("Account suspended"));
    }

    if user.mfa_enabled {
        verify_second_factor(&state, &user, &payload).await?;
    }

    let token = state
        .jwt_service
        .generate_token(&user.id, &user.username, &user.role)
        .map_err(|e| AppError::internal(format!("Failed to generate token: {e}")))?;

    audit_log!(
        state.audit_service,
        AuditAction::LoginSuccess,
        "user", &user.id,
        operator_id = Some(user.id.clone()),
        operator_name = Some(user.username.clone()),
        details = serde_json::json!({ "mfa": user.mfa_enabled })
    );

    Ok(ok(LoginResponse {
        token,
        user: UserPublic::from(user),
    }))
}

/// GET /api/auth/me - current account profile
pub async fn me(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<AppResponse<UserPublic>>> {
    let user = user::find_by_id(&state.pool, &current_user.id)
        .await?
        .ok_or_else(|| AppError::not_found("Account not found"))?;

    Ok(ok(UserPublic::from(user)))
}

/// POST /api/auth/mfa/enroll - generate a TOTP secret
///
/// The secret is stored unconfirmed; MFA only activates after a valid code
/// is presented to /mfa/confirm. Re-enrolling before confirmation replaces
/// the pending secret.
pub async fn enroll_mfa(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<AppResponse<MfaEnrollResponse>>> {
    let user = user::find_by_id(&state.pool, &current_user.id)
        .await?
        .ok_or_else(|| AppError::not_found("Account not found"))?;

    if user.mfa_enabled {
        return Err(AppError::conflict("Multi-factor already enabled"));
    }

    let secret = totp::generate_secret()
        .map_err(|e| AppError::internal(format!("Failed to generate secret: {e}")))?;

    user::set_mfa_secret(&state.pool, &user.id, &secret).await?;

    let otpauth_uri = totp::provisioning_uri(&secret, &user.username, &state.config.jwt.issuer)
        .map_err(|e| AppError::internal(format!("Failed to build otpauth URI: {e}")))?;

    Ok(ok(MfaEnrollResponse { secret, otpauth_uri }))
}

#[derive(Debug, Deserialize)]
pub struct MfaConfirmRequest {
    pub code: String,
}

/// POST /api/auth/mfa/confirm - activate MFA with a valid TOTP code
///
/// Returns the recovery codes exactly once. Only the hashes are kept.
pub async fn confirm_mfa(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<MfaConfirmRequest>,
) -> AppResult<Json<AppResponse<MfaConfirmResponse>>> {
    let user = user::find_by_id(&state.pool, &current_user.id)
        .await?
        .ok_or_else(|| AppError::not_found("Account not found"))?;

    if user.mfa_enabled {
        return Err(AppError::conflict("Multi-factor already enabled"));
    }

    let secret = user
        .mfa_secret
        .as_deref()
        .ok_or_else(|| AppError::business_rule("Enrollment has not been started"))?;

    let now_secs = (now_millis() / 1000) as u64;
    let valid = totp::verify_code(secret, &payload.code, now_secs)
        .map_err(|e| AppError::internal(format!("Code verification failed: {e}")))?;
    if !valid {
        return Err(AppError::invalid("Invalid multi-factor code"));
    }

    let recovery_codes = totp::generate_recovery_codes()
        .map_err(|e| AppError::internal(format!("Failed to generate recovery codes: {e}")))?;

    let mut hashes = Vec::with_capacity(recovery_codes.len());
    for code in &recovery_codes {
        let hash = User::hash_password(code)
            .map_err(|e| AppError::internal(format!("Failed to hash recovery code: {e}")))?;
        hashes.push(hash);
    }

    // Codes land before the flag flips: a crash in between leaves MFA off
    // and the next confirm replaces the batch.
    user::replace_recovery_codes(&state.pool, &user.id, &hashes).await?;
    user::enable_mfa(&state.pool, &user.id).await?;

    audit_log!(
        state.audit_service,
        AuditAction::MfaEnrolled,
        "user", &user.id,
        operator_id = Some(user.id.clone()),
        operator_name = Some(user.username.clone()),
        details = serde_json::json!({ "recovery_codes": recovery_codes.len() })
    );

    Ok(ok_with_message(
        MfaConfirmResponse { recovery_codes },
        "Store the recovery codes now; they are not shown again",
    ))
}

/// Log a failed attempt, wait the fixed delay, return the uniform error
async fn failed_login(state: &ServerState, username: &str, reason: &str) -> AppError {
    security_log!(
        "WARN",
        "login_failed",
        username = username.to_string(),
        reason = reason.to_string()
    );
    audit_log!(
        state.audit_service,
        AuditAction::LoginFailed,
        "user",
        username.to_string(),
        operator_id = None,
        operator_name = None,
        details = serde_json::json!({ "reason": reason })
    );

    tokio::time::sleep(LOGIN_FAILURE_DELAY).await;

    AppError::invalid_credentials()
}

/// Check the second factor on an MFA-enabled account.
///
/// Accepts either a current TOTP code or an unused recovery code; with
/// neither present the caller is told MFA is required.
async fn verify_second_factor(
    state: &ServerState,
    user: &User,
    payload: &LoginRequest,
) -> AppResult<()> {
    let secret = user
        .mfa_secret
        .as_deref()
        .ok_or_else(|| AppError::internal("MFA enabled without a secret"))?;

    if let Some(code) = payload.mfa_code.as_deref() {
        let now_secs = (now_millis() / 1000) as u64;
        let valid = totp::verify_code(secret, code, now_secs)
            .map_err(|e| AppError::internal(format!("Code verification failed: {e}")))?;
        if valid {
            return Ok(());
        }
        return Err(failed_login(state, &user.username, "mfa_code").await);
    }

    if let Some(code) = payload.recovery_code.as_deref() {
        if consume_recovery_code(state, user, code).await? {
            return Ok(());
        }
        return Err(failed_login(state, &user.username, "recovery_code").await);
    }

    Err(AppError::mfa_required())
}

/// Burn a recovery code if it matches an unused one. Returns false when
/// nothing matched.
async fn consume_recovery_code(
    state: &ServerState,
    user: &User,
    candidate: &str,
) -> AppResult<bool> {
    let codes = user::find_unused_recovery_codes(&state.pool, &user.id).await?;
    let total = codes.len();

    for code in codes {
        let matches = User::verify_hash(&code.code_hash, candidate)
            .map_err(|e| AppError::internal(format!("Recovery code verification failed: {e}")))?;
        if !matches {
            continue;
        }

        // Status-guarded update; a concurrent login may have burned it first
        if !user::mark_recovery_code_used(&state.pool, code.id).await? {
            continue;
        }

        security_log!(
            "WARN",
            "recovery_code_used",
            username = user.username.clone(),
            remaining = (total - 1).to_string()
        );
        audit_log!(
            state.audit_service,
            AuditAction::MfaRecoveryCodeUsed,
            "user", &user.id,
            operator_id = Some(user.id.clone()),
            operator_name = Some(user.username.clone()),
            details = serde_json::json!({ "remaining_codes": total - 1 })
        );

        return Ok(true);
    }

    Ok(false)
}
