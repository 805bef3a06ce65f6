//! User Repository

use super::{RepoError, RepoResult};
use crate::db::models::{RecoveryCode, User, UserCreate, UserStatus};
use crate::utils::time::now_millis;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, role, status, mfa_secret, mfa_enabled, created_at, updated_at FROM user WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> RepoResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, role, status, mfa_secret, mfa_enabled, created_at, updated_at FROM user WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn create(pool: &SqlitePool, data: UserCreate) -> RepoResult<User> {
    if find_by_username(pool, &data.username).await?.is_some() {
        return Err(RepoError::Duplicate("Username is already taken".into()));
    }

    let now = now_millis();
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO user (id, username, password_hash, role, status, mfa_enabled, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, 'ACTIVE', 0, ?5, ?5)",
    )
    .bind(&id)
    .bind(&data.username)
    .bind(&data.password_hash)
    .bind(&data.role)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_id(pool, &id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create user".into()))
}

/// Set account status (ACTIVE / SUSPENDED)
pub async fn set_status(pool: &SqlitePool, id: &str, status: UserStatus) -> RepoResult<User> {
    let now = now_millis();
    let rows = sqlx::query("UPDATE user SET status = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("User {id} not found")));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("User {id} not found")))
}

/// Store a pending multi-factor secret. The account stays single-factor
/// until [`enable_mfa`] confirms enrollment.
pub async fn set_mfa_secret(pool: &SqlitePool, id: &str, secret: &str) -> RepoResult<()> {
    let now = now_millis();
    let rows = sqlx::query("UPDATE user SET mfa_secret = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(secret)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("User {id} not found")));
    }
    Ok(())
}

/// Flip mfa_enabled once the user has proven possession of the secret
pub async fn enable_mfa(pool: &SqlitePool, id: &str) -> RepoResult<User> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE user SET mfa_enabled = 1, updated_at = ?1 WHERE id = ?2 AND mfa_secret IS NOT NULL",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "User {id} not found or has no enrollment in progress"
        )));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("User {id} not found")))
}

/// Replace all recovery codes for a user (re-enrollment invalidates old ones)
pub async fn replace_recovery_codes(
    pool: &SqlitePool,
    user_id: &str,
    code_hashes: &[String],
) -> RepoResult<()> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM mfa_recovery_code WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    for hash in code_hashes {
        sqlx::query(
            "INSERT INTO mfa_recovery_code (user_id, code_hash, used, created_at) VALUES (?1, ?2, 0, ?3)",
        )
        .bind(user_id)
        .bind(hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn find_unused_recovery_codes(
    pool: &SqlitePool,
    user_id: &str,
) -> RepoResult<Vec<RecoveryCode>> {
    let codes = sqlx::query_as::<_, RecoveryCode>(
        "SELECT id, user_id, code_hash, used FROM mfa_recovery_code WHERE user_id = ? AND used = 0",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(codes)
}

/// Burn a recovery code. Returns false if it was already used.
pub async fn mark_recovery_code_used(pool: &SqlitePool, id: i64) -> RepoResult<bool> {
    let rows = sqlx::query("UPDATE mfa_recovery_code SET used = 1 WHERE id = ? AND used = 0")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(rows.rows_affected() > 0)
}

/// Seed the admin account on first boot. No-op when the username exists.
pub async fn ensure_admin(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
) -> RepoResult<()> {
    let now = now_millis();
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT OR IGNORE INTO user (id, username, password_hash, role, status, mfa_enabled, created_at, updated_at) VALUES (?1, ?2, ?3, 'admin', 'ACTIVE', 0, ?4, ?4)",
    )
    .bind(&id)
    .bind(username)
    .bind(password_hash)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    /// In-memory pool with the account schema
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE user (
                id            TEXT PRIMARY KEY,
                username      TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role          TEXT NOT NULL,
                status        TEXT NOT NULL DEFAULT 'ACTIVE',
                mfa_secret    TEXT,
                mfa_enabled   INTEGER NOT NULL DEFAULT 0,
                created_at    INTEGER NOT NULL,
                updated_at    INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE mfa_recovery_code (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    TEXT NOT NULL,
                code_hash  TEXT NOT NULL,
                used       INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    fn buyer(username: &str) -> UserCreate {
        UserCreate {
            username: username.to_string(),
            password_hash: "argon2-hash".to_string(),
            role: "buyer".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_username() {
        let pool = test_pool().await;
        let created = create(&pool, buyer("alice")).await.unwrap();
        assert_eq!(created.role, "buyer");
        assert_eq!(created.status, "ACTIVE");
        assert!(!created.mfa_enabled);

        let found = find_by_username(&pool, "alice").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let pool = test_pool().await;
        create(&pool, buyer("alice")).await.unwrap();
        let err = create(&pool, buyer("alice")).await.unwrap_err();
        assert!(matches!(err, RepoError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_set_status_suspends() {
        let pool = test_pool().await;
        let user = create(&pool, buyer("alice")).await.unwrap();
        let user = set_status(&pool, &user.id, UserStatus::Suspended)
            .await
            .unwrap();
        assert!(user.is_suspended());

        let user = set_status(&pool, &user.id, UserStatus::Active).await.unwrap();
        assert!(!user.is_suspended());
    }

    #[tokio::test]
    async fn test_set_status_unknown_user() {
        let pool = test_pool().await;
        let err = set_status(&pool, "missing", UserStatus::Suspended)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_enable_mfa_requires_pending_secret() {
        let pool = test_pool().await;
        let user = create(&pool, buyer("alice")).await.unwrap();

        // No secret stored yet
        let err = enable_mfa(&pool, &user.id).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));

        set_mfa_secret(&pool, &user.id, "deadbeef").await.unwrap();
        let user = enable_mfa(&pool, &user.id).await.unwrap();
        assert!(user.mfa_enabled);
    }

    #[tokio::test]
    async fn test_recovery_code_single_use() {
        let pool = test_pool().await;
        let user = create(&pool, buyer("alice")).await.unwrap();
        replace_recovery_codes(&pool, &user.id, &["h1".to_string(), "h2".to_string()])
            .await
            .unwrap();

        let codes = find_unused_recovery_codes(&pool, &user.id).await.unwrap();
        assert_eq!(codes.len(), 2);

        assert!(mark_recovery_code_used(&pool, codes[0].id).await.unwrap());
        // Second burn of the same code fails
        assert!(!mark_recovery_code_used(&pool, codes[0].id).await.unwrap());

        let codes = find_unused_recovery_codes(&pool, &user.id).await.unwrap();
        assert_eq!(codes.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_recovery_codes_drops_old_set() {
        let pool = test_pool().await;
        let user = create(&pool, buyer("alice")).await.unwrap();
        replace_recovery_codes(&pool, &user.id, &["old".to_string()])
            .await
            .unwrap();
        replace_recovery_codes(&pool, &user.id, &["new1".to_string(), "new2".to_string()])
            .await
            .unwrap();

        let codes = find_unused_recovery_codes(&pool, &user.id).await.unwrap();
        assert_eq!(codes.len(), 2);
        assert!(codes.iter().all(|c| c.code_hash.starts_with("new")));
    }

    #[tokio::test]
    async fn test_ensure_admin_idempotent() {
        let pool = test_pool().await;
        ensure_admin(&pool, "admin", "hash-1").await.unwrap();
        ensure_admin(&pool, "admin", "hash-2").await.unwrap();

        let admin = find_by_username(&pool, "admin").await.unwrap().unwrap();
        assert_eq!(admin.role, "admin");
        // Second call must not overwrite the original credentials
        assert_eq!(admin.password_hash, "hash-1");
    }
}
