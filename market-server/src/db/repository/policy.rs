//! Policy Repository
//!
//! Policies are versioned by slug; acceptance is per (user, policy version)
//! and idempotent.

use super::{RepoError, RepoResult};
use crate::db::models::{Policy, PolicyAcceptance, PolicyCreate};
use crate::utils::time::now_millis;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Policy>> {
    let policy = sqlx::query_as::<_, Policy>(
        "SELECT id, slug, version, title, body, published_at FROM policy WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(policy)
}

/// Latest published version of every policy slug
pub async fn list_latest(pool: &SqlitePool) -> RepoResult<Vec<Policy>> {
    let policies = sqlx::query_as::<_, Policy>(
        "SELECT p.id, p.slug, p.version, p.title, p.body, p.published_at FROM policy p WHERE p.version = (SELECT MAX(version) FROM policy WHERE slug = p.slug) ORDER BY p.slug",
    )
    .fetch_all(pool)
    .await?;
    Ok(policies)
}

/// Publish a new policy version. The version must be strictly greater
/// than the latest published version of the same slug.
pub async fn publish(pool: &SqlitePool, data: PolicyCreate) -> RepoResult<Policy> {
    let latest: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM policy WHERE slug = ?")
            .bind(&data.slug)
            .fetch_one(pool)
            .await?;

    if let Some(latest) = latest
        && data.version <= latest
    {
        return Err(RepoError::Validation(format!(
            "Version {} is not newer than published version {latest}",
            data.version
        )));
    }

    let now = now_millis();
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO policy (id, slug, version, title, body, published_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&id)
    .bind(&data.slug)
    .bind(data.version)
    .bind(&data.title)
    .bind(&data.body)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_id(pool, &id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to publish policy".into()))
}

/// Record acceptance. Returns false when the user had already accepted
/// this policy version (idempotent re-accept).
pub async fn accept(pool: &SqlitePool, user_id: &str, policy_id: &str) -> RepoResult<bool> {
    if find_by_id(pool, policy_id).await?.is_none() {
        return Err(RepoError::NotFound(format!("Policy {policy_id} not found")));
    }

    let now = now_millis();
    let rows = sqlx::query(
        "INSERT OR IGNORE INTO policy_acceptance (user_id, policy_id, accepted_at) VALUES (?1, ?2, ?3)",
    )
    .bind(user_id)
    .bind(policy_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(rows.rows_affected() > 0)
}

pub async fn acceptances_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> RepoResult<Vec<PolicyAcceptance>> {
    let acceptances = sqlx::query_as::<_, PolicyAcceptance>(
        "SELECT pa.policy_id, p.slug, p.version, pa.accepted_at FROM policy_acceptance pa JOIN policy p ON p.id = pa.policy_id WHERE pa.user_id = ? ORDER BY pa.accepted_at DESC, p.slug",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(acceptances)
}
