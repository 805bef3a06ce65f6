//! Listing Repository

use super::{RepoError, RepoResult};
use crate::db::models::{Listing, ListingCreate};
use crate::utils::time::now_millis;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Listing>> {
    let listing = sqlx::query_as::<_, Listing>(
        "SELECT id, seller_id, title, description, price, status, created_at, updated_at FROM listing WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(listing)
}

pub async fn find_active(pool: &SqlitePool, limit: i32, offset: i32) -> RepoResult<Vec<Listing>> {
    let listings = sqlx::query_as::<_, Listing>(
        "SELECT id, seller_id, title, description, price, status, created_at, updated_at FROM listing WHERE status = 'ACTIVE' ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(listings)
}

pub async fn create(pool: &SqlitePool, data: ListingCreate) -> RepoResult<Listing> {
    let now = now_millis();
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO listing (id, seller_id, title, description, price, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 'ACTIVE', ?6, ?6)",
    )
    .bind(&id)
    .bind(&data.seller_id)
    .bind(&data.title)
    .bind(&data.description)
    .bind(data.price)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_id(pool, &id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create listing".into()))
}

/// Take a listing off the marketplace and expire every open offer on it.
/// Returns the removed listing and the number of offers expired.
pub async fn remove(pool: &SqlitePool, id: &str) -> RepoResult<(Listing, u64)> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        "UPDATE listing SET status = 'REMOVED', updated_at = ?1 WHERE id = ?2 AND status = 'ACTIVE'",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Listing {id} not found or already removed"
        )));
    }

    // Offers still in negotiation die with the listing
    let expired = sqlx::query(
        "UPDATE offer SET status = 'EXPIRED', updated_at = ?1 WHERE listing_id = ?2 AND status IN ('OPEN', 'COUNTERED')",
    )
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let listing = sqlx::query_as::<_, Listing>(
        "SELECT id, seller_id, title, description, price, status, created_at, updated_at FROM listing WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((listing, expired))
}
