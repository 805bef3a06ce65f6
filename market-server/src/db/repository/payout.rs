//! Payout Repository
//!
//! Escrowed funds are released to the seller exactly once. The release is
//! a status-guarded UPDATE inside a transaction: whichever caller flips
//! PENDING -> RELEASED wins, every later caller observes AlreadyReleased.

use super::{RepoError, RepoResult};
use crate::db::models::Payout;
use crate::utils::time::now_millis;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Result of a release attempt
#[derive(Debug)]
pub enum ReleaseOutcome {
    /// This call performed the transfer
    Released(Payout),
    /// A previous call already transferred; no new transfer was made
    AlreadyReleased(Payout),
}

/// Release the escrow for an order. Idempotent: a duplicate call returns
/// the already-released payout without generating a second transfer.
pub async fn release(pool: &SqlitePool, order_id: &str) -> RepoResult<ReleaseOutcome> {
    let now = now_millis();
    let transfer_id = format!("tr_{}", Uuid::new_v4().simple());
    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        "UPDATE payout SET status = 'RELEASED', transfer_id = ?1, released_at = ?2 WHERE order_id = ?3 AND status = 'PENDING'",
    )
    .bind(&transfer_id)
    .bind(now)
    .bind(order_id)
    .execute(&mut *tx)
    .await?;

    if rows.rows_affected() == 0 {
        // Lost the race or nothing to release
        let payout = sqlx::query_as::<_, Payout>(
            "SELECT order_id, seller_id, amount, status, transfer_id, released_at, created_at FROM payout WHERE order_id = ?",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        return match payout {
            Some(p) => Ok(ReleaseOutcome::AlreadyReleased(p)),
            None => Err(RepoError::NotFound(format!(
                "Payout for order {order_id} not found"
            ))),
        };
    }

    sqlx::query("UPDATE market_order SET status = 'COMPLETED', updated_at = ?1 WHERE id = ?2")
        .bind(now)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    let detail = serde_json::json!({ "transfer_id": transfer_id }).to_string();
    sqlx::query(
        "INSERT INTO order_event (order_id, event, detail, created_at) VALUES (?1, 'PAYOUT_RELEASED', ?2, ?3)",
    )
    .bind(order_id)
    .bind(&detail)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let payout = sqlx::query_as::<_, Payout>(
        "SELECT order_id, seller_id, amount, status, transfer_id, released_at, created_at FROM payout WHERE order_id = ?",
    )
    .bind(order_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(ReleaseOutcome::Released(payout))
}
