//! Offer Repository
//!
//! Lifecycle transitions are status-guarded UPDATEs so concurrent
//! requests cannot resolve the same offer twice.

use super::{RepoError, RepoResult};
use crate::db::models::{Offer, OfferCreate, Order};
use crate::pricing::FinancialBreakdown;
use crate::utils::time::now_millis;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Result of an expire attempt
#[derive(Debug)]
pub enum ExpireOutcome {
    /// Offer was negotiable, past its deadline, and is now EXPIRED
    Expired(Offer),
    /// Offer was already EXPIRED (idempotent no-op)
    AlreadyExpired(Offer),
    /// Offer is negotiable but has no deadline or the deadline is still ahead
    NotDue(Offer),
    /// Offer was resolved (ACCEPTED / REJECTED) and cannot expire
    NotExpirable(Offer),
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Offer>> {
    let offer = sqlx::query_as::<_, Offer>(
        "SELECT id, listing_id, buyer_id, seller_id, amount, status, expires_at, created_at, updated_at FROM offer WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(offer)
}

pub async fn create(pool: &SqlitePool, data: OfferCreate) -> RepoResult<Offer> {
    // One open offer per (listing, buyer); resolved offers don't block
    let open: Option<String> = sqlx::query_scalar(
        "SELECT id FROM offer WHERE listing_id = ?1 AND buyer_id = ?2 AND status = 'OPEN' LIMIT 1",
    )
    .bind(&data.listing_id)
    .bind(&data.buyer_id)
    .fetch_optional(pool)
    .await?;
    if open.is_some() {
        return Err(RepoError::Duplicate(
            "An open offer already exists for this listing".into(),
        ));
    }

    let now = now_millis();
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO offer (id, listing_id, buyer_id, seller_id, amount, status, expires_at, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, 'OPEN', ?6, ?7, ?7)",
    )
    .bind(&id)
    .bind(&data.listing_id)
    .bind(&data.buyer_id)
    .bind(&data.seller_id)
    .bind(data.amount)
    .bind(data.expires_at)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_id(pool, &id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create offer".into()))
}

/// Accept a negotiable offer and open the order in one transaction:
/// offer -> ACCEPTED, order + pending payout inserted, timeline seeded.
///
/// `amount` is the amount the breakdown was computed from; the update is
/// conditional on it so a concurrent counter can't change the price under
/// the acceptance.
pub async fn accept(
    pool: &SqlitePool,
    offer_id: &str,
    amount: f64,
    breakdown: &FinancialBreakdown,
) -> RepoResult<(Offer, Order)> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        "UPDATE offer SET status = 'ACCEPTED', updated_at = ?1 WHERE id = ?2 AND status IN ('OPEN', 'COUNTERED') AND amount = ?3 AND (expires_at IS NULL OR expires_at > ?1)",
    )
    .bind(now)
    .bind(offer_id)
    .bind(amount)
    .execute(&mut *tx)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Duplicate(format!(
            "Offer {offer_id} was already resolved, expired, or its amount changed"
        )));
    }

    let offer = sqlx::query_as::<_, Offer>(
        "SELECT id, listing_id, buyer_id, seller_id, amount, status, expires_at, created_at, updated_at FROM offer WHERE id = ?",
    )
    .bind(offer_id)
    .fetch_one(&mut *tx)
    .await?;

    let order_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO market_order (id, offer_id, listing_id, buyer_id, seller_id, amount, application_fee_amount, tax_amount, escrow_amount, status, shipment_status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'ACTIVE', 'AWAITING_SHIPMENT', ?10, ?10)",
    )
    .bind(&order_id)
    .bind(&offer.id)
    .bind(&offer.listing_id)
    .bind(&offer.buyer_id)
    .bind(&offer.seller_id)
    .bind(offer.amount)
    .bind(breakdown.application_fee_amount)
    .bind(breakdown.tax_amount)
    .bind(breakdown.escrow_amount)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    // Escrowed funds wait for delivery
    sqlx::query(
        "INSERT INTO payout (order_id, seller_id, amount, status, created_at) VALUES (?1, ?2, ?3, 'PENDING', ?4)",
    )
    .bind(&order_id)
    .bind(&offer.seller_id)
    .bind(breakdown.escrow_amount)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let detail = serde_json::json!({ "offer_id": offer.id, "amount": offer.amount }).to_string();
    sqlx::query(
        "INSERT INTO order_event (order_id, event, detail, created_at) VALUES (?1, 'ORDER_CREATED', ?2, ?3)",
    )
    .bind(&order_id)
    .bind(&detail)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let order = sqlx::query_as::<_, Order>(
        "SELECT id, offer_id, listing_id, buyer_id, seller_id, amount, application_fee_amount, tax_amount, escrow_amount, status, shipment_status, created_at, updated_at FROM market_order WHERE id = ?",
    )
    .bind(&order_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((offer, order))
}

/// Counter an open offer with a new amount (and optionally a new expiry)
pub async fn counter(
    pool: &SqlitePool,
    offer_id: &str,
    amount: f64,
    expires_at: Option<i64>,
) -> RepoResult<Offer> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE offer SET status = 'COUNTERED', amount = ?1, expires_at = COALESCE(?2, expires_at), updated_at = ?3 WHERE id = ?4 AND status = 'OPEN'",
    )
    .bind(amount)
    .bind(expires_at)
    .bind(now)
    .bind(offer_id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Duplicate(format!(
            "Offer {offer_id} is no longer open"
        )));
    }
    find_by_id(pool, offer_id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Offer {offer_id} not found")))
}

/// Expire a negotiable offer whose deadline has passed. Safe to call
/// repeatedly and from concurrent paths (scheduler and lazy expiry).
///
/// The deadline check sits inside the UPDATE guard, so a stale expiry job
/// racing a counter that pushed the deadline out cannot expire the offer.
pub async fn expire(pool: &SqlitePool, offer_id: &str) -> RepoResult<ExpireOutcome> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE offer SET status = 'EXPIRED', updated_at = ?1 WHERE id = ?2 AND status IN ('OPEN', 'COUNTERED') AND expires_at IS NOT NULL AND expires_at <= ?1",
    )
    .bind(now)
    .bind(offer_id)
    .execute(pool)
    .await?;

    let offer = find_by_id(pool, offer_id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Offer {offer_id} not found")))?;

    if rows.rows_affected() > 0 {
        return Ok(ExpireOutcome::Expired(offer));
    }
    if offer.status == "EXPIRED" {
        Ok(ExpireOutcome::AlreadyExpired(offer))
    } else if offer.is_negotiable() {
        Ok(ExpireOutcome::NotDue(offer))
    } else {
        Ok(ExpireOutcome::NotExpirable(offer))
    }
}

/// Reject a negotiable offer
pub async fn reject(pool: &SqlitePool, offer_id: &str) -> RepoResult<Offer> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE offer SET status = 'REJECTED', updated_at = ?1 WHERE id = ?2 AND status IN ('OPEN', 'COUNTERED')",
    )
    .bind(now)
    .bind(offer_id)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Duplicate(format!(
            "Offer {offer_id} was already resolved"
        )));
    }
    find_by_id(pool, offer_id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Offer {offer_id} not found")))
}
