//! Order Repository
//!
//! Orders are created by `offer::accept`; this module reads them and
//! appends to the timeline. Shipment updates are unconditional: carriers
//! deliver webhooks out of order and every status change is recorded.

use super::{RepoError, RepoResult};
use crate::db::models::{Order, OrderEvent, ShipmentStatus};
use crate::utils::time::now_millis;
use sqlx::SqlitePool;

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(
        "SELECT id, offer_id, listing_id, buyer_id, seller_id, amount, application_fee_amount, tax_amount, escrow_amount, status, shipment_status, created_at, updated_at FROM market_order WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(order)
}

pub async fn find_events(pool: &SqlitePool, order_id: &str) -> RepoResult<Vec<OrderEvent>> {
    let events = sqlx::query_as::<_, OrderEvent>(
        "SELECT id, order_id, event, detail, created_at FROM order_event WHERE order_id = ? ORDER BY id ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(events)
}

pub async fn append_event(
    pool: &SqlitePool,
    order_id: &str,
    event: &str,
    detail: &serde_json::Value,
) -> RepoResult<()> {
    let now = now_millis();
    sqlx::query(
        "INSERT INTO order_event (order_id, event, detail, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(order_id)
    .bind(event)
    .bind(detail.to_string())
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a shipment status change and its timeline event atomically
pub async fn update_shipment(
    pool: &SqlitePool,
    id: &str,
    status: ShipmentStatus,
) -> RepoResult<Order> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        "UPDATE market_order SET shipment_status = ?1, updated_at = ?2 WHERE id = ?3",
    )
    .bind(status.as_str())
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Order {id} not found")));
    }

    let detail = serde_json::json!({ "shipment_status": status.as_str() }).to_string();
    sqlx::query(
        "INSERT INTO order_event (order_id, event, detail, created_at) VALUES (?1, 'SHIPMENT_UPDATED', ?2, ?3)",
    )
    .bind(id)
    .bind(&detail)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let order = sqlx::query_as::<_, Order>(
        "SELECT id, offer_id, listing_id, buyer_id, seller_id, amount, application_fee_amount, tax_amount, escrow_amount, status, shipment_status, created_at, updated_at FROM market_order WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(order)
}

/// Delivered orders the buyer has not reviewed yet
pub async fn pending_reviews(pool: &SqlitePool, buyer_id: &str) -> RepoResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(
        "SELECT o.id, o.offer_id, o.listing_id, o.buyer_id, o.seller_id, o.amount, o.application_fee_amount, o.tax_amount, o.escrow_amount, o.status, o.shipment_status, o.created_at, o.updated_at FROM market_order o LEFT JOIN review r ON r.order_id = o.id WHERE o.buyer_id = ? AND o.shipment_status = 'DELIVERED' AND r.id IS NULL ORDER BY o.created_at DESC",
    )
    .bind(buyer_id)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    /// In-memory pool with order + event + review schema and one seeded order
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE market_order (
                id                     TEXT PRIMARY KEY,
                offer_id               TEXT NOT NULL UNIQUE,
                listing_id             TEXT NOT NULL,
                buyer_id               TEXT NOT NULL,
                seller_id              TEXT NOT NULL,
                amount                 REAL NOT NULL,
                application_fee_amount REAL NOT NULL,
                tax_amount             REAL NOT NULL,
                escrow_amount          REAL NOT NULL,
                status                 TEXT NOT NULL DEFAULT 'ACTIVE',
                shipment_status        TEXT NOT NULL DEFAULT 'AWAITING_SHIPMENT',
                created_at             INTEGER NOT NULL,
                updated_at             INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE order_event (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id   TEXT NOT NULL,
                event      TEXT NOT NULL,
                detail     TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE review (
                id          TEXT PRIMARY KEY,
                order_id    TEXT NOT NULL UNIQUE,
                reviewer_id TEXT NOT NULL,
                rating      INTEGER NOT NULL,
                comment     TEXT,
                created_at  INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        seed_order(&pool, "order-1", "offer-1").await;

        pool
    }

    async fn seed_order(pool: &SqlitePool, id: &str, offer_id: &str) {
        sqlx::query(
            "INSERT INTO market_order (id, offer_id, listing_id, buyer_id, seller_id, amount, application_fee_amount, tax_amount, escrow_amount, created_at, updated_at) VALUES (?1, ?2, 'listing-1', 'buyer-1', 'seller-1', 100.0, 10.0, 5.0, 42.5, 0, 0)",
        )
        .bind(id)
        .bind(offer_id)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_update_shipment_appends_event() {
        let pool = test_pool().await;
        let order = update_shipment(&pool, "order-1", ShipmentStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(order.shipment_status, "SHIPPED");

        let events = find_events(&pool, "order-1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "SHIPMENT_UPDATED");
        assert!(events[0].detail.contains("SHIPPED"));
    }

    #[tokio::test]
    async fn test_update_shipment_records_every_change() {
        let pool = test_pool().await;
        // Out-of-order carrier updates are all recorded
        update_shipment(&pool, "order-1", ShipmentStatus::InTransit)
            .await
            .unwrap();
        update_shipment(&pool, "order-1", ShipmentStatus::Shipped)
            .await
            .unwrap();
        let order = update_shipment(&pool, "order-1", ShipmentStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(order.shipment_status, "DELIVERED");

        let events = find_events(&pool, "order-1").await.unwrap();
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_update_shipment_unknown_order() {
        let pool = test_pool().await;
        let err = update_shipment(&pool, "missing", ShipmentStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_events_ordered() {
        let pool = test_pool().await;
        append_event(&pool, "order-1", "ORDER_CREATED", &serde_json::json!({}))
            .await
            .unwrap();
        append_event(
            &pool,
            "order-1",
            "PAYOUT_RELEASED",
            &serde_json::json!({ "transfer_id": "tr_1" }),
        )
        .await
        .unwrap();

        let events = find_events(&pool, "order-1").await.unwrap();
        assert_eq!(events[0].event, "ORDER_CREATED");
        assert_eq!(events[1].event, "PAYOUT_RELEASED");
    }

    #[tokio::test]
    async fn test_pending_reviews_excludes_reviewed_and_undelivered() {
        let pool = test_pool().await;
        seed_order(&pool, "order-2", "offer-2").await;
        seed_order(&pool, "order-3", "offer-3").await;

        // order-1 delivered + reviewed, order-2 delivered, order-3 in transit
        update_shipment(&pool, "order-1", ShipmentStatus::Delivered)
            .await
            .unwrap();
        update_shipment(&pool, "order-2", ShipmentStatus::Delivered)
            .await
            .unwrap();
        update_shipment(&pool, "order-3", ShipmentStatus::InTransit)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO review (id, order_id, reviewer_id, rating, created_at) VALUES ('r1', 'order-1', 'buyer-1', 5, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let pending = pending_reviews(&pool, "buyer-1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "order-2");
    }
}
