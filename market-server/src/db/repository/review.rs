//! Review Repository

use super::{RepoError, RepoResult};
use crate::db::models::{Review, ReviewCreate};
use crate::utils::time::now_millis;
use sqlx::SqlitePool;
use uuid::Uuid;

fn validate_rating(rating: i64) -> RepoResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(RepoError::Validation(format!(
            "Rating must be between 1 and 5: {rating}"
        )));
    }
    Ok(())
}

pub async fn find_by_order(pool: &SqlitePool, order_id: &str) -> RepoResult<Option<Review>> {
    let review = sqlx::query_as::<_, Review>(
        "SELECT id, order_id, reviewer_id, rating, comment, created_at FROM review WHERE order_id = ?",
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(review)
}

/// One review per order; the UNIQUE index backstops the pre-check
pub async fn create(pool: &SqlitePool, data: ReviewCreate) -> RepoResult<Review> {
    validate_rating(data.rating)?;

    if find_by_order(pool, &data.order_id).await?.is_some() {
        return Err(RepoError::Duplicate(
            "Order has already been reviewed".into(),
        ));
    }

    let now = now_millis();
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO review (id, order_id, reviewer_id, rating, comment, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&id)
    .bind(&data.order_id)
    .bind(&data.reviewer_id)
    .bind(data.rating)
    .bind(&data.comment)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_order(pool, &data.order_id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create review".into()))
}
