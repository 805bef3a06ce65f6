//! Review Model

use serde::{Deserialize, Serialize};

/// Review entity (one per order)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: String,
    pub order_id: String,
    pub reviewer_id: String,
    /// 1-5
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: i64,
}

/// Create review payload
#[derive(Debug, Clone)]
pub struct ReviewCreate {
    pub order_id: String,
    pub reviewer_id: String,
    pub rating: i64,
    pub comment: Option<String>,
}
