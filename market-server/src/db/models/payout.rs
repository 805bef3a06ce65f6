//! Payout Model
//!
//! One-to-one with an order, created PENDING alongside it.
//! RELEASED is terminal; transfer_id is present iff RELEASED.

use serde::{Deserialize, Serialize};

/// Payout entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payout {
    pub order_id: String,
    pub seller_id: String,
    /// Escrowed amount held for the seller
    pub amount: f64,
    /// 'PENDING' | 'RELEASED'
    pub status: String,
    /// Set exactly once, on release
    pub transfer_id: Option<String>,
    pub released_at: Option<i64>,
    pub created_at: i64,
}
