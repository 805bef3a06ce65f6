//! Offer Model
//!
//! An offer is a proposed price between a buyer and a seller for a listing.
//! Lifecycle: OPEN -> {ACCEPTED, COUNTERED, EXPIRED, REJECTED}; COUNTERED
//! stays negotiable (may be accepted, rejected, or expired).

use serde::{Deserialize, Serialize};

/// Offer status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Open,
    Accepted,
    Countered,
    Expired,
    Rejected,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Open => "OPEN",
            OfferStatus::Accepted => "ACCEPTED",
            OfferStatus::Countered => "COUNTERED",
            OfferStatus::Expired => "EXPIRED",
            OfferStatus::Rejected => "REJECTED",
        }
    }
}

/// Offer entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Offer {
    pub id: String,
    pub listing_id: String,
    pub buyer_id: String,
    /// Seller snapshot taken from the listing at creation
    pub seller_id: String,
    pub amount: f64,
    /// 'OPEN' | 'ACCEPTED' | 'COUNTERED' | 'EXPIRED' | 'REJECTED'
    pub status: String,
    /// Unix millis; None means the offer never expires
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Offer {
    /// Whether the offer is past its expiry timestamp at `now`
    pub fn is_past_expiry(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(ts) if now >= ts)
    }

    /// Whether the offer is still negotiable (OPEN or COUNTERED)
    pub fn is_negotiable(&self) -> bool {
        self.status == OfferStatus::Open.as_str()
            || self.status == OfferStatus::Countered.as_str()
    }
}

/// Create offer payload
#[derive(Debug, Clone)]
pub struct OfferCreate {
    pub listing_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount: f64,
    pub expires_at: Option<i64>,
}
