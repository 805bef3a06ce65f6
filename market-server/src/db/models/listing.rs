//! Listing Model

use serde::{Deserialize, Serialize};

/// Listing status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    Active,
    Removed,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Removed => "REMOVED",
        }
    }
}

/// Listing entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    /// 'ACTIVE' | 'REMOVED'
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Listing {
    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active.as_str()
    }
}

/// Create listing payload
#[derive(Debug, Clone)]
pub struct ListingCreate {
    pub seller_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
}
